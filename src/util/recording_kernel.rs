use crate::types::{Identity, MountRecord};
use crate::util::Kernel;
use nix::errno::Errno;
use nix::sched::CloneFlags;
use nix::sys::wait::WaitStatus;
use nix::unistd::{ForkResult, Gid, Pid, Uid};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Mkdir(PathBuf),
    Rmdir(PathBuf),
    Mount(MountRecord),
    Detach(PathBuf),
    Chroot(PathBuf),
    Chdir(PathBuf),
    Chown(PathBuf, Uid, Gid),
    Unshare(CloneFlags),
    WriteFile(PathBuf, String),
    PivotRoot(PathBuf, PathBuf),
    LookupUser(String),
    InitGroups(String, Gid),
    SetGid(Gid),
    SetUid(Uid),
    ReplaceEnvironment(Vec<(String, String)>),
    Fork,
    Wait(Pid),
    Exec(Vec<String>),
    Exit(i32),
}

type Matcher = Box<dyn Fn(&Call) -> bool>;

/// Kernel double that records every call in order and fails the ones it is
/// told to.
pub struct RecordingKernel {
    calls: RefCell<Vec<Call>>,
    failures: RefCell<Vec<(Matcher, Errno)>>,
    users: RefCell<HashMap<String, Identity>>,
    parent_of: Cell<Option<Pid>>,
    wait_status: Cell<WaitStatus>,
}

pub fn sandboxer() -> Identity {
    Identity {
        name: "sandboxer".to_string(),
        uid: Uid::from_raw(1000),
        gid: Gid::from_raw(1000),
        home: PathBuf::from("/home/sandboxer"),
        shell: PathBuf::from("/bin/bash"),
    }
}

impl RecordingKernel {
    /// Knows about the `sandboxer` user and forks into the child branch.
    pub fn new() -> Self {
        let kernel = RecordingKernel {
            calls: RefCell::new(Vec::new()),
            failures: RefCell::new(Vec::new()),
            users: RefCell::new(HashMap::new()),
            parent_of: Cell::new(None),
            wait_status: Cell::new(WaitStatus::Exited(Pid::from_raw(4242), 0)),
        };
        kernel.add_user(sandboxer());
        kernel
    }

    pub fn add_user(&self, identity: Identity) {
        self.users
            .borrow_mut()
            .insert(identity.name.clone(), identity);
    }

    pub fn fail_when(
        &self,
        matcher: impl Fn(&Call) -> bool + 'static,
        errno: Errno,
    ) {
        self.failures.borrow_mut().push((Box::new(matcher), errno));
    }

    /// Make fork() return in the parent with `child` as the new process.
    pub fn fork_as_parent(&self, child: Pid) {
        self.parent_of.set(Some(child));
    }

    pub fn set_wait_status(&self, status: WaitStatus) {
        self.wait_status.set(status);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn position(&self, matcher: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls.borrow().iter().position(matcher)
    }

    fn record(&self, call: Call) -> nix::Result<()> {
        let failure = self
            .failures
            .borrow()
            .iter()
            .find(|(matcher, _)| matcher(&call))
            .map(|(_, errno)| *errno);
        self.calls.borrow_mut().push(call);
        match failure {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }
}

impl Kernel for RecordingKernel {
    fn mkdir(&self, path: &Path, _mode: u32) -> nix::Result<()> {
        self.record(Call::Mkdir(path.to_path_buf()))
    }

    fn rmdir(&self, path: &Path) -> nix::Result<()> {
        self.record(Call::Rmdir(path.to_path_buf()))
    }

    fn mount(&self, record: &MountRecord) -> nix::Result<()> {
        self.record(Call::Mount(record.clone()))
    }

    fn detach(&self, target: &Path) -> nix::Result<()> {
        self.record(Call::Detach(target.to_path_buf()))
    }

    fn chroot(&self, path: &Path) -> nix::Result<()> {
        self.record(Call::Chroot(path.to_path_buf()))
    }

    fn chdir(&self, path: &Path) -> nix::Result<()> {
        self.record(Call::Chdir(path.to_path_buf()))
    }

    fn chown(&self, path: &Path, uid: Uid, gid: Gid) -> nix::Result<()> {
        self.record(Call::Chown(path.to_path_buf(), uid, gid))
    }

    fn unshare(&self, flags: CloneFlags) -> nix::Result<()> {
        self.record(Call::Unshare(flags))
    }

    fn write_file(&self, path: &Path, contents: &str) -> nix::Result<()> {
        self.record(Call::WriteFile(path.to_path_buf(), contents.to_string()))
    }

    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> nix::Result<()> {
        self.record(Call::PivotRoot(
            new_root.to_path_buf(),
            put_old.to_path_buf(),
        ))
    }

    fn lookup_user(&self, name: &str) -> nix::Result<Option<Identity>> {
        self.record(Call::LookupUser(name.to_string()))?;
        Ok(self.users.borrow().get(name).cloned())
    }

    fn init_groups(&self, name: &str, gid: Gid) -> nix::Result<()> {
        self.record(Call::InitGroups(name.to_string(), gid))
    }

    fn set_gid(&self, gid: Gid) -> nix::Result<()> {
        self.record(Call::SetGid(gid))
    }

    fn set_uid(&self, uid: Uid) -> nix::Result<()> {
        self.record(Call::SetUid(uid))
    }

    fn replace_environment(&self, vars: &[(String, String)]) -> nix::Result<()> {
        self.record(Call::ReplaceEnvironment(vars.to_vec()))
    }

    fn fork(&self) -> nix::Result<ForkResult> {
        self.record(Call::Fork)?;
        Ok(match self.parent_of.get() {
            Some(child) => ForkResult::Parent { child },
            None => ForkResult::Child,
        })
    }

    fn wait(&self, child: Pid) -> nix::Result<WaitStatus> {
        self.record(Call::Wait(child))?;
        Ok(self.wait_status.get())
    }

    fn exec(&self, _program: &CString, argv: &[CString]) -> Errno {
        let argv = argv
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        match self.record(Call::Exec(argv)) {
            Err(errno) => errno,
            Ok(()) => Errno::ENOENT,
        }
    }

    fn exit(&self, code: i32) {
        let _ = self.record(Call::Exit(code));
    }
}
