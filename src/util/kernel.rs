use crate::types::{Identity, MountRecord};
use nix::errno::Errno;
use nix::mount::{MntFlags, umount2};
use nix::sched::CloneFlags;
use nix::sys::stat::Mode;
use nix::sys::wait::{WaitStatus, waitpid};
use nix::unistd::{ForkResult, Gid, Pid, Uid, User};
use std::ffi::{CString, OsString};
use std::path::Path;

/// The privileged primitives the sandbox lifecycle is built from.
///
/// Everything that touches the mount table, the process credentials or the
/// process image goes through here, so the ordering of those calls can be
/// checked against a recording implementation in tests.
pub trait Kernel {
    fn mkdir(&self, path: &Path, mode: u32) -> nix::Result<()>;
    fn rmdir(&self, path: &Path) -> nix::Result<()>;
    fn mount(&self, record: &MountRecord) -> nix::Result<()>;
    /// umount2(MNT_DETACH)
    fn detach(&self, target: &Path) -> nix::Result<()>;
    fn chroot(&self, path: &Path) -> nix::Result<()>;
    fn chdir(&self, path: &Path) -> nix::Result<()>;
    fn chown(&self, path: &Path, uid: Uid, gid: Gid) -> nix::Result<()>;
    fn unshare(&self, flags: CloneFlags) -> nix::Result<()>;
    fn write_file(&self, path: &Path, contents: &str) -> nix::Result<()>;
    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> nix::Result<()>;
    fn lookup_user(&self, name: &str) -> nix::Result<Option<Identity>>;
    fn init_groups(&self, name: &str, gid: Gid) -> nix::Result<()>;
    fn set_gid(&self, gid: Gid) -> nix::Result<()>;
    fn set_uid(&self, uid: Uid) -> nix::Result<()>;
    /// Drop every environment variable and install exactly `vars`.
    fn replace_environment(&self, vars: &[(String, String)]) -> nix::Result<()>;
    fn fork(&self) -> nix::Result<ForkResult>;
    fn wait(&self, child: Pid) -> nix::Result<WaitStatus>;
    /// execvp(3). Only ever returns on failure.
    fn exec(&self, program: &CString, argv: &[CString]) -> Errno;
    /// Ends the calling process with `code`. Never returns outside of tests.
    fn exit(&self, code: i32);
}

/// The real thing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxKernel;

fn errno_of(e: std::io::Error) -> Errno {
    Errno::from_raw(e.raw_os_error().unwrap_or(libc::EIO))
}

impl Kernel for LinuxKernel {
    fn mkdir(&self, path: &Path, mode: u32) -> nix::Result<()> {
        nix::unistd::mkdir(path, Mode::from_bits_truncate(mode))
    }

    fn rmdir(&self, path: &Path) -> nix::Result<()> {
        std::fs::remove_dir(path).map_err(errno_of)
    }

    fn mount(&self, record: &MountRecord) -> nix::Result<()> {
        crate::util::mount(record)
    }

    fn detach(&self, target: &Path) -> nix::Result<()> {
        umount2(target, MntFlags::MNT_DETACH)
    }

    fn chroot(&self, path: &Path) -> nix::Result<()> {
        nix::unistd::chroot(path)
    }

    fn chdir(&self, path: &Path) -> nix::Result<()> {
        nix::unistd::chdir(path)
    }

    fn chown(&self, path: &Path, uid: Uid, gid: Gid) -> nix::Result<()> {
        nix::unistd::chown(path, Some(uid), Some(gid))
    }

    fn unshare(&self, flags: CloneFlags) -> nix::Result<()> {
        nix::sched::unshare(flags)
    }

    fn write_file(&self, path: &Path, contents: &str) -> nix::Result<()> {
        std::fs::write(path, contents).map_err(errno_of)
    }

    fn pivot_root(&self, new_root: &Path, put_old: &Path) -> nix::Result<()> {
        nix::unistd::pivot_root(new_root, put_old)
    }

    fn lookup_user(&self, name: &str) -> nix::Result<Option<Identity>> {
        Ok(User::from_name(name)?.map(Identity::from))
    }

    fn init_groups(&self, name: &str, gid: Gid) -> nix::Result<()> {
        let name = CString::new(name).map_err(|_| Errno::EINVAL)?;
        nix::unistd::initgroups(&name, gid)
    }

    fn set_gid(&self, gid: Gid) -> nix::Result<()> {
        nix::unistd::setgid(gid)
    }

    fn set_uid(&self, uid: Uid) -> nix::Result<()> {
        nix::unistd::setuid(uid)
    }

    fn replace_environment(&self, vars: &[(String, String)]) -> nix::Result<()> {
        for (key, value) in vars {
            if key.is_empty()
                || key.contains('=')
                || key.contains('\0')
                || value.contains('\0')
            {
                return Err(Errno::EINVAL);
            }
        }

        let inherited: Vec<OsString> =
            std::env::vars_os().map(|(key, _)| key).collect();
        // SAFETY: the sandbox never runs more than one thread, nothing else
        // can be reading the environment concurrently.
        unsafe {
            for key in inherited {
                std::env::remove_var(key);
            }
            for (key, value) in vars {
                std::env::set_var(key, value);
            }
        }
        Ok(())
    }

    fn fork(&self) -> nix::Result<ForkResult> {
        // SAFETY: single threaded, the child only execs or exits.
        unsafe { nix::unistd::fork() }
    }

    fn wait(&self, child: Pid) -> nix::Result<WaitStatus> {
        waitpid(child, None)
    }

    fn exec(&self, program: &CString, argv: &[CString]) -> Errno {
        match nix::unistd::execvp(program, argv) {
            Err(e) => e,
            Ok(never) => match never {},
        }
    }

    fn exit(&self, code: i32) {
        log::logger().flush();
        std::process::exit(code)
    }
}
