use crate::error::SandboxError;
use crate::sandbox::Sandbox;
use crate::types::{Identity, MountLog, MountRecord};
use crate::util::Kernel;
use log::{debug, error, trace, warn};
use nix::errno::Errno;
use nix::sched::CloneFlags;
use nix::sys::wait::WaitStatus;
use nix::unistd::ForkResult;
use std::ffi::CString;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Host filesystems bound into the sandbox, in mount order.
pub const AUX_MOUNTS: [&str; 4] = ["/dev", "/dev/shm", "/proc", "/tmp"];

/// Exit code of a forked child that never got as far as running the command.
pub const CHILD_SETUP_FAILED: i32 = 1;

impl<K: Kernel> Sandbox<K> {
    /**
     * Runs `command` inside the prepared sandbox as the target user.
     *
     * Without supervision this never returns on success, the process image is
     * replaced. With supervision it returns the exit code of the sandboxed child.
     */
    pub fn run(&self, command: &[String]) -> Result<i32, SandboxError> {
        if command.is_empty() {
            return Err(SandboxError::Usage(
                "run requires a command to execute".to_string(),
            ));
        }
        let identity = self.resolve_identity()?;
        self.run_as(&identity, command)
    }

    /**
     * Same as `run` with an identity that has already been resolved. Nothing here
     * looks the user up again.
     *
     * Mounts made along the way are never unwound explicitly. They all live in the
     * mount namespace created first thing, which the kernel destroys when the last
     * process inside it exits, whether we got as far as exec or not.
     */
    pub fn run_as(
        &self,
        identity: &Identity,
        command: &[String],
    ) -> Result<i32, SandboxError> {
        let argv = command
            .iter()
            .map(|arg| CString::new(arg.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| {
                SandboxError::Usage(
                    "command arguments must not contain NUL bytes".to_string(),
                )
            })?;
        let Some(program) = argv.first().cloned() else {
            return Err(SandboxError::Usage(
                "run requires a command to execute".to_string(),
            ));
        };

        let mut mounts = MountLog::new();

        self.unshare_namespaces(identity)?;

        trace!("Making / private");
        self.apply_logged(MountRecord::make_private(Path::new("/")), &mut mounts)?;

        /* pivot_root(2) wants the new root to be a mount point of its own */
        let new_root = self.layout.overlay_mount.clone();
        trace!("Rebinding {}", new_root.display());
        self.apply_logged(MountRecord::bind(&new_root, &new_root), &mut mounts)?;

        let aux_start = mounts.len();
        for aux in AUX_MOUNTS {
            let source = Path::new(aux);
            let target = self.layout.host_path(source);
            trace!("Binding {} to {}", aux, target.display());
            self.apply_logged(MountRecord::rbind(source, &target), &mut mounts)?;
        }

        self.switch_root()?;

        if !self.supervise {
            return Err(self.become_workload(identity, &program, &argv));
        }

        match self
            .kernel
            .fork()
            .map_err(|e| SandboxError::Supervision {
                operation: "fork".to_string(),
                source: e,
            })? {
            ForkResult::Child => {
                /* The child must never make it back to the caller's reporting,
                 * that is the supervisor's job. */
                let e = self.become_workload(identity, &program, &argv);
                match e.errno() {
                    Some(errno) => error!("{}: {}", e, errno),
                    None => error!("{}", e),
                }
                self.kernel.exit(CHILD_SETUP_FAILED);
                Err(e)
            }
            ForkResult::Parent { child } => {
                trace!("Waiting for sandboxed process {}", child);
                let code = loop {
                    match self.kernel.wait(child) {
                        Ok(WaitStatus::Exited(_, code)) => break code,
                        Ok(WaitStatus::Signaled(_, signal, _)) => {
                            debug!("Sandboxed process killed by {}", signal);
                            break 128 + signal as i32;
                        }
                        Ok(_) => continue,
                        Err(Errno::EINTR) => continue,
                        Err(e) => {
                            return Err(SandboxError::Supervision {
                                operation: format!("waiting for {}", child),
                                source: e,
                            });
                        }
                    }
                };

                self.release_aux_mounts(&mounts, aux_start);
                Ok(code)
            }
        }
    }

    fn apply_logged(
        &self,
        record: MountRecord,
        mounts: &mut MountLog,
    ) -> Result<(), SandboxError> {
        self.apply_mount(&record)?;
        mounts.push(record);
        Ok(())
    }

    fn unshare_namespaces(&self, identity: &Identity) -> Result<(), SandboxError> {
        let flags = if self.user_namespace {
            CloneFlags::CLONE_NEWNS | CloneFlags::CLONE_NEWUSER
        } else {
            CloneFlags::CLONE_NEWNS
        };
        trace!("Unsharing namespaces");
        self.kernel
            .unshare(flags)
            .map_err(|e| SandboxError::setup("unshare", e))?;

        if self.user_namespace {
            trace!(
                "Mapping namespace root to {}/{}",
                identity.uid, identity.gid
            );
            for (file, contents) in [
                ("/proc/self/setgroups", "deny".to_string()),
                ("/proc/self/uid_map", format!("0 {} 1", identity.uid)),
                ("/proc/self/gid_map", format!("0 {} 1", identity.gid)),
            ] {
                self.kernel
                    .write_file(Path::new(file), &contents)
                    .map_err(|e| {
                        SandboxError::privilege(format!("writing {}", file), e)
                    })?;
            }
        }
        Ok(())
    }

    /* Pivots into the sandbox root and gets rid of the old one. */
    fn switch_root(&self) -> Result<(), SandboxError> {
        if self.user_namespace {
            self.pivot_in_place()
        } else {
            self.pivot_via_old_root_dir()
        }
    }

    fn pivot_via_old_root_dir(&self) -> Result<(), SandboxError> {
        let new_root = &self.layout.overlay_mount;
        let old_root_name = format!(".old-root-{}", Uuid::new_v4());
        let old_root_host = new_root.join(&old_root_name);
        let old_root = PathBuf::from("/").join(&old_root_name);

        self.kernel.mkdir(&old_root_host, 0o700).map_err(|e| {
            SandboxError::setup(
                format!(
                    "creating a place to pivot the old root to at {}",
                    old_root_host.display()
                ),
                e,
            )
        })?;

        trace!("Pivoting root to {}", new_root.display());
        self.kernel
            .pivot_root(new_root, &old_root_host)
            .map_err(|e| SandboxError::setup("pivot_root", e))?;
        self.kernel
            .chdir(Path::new("/"))
            .map_err(|e| SandboxError::setup("chdir /", e))?;

        trace!("Detaching old root {}", old_root.display());
        self.kernel.detach(&old_root).map_err(|e| {
            SandboxError::setup(format!("unmounting old root {}", old_root.display()), e)
        })?;
        self.kernel.rmdir(&old_root).map_err(|e| {
            SandboxError::setup(format!("removing {}", old_root.display()), e)
        })
    }

    /**
     * Namespace root maps to the target user, who cannot create anything in
     * the root-owned overlay root. pivot_root(".", ".") stacks the old root on
     * top of the new one instead, and detaching "." then drops it.
     */
    fn pivot_in_place(&self) -> Result<(), SandboxError> {
        let new_root = &self.layout.overlay_mount;
        let here = Path::new(".");

        self.kernel.chdir(new_root).map_err(|e| {
            SandboxError::setup(format!("chdir {}", new_root.display()), e)
        })?;
        trace!("Pivoting root to {} in place", new_root.display());
        self.kernel
            .pivot_root(here, here)
            .map_err(|e| SandboxError::setup("pivot_root", e))?;

        trace!("Detaching old root");
        self.kernel
            .detach(here)
            .map_err(|e| SandboxError::setup("unmounting old root", e))?;
        self.kernel
            .chdir(Path::new("/"))
            .map_err(|e| SandboxError::setup("chdir /", e))
    }

    /* Only ever returns on failure. */
    fn become_workload(
        &self,
        identity: &Identity,
        program: &CString,
        argv: &[CString],
    ) -> SandboxError {
        if let Err(e) = self.switch_user(identity) {
            return e;
        }

        let command = argv
            .iter()
            .map(|s| s.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        trace!("Executing {}", command);
        let errno = self.kernel.exec(program, argv);
        SandboxError::Exec {
            command,
            source: errno,
        }
    }

    /* After the pivot the auxiliary binds show up at their original paths. */
    fn release_aux_mounts(&self, mounts: &MountLog, from: usize) {
        for target in mounts.targets_reversed_from(from) {
            let inside = match target.strip_prefix(&self.layout.overlay_mount) {
                Ok(rel) => Path::new("/").join(rel),
                Err(_) => target.clone(),
            };
            match self.kernel.detach(&inside) {
                Ok(()) => debug!("Detached {}", inside.display()),
                Err(e) => warn!("Failed to detach {}: {}", inside.display(), e),
            }
        }
    }
}
