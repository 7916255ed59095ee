use crate::error::{SandboxError, TeardownFailure};
use crate::sandbox::Sandbox;
use crate::util::Kernel;
use log::{debug, error, trace};
use nix::errno::Errno;

impl<K: Kernel> Sandbox<K> {
    /**
     * Unmounts and removes everything `prepare` created. Safe to call on a sandbox
     * that was never prepared, is half prepared, or is already gone.
     *
     * Every step is attempted even after an earlier one failed; all failures are
     * returned together.
     */
    pub fn destroy(&self) -> Result<(), SandboxError> {
        let layout = &self.layout;
        let mut failures = Vec::new();

        trace!("Destroying sandbox at {}", layout.root.display());

        /* The overlay's upper layer lives on the tmpfs, so the overlay goes first. */
        for target in [&layout.overlay_mount, &layout.tmpfs_mount] {
            match self.kernel.detach(target) {
                Ok(()) => debug!("Unmounted {}", target.display()),
                Err(Errno::EINVAL) | Err(Errno::ENOENT) => {
                    trace!("{} is not mounted", target.display())
                }
                Err(e) => {
                    error!("Failed to unmount {}: {}", target.display(), e);
                    failures.push(TeardownFailure {
                        operation: "unmount",
                        path: target.clone(),
                        errno: e,
                    });
                }
            }
        }

        for dir in [&layout.overlay_mount, &layout.tmpfs_mount, &layout.root] {
            match self.kernel.rmdir(dir) {
                Ok(()) => debug!("Removed {}", dir.display()),
                Err(Errno::ENOENT) => trace!("{} does not exist", dir.display()),
                Err(e) => {
                    error!("Failed to remove {}: {}", dir.display(), e);
                    failures.push(TeardownFailure {
                        operation: "remove",
                        path: dir.clone(),
                        errno: e,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SandboxError::Teardown(failures))
        }
    }
}
