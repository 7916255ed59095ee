use crate::error::SandboxError;
use crate::sandbox::Sandbox;
use crate::sandbox::sandbox_struct::{OVERLAY_SOURCE, TMPFS_SOURCE};
use crate::types::MountRecord;
use crate::util::Kernel;
use log::{debug, trace, warn};
use nix::errno::Errno;
use std::path::{Path, PathBuf};

/// What `prepare` could not do without failing outright.
#[derive(Debug, Default)]
pub struct PrepareReport {
    /// Paths (as seen inside the sandbox) that could not be chowned.
    pub chown_failures: Vec<(PathBuf, Errno)>,
}

impl<K: Kernel> Sandbox<K> {
    /**
     * Builds the overlay: a tmpfs at `top` holds the writable layer, and the
     * overlay combining it with the host's / is mounted at `overlay`.
     *
     * When `chown_targets` is non-empty the current process chroots into the
     * overlay and chowns each path to the target user. That chroot is never
     * undone, so only call this from a process that exits afterwards. A path
     * that fails to chown is logged and skipped.
     *
     * The sandbox must be absent beforehand; call `destroy` first.
     */
    pub fn prepare(
        &self,
        chown_targets: &[PathBuf],
    ) -> Result<PrepareReport, SandboxError> {
        let layout = &self.layout;
        trace!("Preparing sandbox at {}", layout.root.display());

        self.mkdir_tolerant(&layout.root)?;
        self.mkdir_tolerant(&layout.tmpfs_mount)?;
        self.apply_mount(&MountRecord::tmpfs(TMPFS_SOURCE, &layout.tmpfs_mount))?;

        self.mkdir_tolerant(&layout.overlay_work)?;
        self.mkdir_tolerant(&layout.overlay_upper)?;
        self.mkdir_tolerant(&layout.overlay_mount)?;
        self.apply_mount(&MountRecord::overlay(
            OVERLAY_SOURCE,
            &layout.overlay_mount,
            &layout.overlay_upper,
            &layout.overlay_work,
        ))?;
        debug!("Overlay mounted at {}", layout.overlay_mount.display());

        let mut report = PrepareReport::default();
        if chown_targets.is_empty() {
            return Ok(report);
        }

        let identity = self.resolve_identity()?;

        self.kernel.chroot(&layout.overlay_mount).map_err(|e| {
            SandboxError::setup(
                format!("chroot {}", layout.overlay_mount.display()),
                e,
            )
        })?;
        self.kernel
            .chdir(Path::new("/"))
            .map_err(|e| SandboxError::setup("chdir /", e))?;

        for path in chown_targets {
            match self.kernel.chown(path, identity.uid, identity.gid) {
                Ok(()) => debug!(
                    "Chowned {} to {}:{}",
                    path.display(),
                    identity.uid,
                    identity.gid
                ),
                Err(e) => {
                    warn!("Failed to chown {}: {}", path.display(), e);
                    report.chown_failures.push((path.clone(), e));
                }
            }
        }

        Ok(report)
    }
}
