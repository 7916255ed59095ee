use std::path::{Path, PathBuf};

/// Where a sandbox lives on disk. Recomputed from the base directory on every
/// invocation, never persisted.
///
/// `overlay_work` and `overlay_upper` sit on the tmpfs mounted at
/// `tmpfs_mount`, so they only exist while that tmpfs is mounted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxLayout {
    pub root: PathBuf,
    pub tmpfs_mount: PathBuf,
    pub overlay_work: PathBuf,
    pub overlay_upper: PathBuf,
    pub overlay_mount: PathBuf,
}

impl SandboxLayout {
    pub fn new(base: &Path) -> SandboxLayout {
        let tmpfs_mount = base.join("top");
        SandboxLayout {
            root: base.to_path_buf(),
            overlay_work: tmpfs_mount.join("workdir"),
            overlay_upper: tmpfs_mount.join("layer"),
            tmpfs_mount,
            overlay_mount: base.join("overlay"),
        }
    }

    /// Host-side location of `inside`, a path as seen from within the sandbox.
    pub fn host_path(&self, inside: &Path) -> PathBuf {
        self.overlay_mount
            .join(inside.strip_prefix("/").unwrap_or(inside))
    }

    /// Where a modification of `inside` ends up after copy-up.
    pub fn upper_path(&self, inside: &Path) -> PathBuf {
        self.overlay_upper
            .join(inside.strip_prefix("/").unwrap_or(inside))
    }
}
