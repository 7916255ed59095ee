use nix::mount::MsFlags;
use std::path::{Path, PathBuf};

/// One mount(2) call, described as data so it can be logged, recorded and
/// replayed against a fake kernel in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub source: Option<PathBuf>,
    pub target: PathBuf,
    pub fstype: Option<String>,
    pub flags: MsFlags,
    pub data: Option<String>,
}

impl MountRecord {
    pub fn tmpfs(source: &str, target: &Path) -> MountRecord {
        MountRecord {
            source: Some(PathBuf::from(source)),
            target: target.to_path_buf(),
            fstype: Some("tmpfs".to_string()),
            flags: MsFlags::empty(),
            data: None,
        }
    }

    /// Overlay of the host root (lower) with `upper`, using `work` as the
    /// overlayfs scratch directory. Both must live on the same filesystem.
    pub fn overlay(
        source: &str,
        target: &Path,
        upper: &Path,
        work: &Path,
    ) -> MountRecord {
        MountRecord {
            source: Some(PathBuf::from(source)),
            target: target.to_path_buf(),
            fstype: Some("overlay".to_string()),
            flags: MsFlags::empty(),
            data: Some(format!(
                "lowerdir=/,upperdir={},workdir={}",
                upper.display(),
                work.display()
            )),
        }
    }

    pub fn bind(source: &Path, target: &Path) -> MountRecord {
        MountRecord {
            source: Some(source.to_path_buf()),
            target: target.to_path_buf(),
            fstype: None,
            flags: MsFlags::MS_BIND,
            data: None,
        }
    }

    /// Bind of `source` together with every mount below it. Inside a user
    /// namespace the submounts of trees like /dev and /proc are locked to their
    /// parent, and the kernel refuses to bind those trees without them.
    pub fn rbind(source: &Path, target: &Path) -> MountRecord {
        MountRecord {
            flags: MsFlags::MS_BIND | MsFlags::MS_REC,
            ..MountRecord::bind(source, target)
        }
    }

    /* Changes propagation of `target` and everything below it to private, so
     * nothing done afterwards leaks back into the mount namespace we came from. */
    pub fn make_private(target: &Path) -> MountRecord {
        MountRecord {
            source: None,
            target: target.to_path_buf(),
            fstype: None,
            flags: MsFlags::MS_PRIVATE | MsFlags::MS_REC,
            data: None,
        }
    }
}

impl std::fmt::Display for MountRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} [type={}, flags={}, data={}]",
            self.source
                .as_deref()
                .map(|s| s.display().to_string())
                .unwrap_or_else(|| "none".to_string()),
            self.target.display(),
            self.fstype.as_deref().unwrap_or(""),
            self.flags.bits(),
            self.data.as_deref().unwrap_or(""),
        )
    }
}

/// Mounts applied by one `run`, in application order.
///
/// Nothing in here is unwound explicitly on failure: every entry lives in the
/// private mount namespace created at the start of `run`, and the kernel tears
/// the whole namespace down once the last process using it exits. The log only
/// exists so the supervisor can release the auxiliary binds in reverse order
/// after its child is gone.
#[derive(Debug, Default, Clone)]
pub struct MountLog {
    applied: Vec<MountRecord>,
}

impl MountLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: MountRecord) {
        self.applied.push(record);
    }

    pub fn len(&self) -> usize {
        self.applied.len()
    }

    /// Targets of the entries from index `from` onward, newest first.
    pub fn targets_reversed_from(&self, from: usize) -> Vec<PathBuf> {
        self.applied
            .iter()
            .skip(from)
            .rev()
            .map(|r| r.target.clone())
            .collect()
    }
}
