use crate::sandbox::SandboxLayout;
use crate::util::MountEntry;

/// What the host's mount table says about a sandbox. A sandbox that has been
/// entered by `run` is only visible from inside that run's namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxState {
    Absent,
    Prepared,
    /// Only one of the two mounts is present, usually after an interrupted
    /// `prepare` or `destroy`.
    Degraded,
}

impl SandboxState {
    pub fn observe(layout: &SandboxLayout, mounts: &[MountEntry]) -> SandboxState {
        let tmpfs = mounts
            .iter()
            .any(|m| m.dir == layout.tmpfs_mount && m.fstype == "tmpfs");
        let overlay = mounts
            .iter()
            .any(|m| m.dir == layout.overlay_mount && m.fstype == "overlay");
        match (tmpfs, overlay) {
            (false, false) => SandboxState::Absent,
            (true, true) => SandboxState::Prepared,
            _ => SandboxState::Degraded,
        }
    }
}

impl std::fmt::Display for SandboxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxState::Absent => write!(f, "absent"),
            SandboxState::Prepared => write!(f, "prepared"),
            SandboxState::Degraded => write!(f, "degraded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    fn entry(dir: &str, fstype: &str) -> MountEntry {
        MountEntry {
            dir: PathBuf::from(dir),
            fstype: fstype.to_string(),
        }
    }

    #[test]
    fn test_observe() {
        let layout = SandboxLayout::new(Path::new("/r"));
        assert_eq!(SandboxState::observe(&layout, &[]), SandboxState::Absent);
        assert_eq!(
            SandboxState::observe(
                &layout,
                &[entry("/r/overlay", "overlay"), entry("/r/top", "tmpfs")]
            ),
            SandboxState::Prepared
        );
        assert_eq!(
            SandboxState::observe(&layout, &[entry("/r/top", "tmpfs")]),
            SandboxState::Degraded
        );
        // a bind of something else at the overlay path does not count
        assert_eq!(
            SandboxState::observe(&layout, &[entry("/r/overlay", "ext4")]),
            SandboxState::Absent
        );
        assert_eq!(SandboxState::Prepared.to_string(), "prepared");
    }
}
