use nix::unistd::{Gid, Uid};
use std::path::PathBuf;

/// The resolved target user. Looked up by name once per invocation and never
/// re-resolved after the mount namespace has been altered, since the name
/// service may no longer see the host's databases at that point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub uid: Uid,
    pub gid: Gid,
    pub home: PathBuf,
    pub shell: PathBuf,
}

impl Identity {
    /// Login shell if the account has one, otherwise `fallback`.
    pub fn shell_or(&self, fallback: &std::path::Path) -> PathBuf {
        if self.shell.as_os_str().is_empty() {
            fallback.to_path_buf()
        } else {
            self.shell.clone()
        }
    }
}

impl From<nix::unistd::User> for Identity {
    fn from(user: nix::unistd::User) -> Self {
        Identity {
            name: user.name,
            uid: user.uid,
            gid: user.gid,
            home: user.dir,
            shell: user.shell,
        }
    }
}
