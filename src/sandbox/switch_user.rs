use crate::error::SandboxError;
use crate::sandbox::Sandbox;
use crate::types::Identity;
use crate::util::Kernel;
use log::trace;
use nix::unistd::{Gid, Uid};

/// The ids a process ends up with after `switch_user`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    pub uid: Uid,
    pub gid: Gid,
    pub supplementary_groups: bool,
}

impl Credentials {
    pub fn of(identity: &Identity) -> Credentials {
        Credentials {
            uid: identity.uid,
            gid: identity.gid,
            supplementary_groups: true,
        }
    }

    /* Inside a user namespace the target identity is mapped to 0, and setgroups(2)
     * has been denied so the gid map could be written. */
    pub fn namespace_root() -> Credentials {
        Credentials {
            uid: Uid::from_raw(0),
            gid: Gid::from_raw(0),
            supplementary_groups: false,
        }
    }
}

impl<K: Kernel> Sandbox<K> {
    pub fn credentials_for(&self, identity: &Identity) -> Credentials {
        if self.user_namespace {
            Credentials::namespace_root()
        } else {
            Credentials::of(identity)
        }
    }

    /// The only environment a sandboxed program gets to see.
    pub fn sanitized_environment(&self, identity: &Identity) -> Vec<(String, String)> {
        vec![
            ("USER".to_string(), identity.name.clone()),
            ("LOGNAME".to_string(), identity.name.clone()),
            ("HOME".to_string(), identity.home.to_string_lossy().into_owned()),
            ("SHELL".to_string(), self.shell.to_string_lossy().into_owned()),
            ("PATH".to_string(), self.search_path.clone()),
        ]
    }

    /**
     * Drops to `identity` for good: supplementary groups, then gid, then uid (the
     * gid can no longer be changed once the uid is gone), then replaces the whole
     * environment. Any failure leaves the process in an unknown state and must be
     * treated as fatal by the caller.
     */
    pub fn switch_user(&self, identity: &Identity) -> Result<(), SandboxError> {
        let credentials = self.credentials_for(identity);

        if credentials.supplementary_groups {
            trace!("Setting supplementary groups of {}", identity.name);
            self.kernel
                .init_groups(&identity.name, identity.gid)
                .map_err(|e| {
                    SandboxError::privilege(
                        format!("setting supplementary groups of {}", identity.name),
                        e,
                    )
                })?;
        }

        trace!("Setting gid {}", credentials.gid);
        self.kernel.set_gid(credentials.gid).map_err(|e| {
            SandboxError::privilege(format!("setgid {}", credentials.gid), e)
        })?;

        trace!("Setting uid {}", credentials.uid);
        self.kernel.set_uid(credentials.uid).map_err(|e| {
            SandboxError::privilege(format!("setuid {}", credentials.uid), e)
        })?;

        self.kernel
            .replace_environment(&self.sanitized_environment(identity))
            .map_err(|e| SandboxError::privilege("replacing environment", e))
    }
}
