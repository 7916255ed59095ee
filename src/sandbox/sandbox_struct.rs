use crate::config::Config;
use crate::error::SandboxError;
use crate::sandbox::SandboxLayout;
use crate::types::{Identity, MountRecord};
use crate::util::{Kernel, LinuxKernel};
use log::{debug, trace};
use nix::errno::Errno;
use std::path::{Path, PathBuf};

pub const DEFAULT_BASE_DIR: &str = "/var/lib/overjail";
pub const DEFAULT_USER: &str = "sandboxer";
pub const DEFAULT_SHELL: &str = "/bin/sh";
pub const DEFAULT_SEARCH_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

pub(crate) const TMPFS_SOURCE: &str = "overjail-tmp";
pub(crate) const OVERLAY_SOURCE: &str = "overjail";
pub(crate) const DIR_MODE: u32 = 0o755;

/// One sandbox instance and everything needed to build, enter and tear it
/// down. All three operations take their settings from here rather than from
/// process-wide state.
///
/// `prepare`, `run` and `destroy` must not be called concurrently against the
/// same base directory; nothing here guards against it.
pub struct Sandbox<K: Kernel = LinuxKernel> {
    pub layout: SandboxLayout,
    pub user: String,
    pub shell: PathBuf,
    pub search_path: String,
    pub user_namespace: bool,
    pub supervise: bool,
    pub(crate) kernel: K,
}

impl Sandbox<LinuxKernel> {
    pub fn from_config(config: &Config) -> Sandbox<LinuxKernel> {
        let mut sandbox = Sandbox::new(&config.base_dir, &config.user, LinuxKernel);
        sandbox.shell = config.shell.clone();
        sandbox.search_path = config.search_path.clone();
        sandbox.user_namespace = config.user_namespace;
        sandbox.supervise = config.supervise;
        sandbox
    }
}

impl<K: Kernel> Sandbox<K> {
    pub fn new(base: &Path, user: &str, kernel: K) -> Sandbox<K> {
        Sandbox {
            layout: SandboxLayout::new(base),
            user: user.to_string(),
            shell: PathBuf::from(DEFAULT_SHELL),
            search_path: DEFAULT_SEARCH_PATH.to_string(),
            user_namespace: false,
            supervise: true,
            kernel,
        }
    }

    pub fn resolve_identity(&self) -> Result<Identity, SandboxError> {
        trace!("Resolving identity '{}'", self.user);
        match self.kernel.lookup_user(&self.user) {
            Ok(Some(identity)) => {
                debug!(
                    "Resolved '{}' to uid/gid {}/{}",
                    identity.name, identity.uid, identity.gid
                );
                Ok(identity)
            }
            Ok(None) => Err(SandboxError::UnknownIdentity {
                name: self.user.clone(),
            }),
            Err(source) => Err(SandboxError::IdentityResolution {
                name: self.user.clone(),
                source,
            }),
        }
    }

    /* Creates a directory, treating "already exists" as success. */
    pub(crate) fn mkdir_tolerant(&self, path: &Path) -> Result<(), SandboxError> {
        match self.kernel.mkdir(path, DIR_MODE) {
            Ok(()) => {
                trace!("Created {}", path.display());
                Ok(())
            }
            Err(Errno::EEXIST) => {
                trace!("{} already exists", path.display());
                Ok(())
            }
            Err(e) => Err(SandboxError::setup(
                format!("mkdir {}", path.display()),
                e,
            )),
        }
    }

    pub(crate) fn apply_mount(
        &self,
        record: &MountRecord,
    ) -> Result<(), SandboxError> {
        debug!("Mounting {}", record);
        self.kernel
            .mount(record)
            .map_err(|e| SandboxError::setup(format!("mount {}", record), e))
    }
}
