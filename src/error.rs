use nix::errno::Errno;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the sandbox lifecycle. Every variant names the operation that
/// failed and keeps the kernel's errno as its source.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("failed to look up user '{name}'")]
    IdentityResolution {
        name: String,
        #[source]
        source: Errno,
    },

    #[error("user '{name}' does not exist")]
    UnknownIdentity { name: String },

    #[error("{operation} failed")]
    FilesystemSetup {
        operation: String,
        #[source]
        source: Errno,
    },

    #[error("{operation} failed")]
    PrivilegeTransition {
        operation: String,
        #[source]
        source: Errno,
    },

    #[error("failed to execute {command}")]
    Exec {
        command: String,
        #[source]
        source: Errno,
    },

    #[error("{operation} failed")]
    Supervision {
        operation: String,
        #[source]
        source: Errno,
    },

    #[error("teardown failed: {}", .0.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; "))]
    Teardown(Vec<TeardownFailure>),

    #[error("usage: {0}")]
    Usage(String),
}

impl SandboxError {
    pub fn setup(operation: impl Into<String>, source: Errno) -> Self {
        SandboxError::FilesystemSetup {
            operation: operation.into(),
            source,
        }
    }

    pub fn privilege(operation: impl Into<String>, source: Errno) -> Self {
        SandboxError::PrivilegeTransition {
            operation: operation.into(),
            source,
        }
    }

    /// Underlying errno, when there is exactly one.
    pub fn errno(&self) -> Option<Errno> {
        match self {
            SandboxError::IdentityResolution { source, .. }
            | SandboxError::FilesystemSetup { source, .. }
            | SandboxError::PrivilegeTransition { source, .. }
            | SandboxError::Exec { source, .. }
            | SandboxError::Supervision { source, .. } => Some(*source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub operation: &'static str,
    pub path: PathBuf,
    pub errno: Errno,
}

impl std::fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}: {}", self.operation, self.path.display(), self.errno)
    }
}
