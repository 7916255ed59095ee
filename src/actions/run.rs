use crate::sandbox::Sandbox;
use anyhow::{Context, Result};
use log::warn;
use nix::errno::Errno;

/// Returns the exit code of the sandboxed command. Without supervision this
/// only returns on failure.
pub fn run(sandbox: &Sandbox, command: &[String]) -> Result<i32> {
    sandbox
        .run(command)
        .inspect_err(|e| {
            if sandbox.user_namespace && e.errno() == Some(Errno::EPERM) {
                warn!(
                    "Unprivileged user namespaces may be disabled on this host"
                );
            }
        })
        .context(format!("Running `{}` in the sandbox", command.join(" ")))
}
