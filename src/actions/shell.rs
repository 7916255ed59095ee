use crate::sandbox::Sandbox;
use anyhow::{Context, Result};
use log::debug;

/// Runs the sandbox user's login shell, falling back to the configured shell
/// when the account has none.
pub fn shell(sandbox: &Sandbox, args: &[String]) -> Result<i32> {
    let identity = sandbox
        .resolve_identity()
        .context("Resolving the sandbox user")?;
    let shell = identity.shell_or(&sandbox.shell);
    debug!("Using shell {} for {}", shell.display(), identity.name);

    let mut command = vec![shell.to_string_lossy().into_owned()];
    command.extend(args.iter().cloned());

    sandbox
        .run_as(&identity, &command)
        .context(format!("Running {} in the sandbox", shell.display()))
}
