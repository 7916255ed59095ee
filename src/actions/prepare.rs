use crate::outln;
use crate::sandbox::Sandbox;
use crate::util::set_json_output;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::Value;
use std::path::PathBuf;

/// Replaces whatever sandbox exists at the base directory with a fresh one.
pub fn prepare(sandbox: &Sandbox, paths: &[PathBuf]) -> Result<()> {
    sandbox
        .destroy()
        .context("Destroying the previous sandbox before preparing")?;

    let report = sandbox.prepare(paths).context(format!(
        "Preparing sandbox at {}",
        sandbox.layout.root.display()
    ))?;

    for path in paths {
        if !report.chown_failures.iter().any(|(failed, _)| failed == path) {
            debug!(
                "{} is now backed by {}",
                path.display(),
                sandbox.layout.upper_path(path).display()
            );
        }
    }

    if report.chown_failures.is_empty() {
        info!("Sandbox prepared at {}", sandbox.layout.root.display());
    } else {
        warn!(
            "Sandbox prepared at {}, but {} of {} paths could not be handed to {}",
            sandbox.layout.root.display(),
            report.chown_failures.len(),
            paths.len(),
            sandbox.user
        );
    }

    for (path, errno) in &report.chown_failures {
        outln!("{}: {}", path.display(), errno);
    }
    set_json_output(
        "chown_failures",
        Value::Array(
            report
                .chown_failures
                .iter()
                .map(|(path, _)| Value::String(path.to_string_lossy().into_owned()))
                .collect(),
        ),
    );

    Ok(())
}
