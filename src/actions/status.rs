use crate::outln;
use crate::sandbox::{Sandbox, SandboxState};
use crate::util::{get_mounts, set_json_output};
use anyhow::{Context, Result};
use log::debug;
use serde_json::Value;

pub fn status(sandbox: &Sandbox) -> Result<()> {
    let layout = &sandbox.layout;
    let mounts = get_mounts(&layout.root).context(format!(
        "Reading mounts below {}",
        layout.root.display()
    ))?;
    for mount in &mounts {
        debug!("{} mounted at {}", mount.fstype, mount.dir.display());
    }

    let state = SandboxState::observe(layout, &mounts);

    set_json_output("state", Value::String(state.to_string()));
    set_json_output(
        "base_dir",
        Value::String(layout.root.to_string_lossy().into_owned()),
    );
    outln!("{}", state);

    Ok(())
}
