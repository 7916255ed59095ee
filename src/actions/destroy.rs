use crate::sandbox::Sandbox;
use anyhow::{Context, Result};
use log::info;

pub fn destroy(sandbox: &Sandbox) -> Result<()> {
    sandbox.destroy().context(format!(
        "Destroying sandbox at {}",
        sandbox.layout.root.display()
    ))?;
    info!("Sandbox at {} destroyed", sandbox.layout.root.display());
    Ok(())
}
