use crate::types::MountRecord;
use anyhow::{Result, anyhow};
use log::warn;
use std::path::Path;

pub fn mount(record: &MountRecord) -> nix::Result<()> {
    let result = nix::mount::mount(
        record.source.as_deref(),
        record.target.as_path(),
        record.fstype.as_deref(),
        record.flags,
        record.data.as_deref(),
    );

    // Overlay on top of an overlay root is a common way to hit EINVAL, give
    // whoever is reading the log a hint.
    if result == Err(nix::errno::Errno::EINVAL)
        && record.fstype.as_deref() == Some("overlay")
        && record
            .data
            .as_deref()
            .map(|d| d.contains("lowerdir=/,"))
            .unwrap_or(false)
    {
        warn!(
            "overlayfs refused {}; the host / may itself be an overlay and the kernel \
             limits how deeply overlays can be stacked",
            record.target.display()
        );
    }

    result
}

/**
 * Paths end up verbatim inside the overlayfs option string, which is comma separated
 * and has no escaping, so only allow a conservative set of characters.
 */
pub fn check_path_for_mount_option_compatibility(path: &Path) -> Result<()> {
    if path.components().next().is_none() {
        return Err(anyhow!("Base path is empty"));
    }

    let Some(text) = path.to_str() else {
        return Err(anyhow!(
            "Base path {} is not valid UTF-8",
            path.display()
        ));
    };

    match text
        .chars()
        .find(|c| !(c.is_alphanumeric() || "_-./@%".contains(*c)))
    {
        Some(c) => Err(anyhow!(
            "Base path {} contains '{}', which cannot appear in overlay mount options",
            path.display(),
            c
        )),
        None => Ok(()),
    }
}
