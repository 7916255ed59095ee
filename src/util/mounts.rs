use anyhow::{Result, anyhow};
use std::ffi::CStr;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub dir: PathBuf,
    pub fstype: String,
}

/// Entries of /proc/mounts at or below `base`, deepest first.
pub fn get_mounts(base: &Path) -> Result<Vec<MountEntry>> {
    let mut mounts = Vec::new();

    let system_mounts =
        unsafe { libc::setmntent(c"/proc/mounts".as_ptr(), c"r".as_ptr()) };

    if system_mounts.is_null() {
        return Err(anyhow!("Failed to open /proc/mounts".to_string(),));
    }

    loop {
        let mnt = unsafe { libc::getmntent(system_mounts) };
        if mnt.is_null() {
            break;
        }

        let mnt_dir = String::from(unsafe {
            CStr::from_ptr((*mnt).mnt_dir).to_string_lossy()
        });
        let mnt_type = String::from(unsafe {
            CStr::from_ptr((*mnt).mnt_type).to_string_lossy()
        });

        if Path::new(&mnt_dir).starts_with(base) {
            mounts.push(MountEntry {
                dir: PathBuf::from(mnt_dir),
                fstype: mnt_type,
            });
        }
    }

    unsafe { libc::endmntent(system_mounts) };

    mounts.sort_by(|a, b| b.dir.cmp(&a.dir));

    Ok(mounts)
}
