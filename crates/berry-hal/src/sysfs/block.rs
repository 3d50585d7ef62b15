//! Helpers related to block devices in sysfs.

use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

/// Marker found in the sysfs link target of devices attached through an iSCSI session.
pub const SESSION_MARKER: &str = "/session";

/// Reads the block count from `<sys_class_block>/<dev>/size`.
///
/// The `size` file is expressed in 512-byte sectors.
pub fn block_count(sys_class_block: &Path, dev: &str) -> Result<u64> {
    let path = sys_class_block.join(dev).join("size");
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    raw.trim()
        .parse::<u64>()
        .map_err(|e| anyhow!("invalid block count in {}: {}", path.display(), e))
}

/// Returns the first entry of `sys_class_block` whose link target contains
/// [`SESSION_MARKER`], in directory-enumeration order.
pub fn find_session_device(sys_class_block: &Path) -> Result<Option<String>> {
    let entries = fs::read_dir(sys_class_block)
        .with_context(|| format!("Failed to read {}", sys_class_block.display()))?;
    for entry in entries.flatten() {
        let Ok(target) = fs::read_link(entry.path()) else {
            continue;
        };
        if target.to_string_lossy().contains(SESSION_MARKER) {
            return Ok(Some(entry.file_name().to_string_lossy().to_string()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn block_count_reads_sectors() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("mmcblk0")).unwrap();
        fs::write(tmp.path().join("mmcblk0/size"), "15523840\n").unwrap();
        assert_eq!(block_count(tmp.path(), "mmcblk0").unwrap(), 15_523_840);
    }

    #[test]
    fn block_count_rejects_garbage() {
        let tmp = tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("sda")).unwrap();
        fs::write(tmp.path().join("sda/size"), "lots\n").unwrap();
        assert!(block_count(tmp.path(), "sda").is_err());
        assert!(block_count(tmp.path(), "sdb").is_err());
    }

    #[test]
    fn session_device_is_found_by_link_target() {
        let tmp = tempdir().unwrap();
        let devices = tmp.path().join("devices");
        let local = devices.join("platform/mmc/mmcblk0");
        let remote = devices.join("platform/host0/session1/target0:0:0/block/sda");
        fs::create_dir_all(&local).unwrap();
        fs::create_dir_all(&remote).unwrap();

        let class = tmp.path().join("class/block");
        fs::create_dir_all(&class).unwrap();
        symlink(&local, class.join("mmcblk0")).unwrap();
        symlink(&remote, class.join("sda")).unwrap();

        assert_eq!(find_session_device(&class).unwrap(), Some("sda".to_string()));
    }

    #[test]
    fn session_device_absent_returns_none() {
        let tmp = tempdir().unwrap();
        let local = tmp.path().join("devices/mmcblk0");
        fs::create_dir_all(&local).unwrap();
        let class = tmp.path().join("class");
        fs::create_dir_all(&class).unwrap();
        symlink(&local, class.join("mmcblk0")).unwrap();
        // Plain directories are not links and are skipped.
        fs::create_dir_all(class.join("ram0")).unwrap();

        assert_eq!(find_session_device(&class).unwrap(), None);
    }
}
