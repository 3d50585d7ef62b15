//! Block device naming.
use std::path::{Path, PathBuf};

/// Partition name for `device`. SCSI and IDE style names (`sda`, `hda`) take a bare digit;
/// anything else ending in a digit (`mmcblk0`, `nvme0n1`) takes a `p` infix.
pub fn partition_name(device: &str, number: u32) -> String {
    if uses_bare_suffix(device) {
        format!("{}{}", device, number)
    } else {
        format!("{}p{}", device, number)
    }
}

pub fn uses_bare_suffix(device: &str) -> bool {
    device.starts_with("sd") || device.starts_with("hd")
}

/// `/dev` path of a device name such as `mmcblk0p2` or `mapper/luks`.
pub fn dev_path(dev_dir: &Path, name: &str) -> PathBuf {
    dev_dir.join(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scsi_and_ide_names_take_bare_digit() {
        assert_eq!(partition_name("sda", 2), "sda2");
        assert_eq!(partition_name("hdb", 1), "hdb1");
    }

    #[test]
    fn other_names_take_p_infix() {
        assert_eq!(partition_name("mmcblk0", 1), "mmcblk0p1");
        assert_eq!(partition_name("nvme0n1", 2), "nvme0n1p2");
    }

    #[test]
    fn dev_path_joins_nested_names() {
        assert_eq!(
            dev_path(Path::new("/dev"), "mapper/luks"),
            PathBuf::from("/dev/mapper/luks")
        );
    }
}
