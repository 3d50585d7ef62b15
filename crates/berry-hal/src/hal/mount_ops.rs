//! Mount operations trait.

use crate::HalResult;
use std::path::Path;

/// Trait for mounting and unmounting filesystems.
pub trait MountOps {
    /// Mount a device to a target path.
    ///
    /// # Arguments
    /// * `device` - Device path (e.g., `/dev/mmcblk0p1`)
    /// * `target` - Mount point path
    /// * `fstype` - Optional filesystem type (e.g., `"vfat"`, `"ext4"`)
    fn mount_device(&self, device: &Path, target: &Path, fstype: Option<&str>) -> HalResult<()>;

    /// Unmount a filesystem. Unmounting something that is not mounted is not an error.
    fn unmount(&self, target: &Path) -> HalResult<()>;
}
