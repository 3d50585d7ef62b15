//! Device names derived once from a request.

use crate::{ProvisionError, ProvisioningRequest, SystemPaths};
use berry_hal::path::partition_name;
use berry_hal::sysfs::block;

/// Sentinel drive name meaning "the device attached through an iSCSI session".
pub const ISCSI_DRIVE: &str = "iscsi";
/// Device that carries the shared boot partition.
pub const SHARED_BOOT_DEVICE: &str = "mmcblk0";
/// The shared boot partition other drives reuse.
pub const SHARED_BOOT_PARTITION: &str = "mmcblk0p1";

/// Resolved device names for one run. Never recomputed after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedLayout {
    pub device: String,
    pub data_device: String,
    /// The FAT partition created on `device` when `reformat_boot` is set.
    pub boot_partition: String,
    /// FAT partition the boot files live on once formatting is done.
    pub system_partition: String,
    pub reformat_boot: bool,
    pub iscsi: bool,
}

impl DerivedLayout {
    pub fn resolve(
        request: &ProvisioningRequest,
        paths: &SystemPaths,
    ) -> Result<Self, ProvisionError> {
        let (device, iscsi) = if request.drive == ISCSI_DRIVE {
            let found = block::find_session_device(&paths.sys_class_block).map_err(|err| {
                log::error!("iSCSI discovery failed: {:#}", err);
                ProvisionError::IscsiDeviceNotFound
            })?;
            match found {
                Some(dev) => (dev, true),
                None => return Err(ProvisionError::IscsiDeviceNotFound),
            }
        } else {
            (request.drive.clone(), false)
        };

        let reformat_boot = needs_boot_reformat(&device, &request.boot_device);
        let (data_device, boot_partition) = if iscsi {
            // iSCSI disks always take the bare digit.
            (
                format!("{}{}", device, data_partition_number(reformat_boot)),
                format!("{}1", device),
            )
        } else {
            (
                derive_data_device(&device, reformat_boot),
                partition_name(&device, 1),
            )
        };

        let system_partition = if reformat_boot {
            boot_partition.clone()
        } else {
            SHARED_BOOT_PARTITION.to_string()
        };

        log::info!(
            "layout: device={} data={} boot={} system={} reformat_boot={} iscsi={}",
            device,
            data_device,
            boot_partition,
            system_partition,
            reformat_boot,
            iscsi
        );

        Ok(Self {
            device,
            data_device,
            boot_partition,
            system_partition,
            reformat_boot,
            iscsi,
        })
    }
}

/// True when this run must create its own boot partition instead of reusing the shared one.
pub fn needs_boot_reformat(device: &str, boot_device: &str) -> bool {
    device == SHARED_BOOT_DEVICE || boot_device != SHARED_BOOT_PARTITION
}

pub fn derive_data_device(device: &str, reformat_boot: bool) -> String {
    partition_name(device, data_partition_number(reformat_boot))
}

fn data_partition_number(reformat_boot: bool) -> u32 {
    if reformat_boot {
        2
    } else {
        1
    }
}
