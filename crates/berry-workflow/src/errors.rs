use crate::Filesystem;
use berry_hal::HalError;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure point of a provisioning run. `Display` is the text shown to the user.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Unable to find iSCSI device")]
    IscsiDeviceNotFound,

    #[error("SD card contains extra files that do not belong to Berryboot. Please copy them to another disk and delete them from card.")]
    BootFilesTooLarge { size_kb: u64, limit_kb: u64 },

    #[error("Error saving boot files to memory. SD card may be damaged.")]
    SaveBootFiles { cause: String },

    #[error("Error unmounting system partition.")]
    UnmountSystemPartition { cause: String },

    #[error("Error zero'ing MBR/GPT. SD card may be broken or advertising wrong capacity.")]
    DeviceTooSmall { blocks: u64 },

    #[error("Error zero'ing MBR/GPT. SD card may be broken or advertising wrong capacity.")]
    ZeroPartitionTable(#[source] HalError),

    #[error("Error partitioning")]
    Partition(#[source] HalError),

    #[error("Error writing u-boot to disk")]
    InstallSpl(#[source] HalError),

    #[error("Error formatting boot partition (vfat)")]
    FormatBoot(#[source] HalError),

    #[error("Error Formatting data partition ({filesystem})")]
    FormatData {
        filesystem: Filesystem,
        #[source]
        source: HalError,
    },

    #[error("Error editing {}: {source}", .file.display())]
    BootConfig {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SD card broken (writes do not persist)")]
    WritesDoNotPersist,
}

impl ProvisionError {
    pub(crate) fn boot_config(file: &std::path::Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| ProvisionError::BootConfig {
            file: file.to_path_buf(),
            source,
        }
    }
}
