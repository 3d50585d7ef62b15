//! CLI argument parsing for the drive formatter.

use berry_workflow::{Filesystem, ProvisioningRequest};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "berry-format", version)]
#[command(about = "Partition and format a drive for Berryboot")]
#[command(long_about = "Partition and format a drive for Berryboot.\n\n\
    Creates a FAT boot partition (when the drive needs its own) and a data partition,\n\
    optionally LUKS-encrypted, then points cmdline.txt and uEnv.txt at the new layout.\n\
    Everything on the target drive is destroyed.")]
pub struct Cli {
    /// Target drive without /dev (e.g. mmcblk0, sda), or `iscsi` for the iSCSI-attached disk
    #[arg(long)]
    pub drive: String,

    /// Partition the system is currently booted from
    #[arg(long, default_value = "mmcblk0p1")]
    pub boot_device: String,

    /// Data partition filesystem: ext4, ext4-nodiscard or btrfs
    #[arg(long, default_value = "ext4-nodiscard")]
    pub filesystem: Filesystem,

    /// Initialize the data partition and rewrite the boot configuration now
    #[arg(long)]
    pub initialize_data: bool,

    /// Encrypt the data partition (the passphrase is asked on tty5)
    #[arg(long)]
    pub password: bool,

    /// Installer preferences (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log file location
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Print the execution plan and exit without touching the drive
    #[arg(long)]
    pub dry_run: bool,

    /// Confirm that the target drive may be wiped
    #[arg(long)]
    pub yes_i_know: bool,
}

impl Cli {
    pub fn request(&self) -> ProvisioningRequest {
        ProvisioningRequest::new(&self.drive, &self.boot_device)
            .filesystem(self.filesystem)
            .initialize_data(self.initialize_data)
            .use_password(self.password)
    }
}
