use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Filesystem for the data partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filesystem {
    Ext4,
    /// ext4 without discard at mkfs time; slow or unsupported TRIM on many cards.
    #[default]
    Ext4NoDiscard,
    Btrfs,
}

impl Filesystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Filesystem::Ext4 => "ext4",
            Filesystem::Ext4NoDiscard => "ext4-nodiscard",
            Filesystem::Btrfs => "btrfs",
        }
    }
}

impl FromStr for Filesystem {
    type Err = Infallible;

    /// Unrecognized names fall back to [`Filesystem::Ext4NoDiscard`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "ext4" => Filesystem::Ext4,
            "btrfs" => Filesystem::Btrfs,
            _ => Filesystem::Ext4NoDiscard,
        })
    }
}

impl fmt::Display for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller asked for. Immutable once the formatter is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    /// Raw device name (`mmcblk0`, `sda`) or `iscsi`.
    pub drive: String,
    /// Partition the system is currently booted from.
    pub boot_device: String,
    pub filesystem: Filesystem,
    pub initialize_data: bool,
    pub use_password: bool,
}

impl ProvisioningRequest {
    pub fn new(drive: impl Into<String>, boot_device: impl Into<String>) -> Self {
        Self {
            drive: drive.into(),
            boot_device: boot_device.into(),
            filesystem: Filesystem::default(),
            initialize_data: false,
            use_password: false,
        }
    }

    pub fn filesystem(mut self, filesystem: Filesystem) -> Self {
        self.filesystem = filesystem;
        self
    }

    pub fn initialize_data(mut self, initialize_data: bool) -> Self {
        self.initialize_data = initialize_data;
        self
    }

    pub fn use_password(mut self, use_password: bool) -> Self {
        self.use_password = use_password;
        self
    }
}
