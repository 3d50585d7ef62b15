//! Berryboot drive provisioning.
//!
//! Zeroes the partition table of the target drive, creates the boot and data partitions,
//! optionally encrypts the data partition, formats both and points the boot configuration
//! at the new layout. Every step is destructive, so the workflow stops at the first
//! failure and reports which stage failed; there is no retry and no resume.

pub mod boot_config;
pub mod errors;
pub mod events;
pub mod installer;
pub mod layout;
pub mod ops;
pub mod partition_table;
pub mod paths;
pub mod provision;
pub mod request;
pub mod stage;
pub mod stage_runner;

pub use errors::ProvisionError;
pub use events::ProvisionEvent;
pub use installer::{ConsoleGuard, Installer};
pub use layout::DerivedLayout;
pub use paths::SystemPaths;
pub use provision::{DriveFormatter, ProvisionPlan, StagePlan};
pub use request::{Filesystem, ProvisioningRequest};
pub use stage::Stage;

/// Size of the FAT boot partition in megabytes.
pub const BOOT_PARTITION_SIZE_MB: u64 = 50;

/// Largest set of existing boot files (in KB) that fits the new boot partition.
pub const BOOT_FILES_LIMIT_KB: u64 = BOOT_PARTITION_SIZE_MB * 1000;
