//! HAL trait definitions and implementations.
//!
//! This module defines the traits the drive formatter needs from the host and provides
//! both real (LinuxHal) and fake (FakeHal) implementations.

pub mod command;
pub mod fake_hal;
pub mod linux_hal;
pub mod mount_ops;
pub mod process_ops;
pub mod system_ops;

pub use command::CommandSpec;
pub use fake_hal::{FakeHal, Operation};
pub use linux_hal::LinuxHal;
pub use mount_ops::MountOps;
pub use process_ops::ProcessOps;
pub use system_ops::SystemOps;

/// Complete HAL combining all host operation traits.
pub trait SystemHal: ProcessOps + SystemOps + MountOps + Send + Sync {}

/// Automatically implement SystemHal for any type implementing all required traits.
impl<T> SystemHal for T where T: ProcessOps + SystemOps + MountOps + Send + Sync {}
