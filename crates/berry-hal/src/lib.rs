//! Berryboot host abstraction layer.
//!
//! Every operation that touches the running system (child processes, sync, the page cache,
//! mounts) goes through the traits in [`hal`], so the provisioning workflow can be
//! exercised against [`FakeHal`] without root privileges or a real SD card.

pub mod error;
pub mod hal;
pub mod path;
pub mod sysfs;

pub use error::{HalError, HalResult};
pub use hal::{
    CommandSpec, FakeHal, LinuxHal, MountOps, Operation, ProcessOps, SystemHal, SystemOps,
};
