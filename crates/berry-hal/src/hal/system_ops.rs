//! System-level operations (sync, page cache).

use crate::HalResult;

/// System operations trait.
pub trait SystemOps {
    /// Flush all filesystem buffers to storage.
    fn sync(&self) -> HalResult<()>;

    /// Ask the kernel to drop the page cache, dentries and inodes so the next read
    /// comes from the medium.
    fn drop_caches(&self) -> HalResult<()>;
}
