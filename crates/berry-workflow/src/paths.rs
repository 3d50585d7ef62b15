//! Host paths used by a provisioning run.
//!
//! Production always uses [`SystemPaths::default`]; the only other constructor re-roots the
//! same layout under a scratch directory for tests.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemPaths {
    /// Pre-staged partition table image written verbatim instead of zeroing.
    pub mbr_image: PathBuf,
    /// Allwinner secondary program loader, written at 8 KiB.
    pub spl_image: PathBuf,
    /// u-boot proper, written at 32 KiB.
    pub uboot_image: PathBuf,
    pub cmdline_txt: PathBuf,
    pub uenv_txt: PathBuf,
    pub config_txt: PathBuf,
    pub sys_class_block: PathBuf,
    pub dev_dir: PathBuf,
}

impl Default for SystemPaths {
    fn default() -> Self {
        Self::with_root(Path::new("/"))
    }
}

impl SystemPaths {
    pub fn with_root(root: &Path) -> Self {
        Self {
            mbr_image: root.join("tmp/boot/mbr.bin"),
            spl_image: root.join("tmp/boot/sunxi-spl.bin"),
            uboot_image: root.join("tmp/boot/u-boot.bin"),
            cmdline_txt: root.join("boot/cmdline.txt"),
            uenv_txt: root.join("boot/uEnv.txt"),
            config_txt: root.join("boot/config.txt"),
            sys_class_block: root.join("sys/class/block"),
            dev_dir: root.join("dev"),
        }
    }

    pub fn dev(&self, name: &str) -> PathBuf {
        berry_hal::path::dev_path(&self.dev_dir, name)
    }
}
