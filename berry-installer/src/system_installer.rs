//! The host-backed [`Installer`] used by the `berry-format` binary.

use crate::config::InstallerConfig;
use anyhow::{Context, Result};
use berry_hal::path::dev_path;
use berry_hal::{CommandSpec, SystemHal};
use berry_workflow::Installer;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use walkdir::WalkDir;

/// Kernel modules cryptsetup needs for the default LUKS cipher.
pub const CRYPTO_MODULES: &[&str] = &["dm_mod", "dm_crypt", "aes", "xts", "sha256"];
pub const BOOT_FSTYPE: &str = "vfat";
/// Directories Berryboot expects at the root of its data volume.
pub const DATA_DIRECTORIES: &[&str] = &["images", "data"];

#[derive(Debug, Clone)]
struct SavedFile {
    relative: PathBuf,
    contents: Vec<u8>,
}

pub struct SystemInstaller {
    config: InstallerConfig,
    /// FAT partition mounted on the boot mount, without /dev.
    system_partition: String,
    hal: Arc<dyn SystemHal>,
    dev_dir: PathBuf,
    sys_class_net: PathBuf,
    saved: Mutex<Vec<SavedFile>>,
}

impl SystemInstaller {
    pub fn new(
        config: InstallerConfig,
        system_partition: impl Into<String>,
        hal: Arc<dyn SystemHal>,
    ) -> Self {
        Self::with_roots(
            config,
            system_partition,
            hal,
            Path::new("/dev"),
            Path::new("/sys/class/net"),
        )
    }

    pub fn with_roots(
        config: InstallerConfig,
        system_partition: impl Into<String>,
        hal: Arc<dyn SystemHal>,
        dev_dir: &Path,
        sys_class_net: &Path,
    ) -> Self {
        Self {
            config,
            system_partition: system_partition.into(),
            hal,
            dev_dir: dev_dir.to_path_buf(),
            sys_class_net: sys_class_net.to_path_buf(),
            saved: Mutex::new(Vec::new()),
        }
    }

    fn boot_mount(&self) -> &Path {
        &self.config.storage.boot_mount
    }

    /// Number of files currently held in memory.
    pub fn saved_file_count(&self) -> usize {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn boot_files(&self) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> {
        WalkDir::new(self.boot_mount())
            .follow_links(false)
            .into_iter()
    }

    fn run_logged(&self, spec: &CommandSpec) {
        if let Err(err) = self.hal.run_status(spec) {
            log::warn!("{} failed: {}", spec, err);
        }
    }
}

impl Installer for SystemInstaller {
    fn size_of_boot_files_kb(&self) -> u64 {
        let mut total = 0u64;
        for entry in self.boot_files() {
            match entry.and_then(|e| e.metadata()) {
                Ok(meta) if meta.is_file() => total += meta.len().div_ceil(1024),
                Ok(_) => {}
                Err(err) => log::warn!("skipping unreadable boot file: {}", err),
            }
        }
        log::info!("boot files: {} KB in {}", total, self.boot_mount().display());
        total
    }

    fn save_boot_files(&self) -> Result<()> {
        let root = self.boot_mount().to_path_buf();
        let mut files = Vec::new();
        for entry in self.boot_files() {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .context("failed to compute relative path")?
                .to_path_buf();
            let contents = fs::read(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            files.push(SavedFile { relative, contents });
        }
        log::info!("saved {} boot files to memory", files.len());
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner) = files;
        Ok(())
    }

    fn restore_boot_files(&self) {
        let saved = self.saved.lock().unwrap_or_else(PoisonError::into_inner);
        let root = self.boot_mount();
        for file in saved.iter() {
            let dest = root.join(&file.relative);
            let written = dest
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::write(&dest, &file.contents));
            if let Err(err) = written {
                log::error!("failed to restore {}: {}", dest.display(), err);
            }
        }
        log::info!("restored {} boot files", saved.len());
    }

    fn mount_system_partition(&self) {
        let device = dev_path(&self.dev_dir, &self.system_partition);
        if let Err(err) = self
            .hal
            .mount_device(&device, self.boot_mount(), Some(BOOT_FSTYPE))
        {
            log::error!(
                "mounting {} on {} failed: {}",
                device.display(),
                self.boot_mount().display(),
                err
            );
        }
    }

    fn umount_system_partition(&self) -> Result<()> {
        self.hal
            .unmount(self.boot_mount())
            .with_context(|| format!("failed to unmount {}", self.boot_mount().display()))
    }

    fn initialize_data_partition(&self, target_device: &str) {
        let device = dev_path(&self.dev_dir, target_device);
        let mount = &self.config.storage.data_mount;
        if let Err(err) = self.hal.mount_device(&device, mount, None) {
            log::error!("mounting data partition {} failed: {}", device.display(), err);
            return;
        }
        for dir in DATA_DIRECTORIES {
            let path = mount.join(dir);
            if let Err(err) = fs::create_dir_all(&path) {
                log::error!("failed to create {}: {}", path.display(), err);
            }
        }
    }

    fn load_crypto_modules(&self) {
        for module in CRYPTO_MODULES {
            self.run_logged(&CommandSpec::new("modprobe").arg(*module));
        }
    }

    fn switch_console(&self, console: u32) {
        self.run_logged(&CommandSpec::new("chvt").arg(console.to_string()));
    }

    fn fixate_mac(&self) -> bool {
        self.config.network.fixate_mac
    }

    fn mac_address(&self) -> Option<String> {
        if let Some(mac) = &self.config.network.mac_address {
            return Some(mac.clone());
        }
        let path = self
            .sys_class_net
            .join(&self.config.network.interface)
            .join("address");
        match fs::read_to_string(&path) {
            Ok(mac) => Some(mac.trim().to_string()).filter(|m| !m.is_empty()),
            Err(err) => {
                log::warn!("cannot read {}: {}", path.display(), err);
                None
            }
        }
    }

    fn sound(&self) -> Option<String> {
        self.config.audio.sound.clone()
    }

    fn keyboard_layout(&self) -> String {
        self.config.keyboard.layout.clone()
    }

    fn disable_overscan(&self) -> bool {
        self.config.display.disable_overscan
    }
}
