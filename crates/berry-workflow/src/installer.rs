//! The installer collaborator the workflow drives.
//!
//! Boot-file preservation, mounting and the user's hardware preferences are owned by the
//! surrounding application. The workflow only sees this trait so tests can substitute a
//! recording double.

use anyhow::Result;

/// Virtual console the password prompt runs on.
pub const PASSWORD_CONSOLE: u32 = 5;
/// Console the installer UI lives on.
pub const ORIGINAL_CONSOLE: u32 = 1;

pub trait Installer: Send + Sync {
    /// Total size of the files currently on the boot partition.
    fn size_of_boot_files_kb(&self) -> u64;

    /// Copy the boot files into memory.
    fn save_boot_files(&self) -> Result<()>;

    /// Write the files saved by [`Installer::save_boot_files`] back to the mounted system partition.
    fn restore_boot_files(&self);

    fn mount_system_partition(&self);

    fn umount_system_partition(&self) -> Result<()>;

    /// Mount and lay out the freshly formatted data volume (`mmcblk0p2`, `mapper/luks`, ...).
    fn initialize_data_partition(&self, target_device: &str);

    fn load_crypto_modules(&self);

    fn switch_console(&self, console: u32);

    /// Whether the user asked for the current MAC address to be pinned.
    fn fixate_mac(&self) -> bool;

    fn mac_address(&self) -> Option<String>;

    /// Audio routing choice (HDMI or headphones), if any.
    fn sound(&self) -> Option<String>;

    fn keyboard_layout(&self) -> String;

    fn disable_overscan(&self) -> bool;
}

/// RAII guard that keeps the password console active and switches back when dropped.
pub struct ConsoleGuard<'a, I: Installer + ?Sized> {
    installer: &'a I,
    restore_to: u32,
}

impl<'a, I: Installer + ?Sized> ConsoleGuard<'a, I> {
    pub fn acquire(installer: &'a I, console: u32, restore_to: u32) -> Self {
        log::info!("switching to console {}", console);
        installer.switch_console(console);
        Self {
            installer,
            restore_to,
        }
    }

    /// Switch to [`PASSWORD_CONSOLE`], restoring [`ORIGINAL_CONSOLE`] on drop.
    pub fn password_console(installer: &'a I) -> Self {
        Self::acquire(installer, PASSWORD_CONSOLE, ORIGINAL_CONSOLE)
    }
}

impl<'a, I: Installer + ?Sized> Drop for ConsoleGuard<'a, I> {
    fn drop(&mut self) {
        log::info!("restoring console {}", self.restore_to);
        self.installer.switch_console(self.restore_to);
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Recording installer for workflow tests.
    #[derive(Default)]
    pub struct FakeInstaller {
        pub boot_files_kb: u64,
        pub fail_save: bool,
        pub fail_umount: bool,
        pub fixate_mac: bool,
        pub mac: Option<String>,
        pub sound: Option<String>,
        pub keyboard: String,
        pub disable_overscan: bool,
        /// Replacement written over this file whenever the system partition is mounted,
        /// simulating a card that silently drops writes.
        pub corrupt_on_mount: Option<(PathBuf, String)>,
        pub calls: Mutex<Vec<String>>,
        pub consoles: Mutex<Vec<u32>>,
    }

    impl FakeInstaller {
        pub fn new() -> Self {
            Self {
                boot_files_kb: 20_000,
                keyboard: "us".to_string(),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn consoles(&self) -> Vec<u32> {
            self.consoles.lock().unwrap().clone()
        }

        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    impl Installer for FakeInstaller {
        fn size_of_boot_files_kb(&self) -> u64 {
            self.record("size_of_boot_files_kb");
            self.boot_files_kb
        }

        fn save_boot_files(&self) -> Result<()> {
            self.record("save_boot_files");
            if self.fail_save {
                anyhow::bail!("read error on /boot/kernel.img");
            }
            Ok(())
        }

        fn restore_boot_files(&self) {
            self.record("restore_boot_files");
        }

        fn mount_system_partition(&self) {
            self.record("mount_system_partition");
            if let Some((path, content)) = &self.corrupt_on_mount {
                if path.exists() {
                    std::fs::write(path, content).unwrap();
                }
            }
        }

        fn umount_system_partition(&self) -> Result<()> {
            self.record("umount_system_partition");
            if self.fail_umount {
                anyhow::bail!("device busy");
            }
            Ok(())
        }

        fn initialize_data_partition(&self, target_device: &str) {
            self.record(format!("initialize_data_partition {}", target_device));
        }

        fn load_crypto_modules(&self) {
            self.record("load_crypto_modules");
        }

        fn switch_console(&self, console: u32) {
            self.consoles.lock().unwrap().push(console);
        }

        fn fixate_mac(&self) -> bool {
            self.fixate_mac
        }

        fn mac_address(&self) -> Option<String> {
            self.mac.clone()
        }

        fn sound(&self) -> Option<String> {
            self.sound.clone()
        }

        fn keyboard_layout(&self) -> String {
            self.keyboard.clone()
        }

        fn disable_overscan(&self) -> bool {
            self.disable_overscan
        }
    }

    #[test]
    fn console_guard_restores_on_drop() {
        let installer = FakeInstaller::new();
        {
            let _guard = ConsoleGuard::password_console(&installer);
            assert_eq!(installer.consoles(), vec![PASSWORD_CONSOLE]);
        }
        assert_eq!(installer.consoles(), vec![PASSWORD_CONSOLE, ORIGINAL_CONSOLE]);
    }

    #[test]
    fn console_guard_restores_on_early_return() {
        fn fails(installer: &FakeInstaller) -> Result<()> {
            let _guard = ConsoleGuard::acquire(installer, 7, 2);
            anyhow::bail!("cryptsetup exited with 2")
        }

        let installer = FakeInstaller::new();
        assert!(fails(&installer).is_err());
        assert_eq!(installer.consoles(), vec![7, 2]);
    }
}
