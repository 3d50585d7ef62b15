//! Boot configuration rewriting on the mounted system partition.
//!
//! `cmdline.txt` (Raspberry Pi) and `uEnv.txt` (Allwinner A10) both receive the same kernel
//! parameter string; `config.txt` only has its overscan flag toggled.

use crate::installer::Installer;
use crate::{DerivedLayout, Filesystem, ProvisionError, ProvisioningRequest};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

pub const DEFAULT_KEYBOARD_LAYOUT: &str = "us";
pub const DISABLE_OVERSCAN_LINE: &str = "disable_overscan=1";

/// Kernel parameters describing the new layout. Every token carries a leading space so the
/// string can be appended directly to an existing command line.
pub fn build_params<I: Installer + ?Sized>(
    request: &ProvisioningRequest,
    layout: &DerivedLayout,
    installer: &I,
) -> String {
    let mut params = String::new();
    if request.filesystem == Filesystem::Btrfs {
        params.push_str(" fstype=btrfs");
    }
    if layout.iscsi {
        params.push_str(" datadev=iscsi");
    } else {
        params.push_str(" datadev=");
        params.push_str(&layout.data_device);
    }
    if request.use_password {
        params.push_str(" luks");
    }

    if installer.fixate_mac() {
        match installer.mac_address() {
            Some(mac) if !mac.is_empty() => {
                params.push_str(" mac_addr=");
                params.push_str(&mac);
            }
            _ => log::warn!("fixed MAC requested but no MAC address available"),
        }
    }

    if let Some(sound) = installer.sound().filter(|s| !s.is_empty()) {
        params.push_str(" sound=");
        params.push_str(&sound);
    }

    let keyboard = installer.keyboard_layout();
    if !keyboard.is_empty() && keyboard != DEFAULT_KEYBOARD_LAYOUT {
        params.push_str(" qmap=");
        params.push_str(&keyboard);
    }

    params
}

/// ASCII whitespace plus vertical tab.
fn is_space(b: &u8) -> bool {
    b.is_ascii_whitespace() || *b == 0x0B
}

fn trim_bytes(data: &[u8]) -> &[u8] {
    let Some(start) = data.iter().position(|b| !is_space(b)) else {
        return &[];
    };
    let end = data
        .iter()
        .rposition(|b| !is_space(b))
        .map_or(start, |i| i + 1);
    &data[start..end]
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn remove_all(data: &[u8], needle: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut rest = data;
    while let Some(at) = find_bytes(rest, needle) {
        out.extend_from_slice(&rest[..at]);
        rest = &rest[at + needle.len()..];
    }
    out.extend_from_slice(rest);
    out
}

fn read_or_empty(path: &Path) -> io::Result<Vec<u8>> {
    match fs::read(path) {
        Ok(data) => Ok(data),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::warn!("{} does not exist, treating as empty", path.display());
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}

/// Replace `cmdline.txt` with its trimmed content followed by `params`, without a trailing
/// newline. Returns the exact bytes written so they can be verified after a remount.
pub fn append_cmdline(path: &Path, params: &str) -> Result<Vec<u8>, ProvisionError> {
    let current = read_or_empty(path).map_err(ProvisionError::boot_config(path))?;
    let mut cmdline = trim_bytes(&current).to_vec();
    cmdline.extend_from_slice(params.as_bytes());
    fs::write(path, &cmdline).map_err(ProvisionError::boot_config(path))?;
    log::info!(
        "{}: {}",
        path.display(),
        String::from_utf8_lossy(&cmdline)
    );
    Ok(cmdline)
}

/// Rewrite `uEnv.txt` from offset zero with its trimmed content, `params` and a newline.
/// The file is created if missing and is not truncated.
pub fn append_uenv(path: &Path, params: &str) -> Result<(), ProvisionError> {
    let write = || -> io::Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let mut current = Vec::new();
        file.read_to_end(&mut current)?;

        let mut content = trim_bytes(&current).to_vec();
        content.extend_from_slice(params.as_bytes());
        content.push(b'\n');

        file.seek(SeekFrom::Start(0))?;
        file.write_all(&content)?;
        file.flush()
    };
    write().map_err(ProvisionError::boot_config(path))
}

/// Make the presence of `disable_overscan=1` in `config.txt` match `disable`.
///
/// Returns whether the file was rewritten; a file already in the requested state is left
/// alone. Removal replaces the setting text only, so its line break stays behind.
pub fn apply_overscan(path: &Path, disable: bool) -> Result<bool, ProvisionError> {
    let config = read_or_empty(path).map_err(ProvisionError::boot_config(path))?;
    let line = DISABLE_OVERSCAN_LINE.as_bytes();
    let currently_disabled = find_bytes(&config, line).is_some();

    let updated = match (disable, currently_disabled) {
        (true, false) => {
            let mut updated = config;
            updated.push(b'\n');
            updated.extend_from_slice(line);
            updated
        }
        (false, true) => remove_all(&config, line),
        _ => {
            log::debug!("{} overscan setting unchanged", path.display());
            return Ok(false);
        }
    };

    fs::write(path, trim_bytes(&updated)).map_err(ProvisionError::boot_config(path))?;
    log::info!(
        "{}: overscan {}",
        path.display(),
        if disable { "disabled" } else { "enabled" }
    );
    Ok(true)
}

/// Re-read `path` and compare it byte for byte against what was written.
pub fn verify_persisted(path: &Path, expected: &[u8]) -> Result<(), ProvisionError> {
    let actual = match fs::read(path) {
        Ok(data) => data,
        Err(err) => {
            log::error!("re-reading {} failed: {}", path.display(), err);
            return Err(ProvisionError::WritesDoNotPersist);
        }
    };
    if actual != expected {
        log::error!(
            "{} changed after remount: wrote {} bytes, read back {}",
            path.display(),
            expected.len(),
            actual.len()
        );
        return Err(ProvisionError::WritesDoNotPersist);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::installer::fake::FakeInstaller;
    use crate::SystemPaths;
    use tempfile::tempdir;

    fn layout_for(request: &ProvisioningRequest) -> DerivedLayout {
        let paths = SystemPaths::with_root(tempdir().unwrap().path());
        DerivedLayout::resolve(request, &paths).unwrap()
    }

    #[test]
    fn params_for_plain_ext4() {
        let request = ProvisioningRequest::new("mmcblk0", "mmcblk0p1").filesystem(Filesystem::Ext4);
        let params = build_params(&request, &layout_for(&request), &FakeInstaller::new());
        assert_eq!(params, " datadev=mmcblk0p2");
    }

    #[test]
    fn params_include_every_optional_token() {
        let request = ProvisioningRequest::new("sda", "sda1")
            .filesystem(Filesystem::Btrfs)
            .use_password(true);
        let installer = FakeInstaller {
            fixate_mac: true,
            mac: Some("b8:27:eb:12:34:56".to_string()),
            sound: Some("headphones".to_string()),
            keyboard: "de".to_string(),
            ..FakeInstaller::new()
        };
        let params = build_params(&request, &layout_for(&request), &installer);
        assert_eq!(
            params,
            " fstype=btrfs datadev=sda2 luks mac_addr=b8:27:eb:12:34:56 sound=headphones qmap=de"
        );
    }

    #[test]
    fn params_skip_empty_preferences() {
        let request = ProvisioningRequest::new("sda", "mmcblk0p1");
        let installer = FakeInstaller {
            fixate_mac: true,
            mac: None,
            sound: Some(String::new()),
            keyboard: String::new(),
            ..FakeInstaller::new()
        };
        let params = build_params(&request, &layout_for(&request), &installer);
        assert_eq!(params, " datadev=sda1");
    }

    #[test]
    fn cmdline_is_trimmed_and_has_no_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cmdline.txt");
        fs::write(&path, "  elevator=deadline quiet\n\n").unwrap();

        let written = append_cmdline(&path, " datadev=sda1").unwrap();
        assert_eq!(written, b"elevator=deadline quiet datadev=sda1");
        assert_eq!(fs::read(&path).unwrap(), written);
    }

    #[test]
    fn cmdline_trim_strips_vertical_tabs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cmdline.txt");
        fs::write(&path, "\x0b quiet\x0b\n").unwrap();

        let written = append_cmdline(&path, " datadev=sda1").unwrap();
        assert_eq!(written, b"quiet datadev=sda1");
    }

    #[test]
    fn missing_cmdline_is_created() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cmdline.txt");
        let written = append_cmdline(&path, " datadev=sda1").unwrap();
        assert_eq!(written, b" datadev=sda1");
    }

    #[test]
    fn uenv_is_created_with_trailing_newline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("uEnv.txt");
        append_uenv(&path, " datadev=mmcblk0p2").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), " datadev=mmcblk0p2\n");
    }

    #[test]
    fn uenv_appends_to_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("uEnv.txt");
        fs::write(&path, "bootargs=console=tty0\n").unwrap();
        append_uenv(&path, " luks").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "bootargs=console=tty0 luks\n"
        );
    }

    #[test]
    fn overscan_is_added_once() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.txt");
        fs::write(&path, "gpu_mem=64\n").unwrap();

        assert!(apply_overscan(&path, true).unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "gpu_mem=64\n\ndisable_overscan=1"
        );

        let before = fs::metadata(&path).unwrap().modified().unwrap();
        assert!(!apply_overscan(&path, true).unwrap());
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn overscan_removal_keeps_line_break() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.txt");
        fs::write(&path, "gpu_mem=64\ndisable_overscan=1\nhdmi_force_hotplug=1\n").unwrap();

        assert!(apply_overscan(&path, false).unwrap());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "gpu_mem=64\n\nhdmi_force_hotplug=1"
        );
        assert!(!apply_overscan(&path, false).unwrap());
    }

    #[test]
    fn overscan_edits_keep_non_utf8_bytes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.txt");
        fs::write(&path, b"# caf\xe9\ngpu_mem=64\n").unwrap();

        assert!(apply_overscan(&path, true).unwrap());
        assert_eq!(
            fs::read(&path).unwrap(),
            b"# caf\xe9\ngpu_mem=64\n\ndisable_overscan=1"
        );

        assert!(apply_overscan(&path, false).unwrap());
        assert_eq!(fs::read(&path).unwrap(), b"# caf\xe9\ngpu_mem=64");
    }

    #[test]
    fn overscan_enabled_on_missing_file_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.txt");
        assert!(!apply_overscan(&path, false).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn verification_detects_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cmdline.txt");
        fs::write(&path, "quiet datadev=sda1").unwrap();

        verify_persisted(&path, b"quiet datadev=sda1").unwrap();
        let err = verify_persisted(&path, b"quiet datadev=sda2").unwrap_err();
        assert!(matches!(err, ProvisionError::WritesDoNotPersist));
    }

    #[test]
    fn verification_fails_when_file_vanished() {
        let dir = tempdir().unwrap();
        let err = verify_persisted(&dir.path().join("cmdline.txt"), b"quiet").unwrap_err();
        assert!(matches!(err, ProvisionError::WritesDoNotPersist));
    }
}
