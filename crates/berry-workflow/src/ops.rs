//! Command lines for the external disk tools.
//!
//! Each builder returns a [`CommandSpec`]; nothing here runs anything, so the exact
//! invocations can be asserted directly and shown in a dry-run plan.

use crate::installer::PASSWORD_CONSOLE;
use crate::partition_table::PartitionTable;
use crate::Filesystem;
use berry_hal::CommandSpec;
use std::path::Path;

pub const DATA_LABEL: &str = "berryboot";
/// Name the unlocked LUKS volume is mapped under.
pub const LUKS_NAME: &str = "luks";
/// Device name of the unlocked volume, relative to `/dev`.
pub const LUKS_MAPPING: &str = "mapper/luks";

/// Bytes zeroed at the start of the device: MBR, primary GPT header, partitionless FAT.
pub const HEAD_ZERO_BYTES: u64 = 8192;
/// 512-byte blocks zeroed at the end of the device, covering the backup GPT header.
pub const TAIL_ZERO_BLOCKS: u64 = 8;

pub const SPL_OFFSET_KB: u64 = 8;
pub const UBOOT_OFFSET_KB: u64 = 32;

fn path_arg(prefix: &str, path: &Path) -> String {
    format!("{}{}", prefix, path.display())
}

pub fn write_mbr_image(image: &Path, device: &Path) -> CommandSpec {
    CommandSpec::new("dd")
        .arg(path_arg("if=", image))
        .arg(path_arg("of=", device))
}

pub fn zero_head(zero: &Path, device: &Path) -> CommandSpec {
    CommandSpec::new("dd")
        .args(["conv=fsync", "count=1"])
        .arg(format!("bs={}", HEAD_ZERO_BYTES))
        .arg(path_arg("if=", zero))
        .arg(path_arg("of=", device))
}

/// Zero the last [`TAIL_ZERO_BLOCKS`] blocks. `blocks` must be at least that many.
pub fn zero_tail(zero: &Path, device: &Path, blocks: u64) -> CommandSpec {
    CommandSpec::new("dd")
        .arg("conv=fsync")
        .arg(format!("count={}", TAIL_ZERO_BLOCKS))
        .arg("bs=512")
        .arg(path_arg("if=", zero))
        .arg(format!("seek={}", blocks - TAIL_ZERO_BLOCKS))
        .arg(path_arg("of=", device))
}

fn write_at_kb(image: &Path, device: &Path, offset_kb: u64) -> CommandSpec {
    CommandSpec::new("dd")
        .args(["conv=fsync,notrunc", "bs=1024"])
        .arg(format!("seek={}", offset_kb))
        .arg(path_arg("if=", image))
        .arg(path_arg("of=", device))
}

pub fn write_spl(spl: &Path, device: &Path) -> CommandSpec {
    write_at_kb(spl, device, SPL_OFFSET_KB)
}

pub fn write_uboot(uboot: &Path, device: &Path) -> CommandSpec {
    write_at_kb(uboot, device, UBOOT_OFFSET_KB)
}

/// sfdisk with legacy CHS geometry (255 heads, 63 sectors) and sector units.
pub fn sfdisk(device: &Path, table: &PartitionTable) -> CommandSpec {
    CommandSpec::new("sfdisk")
        .args(["-H", "255", "-S", "63", "-u", "S"])
        .arg(device.display().to_string())
        .stdin(table.to_script())
}

pub fn mkfs_fat(partition: &Path) -> CommandSpec {
    CommandSpec::new("mkfs.fat").arg(partition.display().to_string())
}

pub fn mkfs_data(filesystem: Filesystem, device: &Path) -> CommandSpec {
    let spec = match filesystem {
        Filesystem::Btrfs => CommandSpec::new("mkfs.btrfs").args(["-f", "-L", DATA_LABEL]),
        Filesystem::Ext4 => CommandSpec::new("mkfs.ext4").args(["-L", DATA_LABEL]),
        Filesystem::Ext4NoDiscard => {
            CommandSpec::new("mkfs.ext4").args(["-E", "nodiscard", "-L", DATA_LABEL])
        }
    };
    spec.arg(device.display().to_string())
}

/// Run `cryptsetup` on the password console and wait for it, so the passphrase prompt
/// never appears on the installer's own terminal.
fn on_password_console(args: &[&str]) -> CommandSpec {
    CommandSpec::new("openvt")
        .args(["-c".to_string(), PASSWORD_CONSOLE.to_string()])
        .args(["-w", "--", "cryptsetup"])
        .args(args.iter().copied())
}

pub fn luks_format(data_partition: &Path) -> CommandSpec {
    let dev = data_partition.display().to_string();
    on_password_console(&["luksFormat", &dev])
}

pub fn luks_open(data_partition: &Path) -> CommandSpec {
    let dev = data_partition.display().to_string();
    on_password_console(&["luksOpen", &dev, LUKS_NAME])
}

#[cfg(test)]
mod tests {
    use super::*;

    const ZERO: &str = "/dev/zero";

    #[test]
    fn zero_head_writes_first_8k_synchronously() {
        let spec = zero_head(Path::new(ZERO), Path::new("/dev/mmcblk0"));
        assert_eq!(
            spec.to_string(),
            "dd conv=fsync count=1 bs=8192 if=/dev/zero of=/dev/mmcblk0"
        );
    }

    #[test]
    fn zero_tail_seeks_to_last_eight_blocks() {
        let spec = zero_tail(Path::new(ZERO), Path::new("/dev/sda"), 1000);
        assert_eq!(
            spec.to_string(),
            "dd conv=fsync count=8 bs=512 if=/dev/zero seek=992 of=/dev/sda"
        );
    }

    #[test]
    fn spl_and_uboot_land_at_fixed_offsets() {
        let dev = Path::new("/dev/mmcblk0");
        let spl = write_spl(Path::new("/tmp/boot/sunxi-spl.bin"), dev);
        let uboot = write_uboot(Path::new("/tmp/boot/u-boot.bin"), dev);
        assert!(spl.args.contains(&"seek=8".to_string()));
        assert!(uboot.args.contains(&"seek=32".to_string()));
        assert!(spl.has_arg_containing("fsync"));
        assert!(uboot.has_arg_containing("fsync"));
    }

    #[test]
    fn sfdisk_uses_legacy_geometry_and_stdin_table() {
        let table = PartitionTable::for_layout(true);
        let spec = sfdisk(Path::new("/dev/mmcblk0"), &table);
        assert_eq!(spec.args, vec!["-H", "255", "-S", "63", "-u", "S", "/dev/mmcblk0"]);
        assert_eq!(spec.stdin.as_deref(), Some(table.to_script().as_bytes()));
    }

    #[test]
    fn data_formatter_depends_on_filesystem() {
        let dev = Path::new("/dev/sda2");
        assert_eq!(
            mkfs_data(Filesystem::Btrfs, dev).to_string(),
            "mkfs.btrfs -f -L berryboot /dev/sda2"
        );
        assert_eq!(
            mkfs_data(Filesystem::Ext4, dev).to_string(),
            "mkfs.ext4 -L berryboot /dev/sda2"
        );
        assert_eq!(
            mkfs_data(Filesystem::Ext4NoDiscard, dev).to_string(),
            "mkfs.ext4 -E nodiscard -L berryboot /dev/sda2"
        );
    }

    #[test]
    fn luks_commands_run_on_password_console() {
        let dev = Path::new("/dev/sda2");
        assert_eq!(
            luks_format(dev).to_string(),
            "openvt -c 5 -w -- cryptsetup luksFormat /dev/sda2"
        );
        assert_eq!(
            luks_open(dev).to_string(),
            "openvt -c 5 -w -- cryptsetup luksOpen /dev/sda2 luks"
        );
    }
}
