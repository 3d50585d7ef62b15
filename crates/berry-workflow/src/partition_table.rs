//! MBR layout fed to sfdisk.
//!
//! Rows are `start,size,type` in 512-byte sectors. Classic MBR has four slots and every
//! slot is written so stale entries from a previous table cannot survive.

use crate::BOOT_PARTITION_SIZE_MB;
use std::fmt;

const SECTORS_PER_MB: u64 = 2048;
/// First partition starts at 1 MiB.
pub const FIRST_SECTOR: u64 = 2048;
pub const MBR_SLOTS: usize = 4;
/// W95 FAT (LBA)
pub const FAT_TYPE: &str = "0E";
pub const LINUX_TYPE: &str = "L";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionRow {
    Fat { start: u64, size: u64 },
    /// Extends to the end of the disk.
    Linux { start: u64 },
    Empty,
}

impl fmt::Display for PartitionRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionRow::Fat { start, size } => write!(f, "{},{},{}", start, size, FAT_TYPE),
            PartitionRow::Linux { start } => write!(f, "{},,{}", start, LINUX_TYPE),
            PartitionRow::Empty => f.write_str("0,0"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    rows: Vec<PartitionRow>,
}

impl PartitionTable {
    pub fn for_layout(reformat_boot: bool) -> Self {
        let boot_sectors = SECTORS_PER_MB * BOOT_PARTITION_SIZE_MB;
        let data_start = FIRST_SECTOR + boot_sectors;

        let mut rows = Vec::with_capacity(MBR_SLOTS);
        if reformat_boot {
            rows.push(PartitionRow::Fat {
                start: FIRST_SECTOR,
                size: boot_sectors,
            });
        }
        rows.push(PartitionRow::Linux { start: data_start });
        rows.resize(MBR_SLOTS, PartitionRow::Empty);
        Self { rows }
    }

    pub fn rows(&self) -> &[PartitionRow] {
        &self.rows
    }

    /// sfdisk input, one newline-terminated row per slot.
    pub fn to_script(&self) -> String {
        self.rows.iter().map(|row| format!("{}\n", row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reformat_layout_has_fat_then_linux_then_placeholders() {
        let table = PartitionTable::for_layout(true);
        assert_eq!(
            table.rows(),
            &[
                PartitionRow::Fat {
                    start: 2048,
                    size: 102_400
                },
                PartitionRow::Linux { start: 104_448 },
                PartitionRow::Empty,
                PartitionRow::Empty,
            ]
        );
        assert_eq!(table.to_script(), "2048,102400,0E\n104448,,L\n0,0\n0,0\n");
    }

    #[test]
    fn shared_boot_layout_has_only_linux_row() {
        let table = PartitionTable::for_layout(false);
        assert_eq!(table.rows().len(), MBR_SLOTS);
        assert_eq!(table.to_script(), "104448,,L\n0,0\n0,0\n0,0\n");
    }
}
