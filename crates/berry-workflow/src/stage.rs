use std::fmt;

/// Work stages of a provisioning run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    PreserveBootAssets,
    ZeroPartitionTable,
    CreatePartitions,
    InstallSpl,
    FormatBoot,
    RestoreBootAssets,
    FormatData,
    InitializeData,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::PreserveBootAssets => "Preserve boot files",
            Stage::ZeroPartitionTable => "Zero partition table",
            Stage::CreatePartitions => "Create partitions",
            Stage::InstallSpl => "Install u-boot SPL",
            Stage::FormatBoot => "Format boot partition",
            Stage::RestoreBootAssets => "Restore boot files",
            Stage::FormatData => "Format data partition",
            Stage::InitializeData => "Initialize data partition",
        }
    }

    pub fn all() -> &'static [Stage] {
        &[
            Stage::PreserveBootAssets,
            Stage::ZeroPartitionTable,
            Stage::CreatePartitions,
            Stage::InstallSpl,
            Stage::FormatBoot,
            Stage::RestoreBootAssets,
            Stage::FormatData,
            Stage::InitializeData,
        ]
    }

    /// Stages that only run when the boot partition is recreated.
    pub fn requires_boot_reformat(&self) -> bool {
        matches!(
            self,
            Stage::PreserveBootAssets
                | Stage::InstallSpl
                | Stage::FormatBoot
                | Stage::RestoreBootAssets
        )
    }

    /// Stages that only run when the data partition is initialized now.
    pub fn requires_data_init(&self) -> bool {
        matches!(self, Stage::RestoreBootAssets | Stage::InitializeData)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
