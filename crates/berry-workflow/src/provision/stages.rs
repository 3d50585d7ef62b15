use crate::boot_config;
use crate::events::ProvisionEvent;
use crate::installer::{ConsoleGuard, Installer};
use crate::ops;
use crate::partition_table::PartitionTable;
use crate::stage_runner::WorkflowState;
use crate::{
    DerivedLayout, ProvisionError, ProvisioningRequest, Stage, SystemPaths, BOOT_FILES_LIMIT_KB,
};
use berry_hal::sysfs::block;
use berry_hal::{HalError, SystemHal};
use std::path::PathBuf;
use std::sync::mpsc::Sender;

pub(super) type StageFnPtr = fn(&mut StageContext<'_>) -> Result<(), ProvisionError>;

pub(super) fn stage_fn(stage: Stage) -> StageFnPtr {
    match stage {
        Stage::PreserveBootAssets => preserve_boot_assets,
        Stage::ZeroPartitionTable => zero_partition_table,
        Stage::CreatePartitions => create_partitions,
        Stage::InstallSpl => install_spl,
        Stage::FormatBoot => format_boot_partition,
        Stage::RestoreBootAssets => restore_boot_assets,
        Stage::FormatData => format_data_partition,
        Stage::InitializeData => initialize_data_partition,
    }
}

/// Everything a stage may touch during one run.
pub(super) struct StageContext<'a> {
    request: &'a ProvisioningRequest,
    layout: &'a DerivedLayout,
    paths: &'a SystemPaths,
    hal: &'a dyn SystemHal,
    installer: &'a dyn Installer,
    events: &'a Sender<ProvisionEvent>,
    current: Option<Stage>,
    completed: Vec<Stage>,
}

impl<'a> StageContext<'a> {
    pub(super) fn new(
        request: &'a ProvisioningRequest,
        layout: &'a DerivedLayout,
        paths: &'a SystemPaths,
        hal: &'a dyn SystemHal,
        installer: &'a dyn Installer,
        events: &'a Sender<ProvisionEvent>,
    ) -> Self {
        Self {
            request,
            layout,
            paths,
            hal,
            installer,
            events,
            current: None,
            completed: Vec::new(),
        }
    }

    fn status(&self, message: impl Into<String>) {
        let message = message.into();
        match self.current {
            Some(stage) => log::info!("[{}] {}", stage, message),
            None => log::info!("{}", message),
        }
        // The receiver may already be gone; keep working regardless.
        let _ = self.events.send(ProvisionEvent::Status(message));
    }

    pub(super) fn completed(&self) -> &[Stage] {
        &self.completed
    }

    fn device_path(&self) -> PathBuf {
        self.paths.dev(&self.layout.device)
    }

    fn data_path(&self) -> PathBuf {
        self.paths.dev(&self.layout.data_device)
    }
}

impl WorkflowState for StageContext<'_> {
    fn set_current(&mut self, stage: Stage) {
        self.current = Some(stage);
    }

    fn mark_completed(&mut self, stage: Stage) {
        log::debug!("stage '{}' done", stage);
        self.completed.push(stage);
    }
}

fn preserve_boot_assets(ctx: &mut StageContext<'_>) -> Result<(), ProvisionError> {
    ctx.status("Saving boot files to memory");

    let size_kb = ctx.installer.size_of_boot_files_kb();
    if size_kb > BOOT_FILES_LIMIT_KB {
        log::error!(
            "boot files take {} KB, boot partition holds {} KB",
            size_kb,
            BOOT_FILES_LIMIT_KB
        );
        return Err(ProvisionError::BootFilesTooLarge {
            size_kb,
            limit_kb: BOOT_FILES_LIMIT_KB,
        });
    }

    ctx.installer
        .save_boot_files()
        .map_err(|err| ProvisionError::SaveBootFiles {
            cause: format!("{:#}", err),
        })?;

    if ctx.request.initialize_data {
        ctx.installer
            .umount_system_partition()
            .map_err(|err| ProvisionError::UnmountSystemPartition {
                cause: format!("{:#}", err),
            })?;
    }
    Ok(())
}

fn zero_partition_table(ctx: &mut StageContext<'_>) -> Result<(), ProvisionError> {
    ctx.status("Zeroing partition table");
    let device = ctx.device_path();

    if ctx.paths.mbr_image.exists() {
        let spec = ops::write_mbr_image(&ctx.paths.mbr_image, &device);
        return ctx
            .hal
            .run_status(&spec)
            .map_err(ProvisionError::ZeroPartitionTable);
    }

    let blocks = match block::block_count(&ctx.paths.sys_class_block, &ctx.layout.device) {
        Ok(blocks) => blocks,
        Err(err) => {
            log::error!("{:#}", err);
            0
        }
    };
    if blocks < ops::TAIL_ZERO_BLOCKS {
        return Err(ProvisionError::DeviceTooSmall { blocks });
    }

    let zero = ctx.paths.dev("zero");
    ctx.hal
        .run_status(&ops::zero_head(&zero, &device))
        .map_err(ProvisionError::ZeroPartitionTable)?;
    ctx.hal
        .run_status(&ops::zero_tail(&zero, &device, blocks))
        .map_err(ProvisionError::ZeroPartitionTable)
}

fn create_partitions(ctx: &mut StageContext<'_>) -> Result<(), ProvisionError> {
    ctx.status("Creating partitions");
    let table = PartitionTable::for_layout(ctx.layout.reformat_boot);
    log::debug!("partition table:\n{}", table.to_script());
    ctx.hal
        .run_status(&ops::sfdisk(&ctx.device_path(), &table))
        .map_err(ProvisionError::Partition)
}

/// A10 boards boot u-boot from the gap before the first partition.
fn install_spl(ctx: &mut StageContext<'_>) -> Result<(), ProvisionError> {
    if !(ctx.paths.uboot_image.exists() && ctx.paths.spl_image.exists()) {
        log::debug!("no SPL staged, skipping");
        return Ok(());
    }

    ctx.status("Installing u-boot SPL");
    let device = ctx.device_path();
    ctx.hal
        .run_status(&ops::write_spl(&ctx.paths.spl_image, &device))
        .map_err(ProvisionError::InstallSpl)?;
    ctx.hal
        .run_status(&ops::write_uboot(&ctx.paths.uboot_image, &device))
        .map_err(ProvisionError::InstallSpl)
}

fn format_boot_partition(ctx: &mut StageContext<'_>) -> Result<(), ProvisionError> {
    ctx.status("Formatting boot partition (fat)");
    let partition = ctx.paths.dev(&ctx.layout.boot_partition);
    ctx.hal
        .run_status(&ops::mkfs_fat(&partition))
        .map_err(ProvisionError::FormatBoot)
}

fn restore_boot_assets(ctx: &mut StageContext<'_>) -> Result<(), ProvisionError> {
    ctx.status("Copying boot files to storage");
    ctx.installer.mount_system_partition();
    ctx.installer.restore_boot_files();

    ctx.status("Finish writing boot files to disk (sync)");
    if let Err(err) = ctx.hal.sync() {
        log::warn!("sync failed: {}", err);
    }
    Ok(())
}

fn format_data_partition(ctx: &mut StageContext<'_>) -> Result<(), ProvisionError> {
    let filesystem = ctx.request.filesystem;
    ctx.status(format!("Formatting data partition ({})", filesystem));
    let failed = |source: HalError| ProvisionError::FormatData { filesystem, source };

    let target = if ctx.request.use_password {
        ctx.installer.load_crypto_modules();
        let data = ctx.data_path();
        {
            let _console = ConsoleGuard::password_console(ctx.installer);
            ctx.hal.run_status(&ops::luks_format(&data)).map_err(failed)?;
        }
        {
            let _console = ConsoleGuard::password_console(ctx.installer);
            ctx.hal.run_status(&ops::luks_open(&data)).map_err(failed)?;
        }
        ctx.paths.dev(ops::LUKS_MAPPING)
    } else {
        ctx.data_path()
    };

    ctx.hal
        .run_status(&ops::mkfs_data(filesystem, &target))
        .map_err(failed)
}

fn initialize_data_partition(ctx: &mut StageContext<'_>) -> Result<(), ProvisionError> {
    ctx.status("Mounting and initializing data partition");
    let target = if ctx.request.use_password {
        ops::LUKS_MAPPING
    } else {
        ctx.layout.data_device.as_str()
    };
    ctx.installer.initialize_data_partition(target);

    ctx.status("Editing cmdline.txt");
    let params = boot_config::build_params(ctx.request, ctx.layout, ctx.installer);
    let written = boot_config::append_cmdline(&ctx.paths.cmdline_txt, &params)?;
    boot_config::append_uenv(&ctx.paths.uenv_txt, &params)?;
    boot_config::apply_overscan(&ctx.paths.config_txt, ctx.installer.disable_overscan())?;

    ctx.status("Unmounting boot partition");
    if let Err(err) = ctx.installer.umount_system_partition() {
        log::warn!("unmounting system partition failed: {:#}", err);
    }

    ctx.status("Finish writing to disk (sync)");
    if let Err(err) = ctx.hal.sync() {
        log::warn!("sync failed: {}", err);
    }
    if let Err(err) = ctx.hal.drop_caches() {
        log::warn!("dropping page cache failed: {}", err);
    }

    ctx.status("Mounting boot partition again");
    ctx.installer.mount_system_partition();

    boot_config::verify_persisted(&ctx.paths.cmdline_txt, &written)
}
