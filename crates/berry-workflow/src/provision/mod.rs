//! The drive formatting workflow and its worker thread.

mod stages;


use crate::events::ProvisionEvent;
use crate::installer::Installer;
use crate::ops;
use crate::partition_table::PartitionTable;
use crate::stage_runner::{StageDefinition, StageFailure, StageRunner};
use crate::{DerivedLayout, ProvisionError, ProvisioningRequest, Stage, SystemPaths};
use berry_hal::sysfs::block;
use berry_hal::{CommandSpec, SystemHal};
use stages::StageContext;
use std::fmt;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub const WORKER_THREAD_NAME: &str = "drive-format";

#[derive(Debug, Clone)]
pub struct StagePlan {
    pub stage: Stage,
    pub description: String,
    pub commands: Vec<CommandSpec>,
}

/// What a run would do, stage by stage. Nothing is executed to build it.
#[derive(Debug, Clone)]
pub struct ProvisionPlan {
    pub layout: DerivedLayout,
    pub stages: Vec<StagePlan>,
}

impl ProvisionPlan {
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        lines.push(format!(
            "Target: /dev/{} (data: {}, boot reformat: {})",
            self.layout.device,
            self.layout.data_device,
            if self.layout.reformat_boot { "yes" } else { "no" }
        ));
        lines.push("Execution plan:".to_string());
        for (idx, stage) in self.stages.iter().enumerate() {
            lines.push(format!(
                "{:02}. {}: {}",
                idx + 1,
                stage.stage.name(),
                stage.description
            ));
            for command in &stage.commands {
                lines.push(format!("      $ {}", command));
            }
        }
        lines
    }
}

impl fmt::Display for ProvisionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.summary_lines() {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Formats one drive for Berryboot.
///
/// The layout is resolved once in the constructor; every stage reads it from there.
pub struct DriveFormatter {
    request: ProvisioningRequest,
    layout: DerivedLayout,
    paths: SystemPaths,
    hal: Arc<dyn SystemHal>,
    installer: Arc<dyn Installer>,
}

impl DriveFormatter {
    pub fn new(
        request: ProvisioningRequest,
        hal: Arc<dyn SystemHal>,
        installer: Arc<dyn Installer>,
    ) -> Result<Self, ProvisionError> {
        Self::with_paths(request, SystemPaths::default(), hal, installer)
    }

    pub fn with_paths(
        request: ProvisioningRequest,
        paths: SystemPaths,
        hal: Arc<dyn SystemHal>,
        installer: Arc<dyn Installer>,
    ) -> Result<Self, ProvisionError> {
        Self::with_installer(request, paths, hal, |_| installer)
    }

    /// Resolve the layout first and build the installer from it, so host
    /// collaborators mount the partitions this run actually creates.
    pub fn with_installer<F>(
        request: ProvisioningRequest,
        paths: SystemPaths,
        hal: Arc<dyn SystemHal>,
        make_installer: F,
    ) -> Result<Self, ProvisionError>
    where
        F: FnOnce(&DerivedLayout) -> Arc<dyn Installer>,
    {
        let layout = DerivedLayout::resolve(&request, &paths)?;
        let installer = make_installer(&layout);
        Ok(Self {
            request,
            layout,
            paths,
            hal,
            installer,
        })
    }

    pub fn request(&self) -> &ProvisioningRequest {
        &self.request
    }

    pub fn layout(&self) -> &DerivedLayout {
        &self.layout
    }

    /// Stages this request runs, in order.
    pub fn stages(&self) -> Vec<Stage> {
        Stage::all()
            .iter()
            .copied()
            .filter(|stage| self.applies(*stage))
            .collect()
    }

    fn applies(&self, stage: Stage) -> bool {
        if stage.requires_boot_reformat() && !self.layout.reformat_boot {
            return false;
        }
        if stage.requires_data_init() && !self.request.initialize_data {
            return false;
        }
        true
    }

    pub fn plan(&self) -> ProvisionPlan {
        let device = self.paths.dev(&self.layout.device);
        let data = self.paths.dev(&self.layout.data_device);
        let zero = self.paths.dev("zero");
        let fs = self.request.filesystem;

        let stages = self
            .stages()
            .into_iter()
            .map(|stage| {
                let (description, commands) = match stage {
                    Stage::PreserveBootAssets => (
                        format!(
                            "Copy boot files to memory (limit {} KB)",
                            crate::BOOT_FILES_LIMIT_KB
                        ),
                        Vec::new(),
                    ),
                    Stage::ZeroPartitionTable => {
                        if self.paths.mbr_image.exists() {
                            (
                                format!("Write {}", self.paths.mbr_image.display()),
                                vec![ops::write_mbr_image(&self.paths.mbr_image, &device)],
                            )
                        } else {
                            let mut description = format!(
                                "Zero first {} bytes and last {} blocks",
                                ops::HEAD_ZERO_BYTES,
                                ops::TAIL_ZERO_BLOCKS
                            );
                            let mut commands = vec![ops::zero_head(&zero, &device)];
                            match block::block_count(
                                &self.paths.sys_class_block,
                                &self.layout.device,
                            ) {
                                Ok(blocks) if blocks >= ops::TAIL_ZERO_BLOCKS => {
                                    commands.push(ops::zero_tail(&zero, &device, blocks));
                                }
                                Ok(blocks) => description
                                    .push_str(&format!(" (device too small: {} blocks)", blocks)),
                                Err(err) => description
                                    .push_str(&format!(" (block count unavailable: {})", err)),
                            }
                            (description, commands)
                        }
                    }
                    Stage::CreatePartitions => {
                        let table = PartitionTable::for_layout(self.layout.reformat_boot);
                        (
                            table.to_script().trim_end().replace('\n', " | "),
                            vec![ops::sfdisk(&device, &table)],
                        )
                    }
                    Stage::InstallSpl => (
                        "Only when both loader images are staged".to_string(),
                        vec![
                            ops::write_spl(&self.paths.spl_image, &device),
                            ops::write_uboot(&self.paths.uboot_image, &device),
                        ],
                    ),
                    Stage::FormatBoot => (
                        format!("FAT on {}", self.layout.boot_partition),
                        vec![ops::mkfs_fat(&self.paths.dev(&self.layout.boot_partition))],
                    ),
                    Stage::RestoreBootAssets => {
                        ("Copy boot files back and sync".to_string(), Vec::new())
                    }
                    Stage::FormatData => {
                        if self.request.use_password {
                            let mapped = self.paths.dev(ops::LUKS_MAPPING);
                            (
                                format!("LUKS on {}, {} inside", self.layout.data_device, fs),
                                vec![
                                    ops::luks_format(&data),
                                    ops::luks_open(&data),
                                    ops::mkfs_data(fs, &mapped),
                                ],
                            )
                        } else {
                            (
                                format!("{} on {}", fs, self.layout.data_device),
                                vec![ops::mkfs_data(fs, &data)],
                            )
                        }
                    }
                    Stage::InitializeData => (
                        "Initialize data, edit boot configuration, verify after remount"
                            .to_string(),
                        Vec::new(),
                    ),
                };
                StagePlan {
                    stage,
                    description,
                    commands,
                }
            })
            .collect();

        ProvisionPlan {
            layout: self.layout.clone(),
            stages,
        }
    }

    fn stage_definitions<'a>(&self) -> Vec<StageDefinition<'static, StageContext<'a>>> {
        self.stages()
            .into_iter()
            .map(|stage| StageDefinition {
                stage,
                run: Box::new(stages::stage_fn(stage)),
            })
            .collect()
    }

    /// Run every applicable stage on the current thread.
    ///
    /// Status updates are sent as they happen, followed by exactly one
    /// [`ProvisionEvent::Error`] or [`ProvisionEvent::Completed`].
    pub fn run(&self, events: &Sender<ProvisionEvent>) -> Result<(), ProvisionError> {
        let mut ctx = StageContext::new(
            &self.request,
            &self.layout,
            &self.paths,
            self.hal.as_ref(),
            self.installer.as_ref(),
            events,
        );
        let definitions = self.stage_definitions();

        match StageRunner::new().run(&mut ctx, &definitions) {
            Ok(()) => {
                log::info!("provisioning of {} completed", self.layout.device);
                let _ = events.send(ProvisionEvent::Completed);
                Ok(())
            }
            Err(StageFailure { stage, error }) => {
                log::error!(
                    "provisioning of {} aborted; completed stages: {:?}",
                    self.layout.device,
                    ctx.completed()
                );
                let _ = events.send(ProvisionEvent::Error {
                    stage,
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Run on a dedicated worker thread. Events arrive on the returned receiver, which is
    /// closed once the terminal event has been sent.
    pub fn spawn(
        self,
    ) -> std::io::Result<(JoinHandle<Result<(), ProvisionError>>, Receiver<ProvisionEvent>)> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || self.run(&tx))?;
        Ok((handle, rx))
    }
}
