//! Command-line front end for the Berryboot drive formatter.

pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod system_installer;

use anyhow::{Context, Result};
use berry_hal::{LinuxHal, SystemHal};
use berry_workflow::{DriveFormatter, Installer, ProvisionEvent, SystemPaths};
use clap::Parser;
use config::InstallerConfig;
use errors::InstallerError;
use std::io::Write;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use system_installer::SystemInstaller;

pub fn run() -> Result<()> {
    let cli = cli::Cli::parse();
    logging::init_with(cli.log_file.clone());
    run_with(&cli)
}

pub fn run_with(cli: &cli::Cli) -> Result<()> {
    let config = InstallerConfig::load(cli.config.as_deref())?;
    log::debug!("config: {:?}", config);

    let hal: Arc<dyn SystemHal> = Arc::new(LinuxHal::new());
    let installer_hal = Arc::clone(&hal);
    let formatter = DriveFormatter::with_installer(
        cli.request(),
        SystemPaths::default(),
        hal,
        |layout| -> Arc<dyn Installer> {
            Arc::new(SystemInstaller::new(
                config,
                layout.system_partition.clone(),
                installer_hal,
            ))
        },
    )
    .map_err(InstallerError::from)?;

    if cli.dry_run {
        log::info!("dry run for {}", cli.drive);
        print!("{}", formatter.plan());
        return Ok(());
    }

    if !cli.yes_i_know {
        let target = format!("/dev/{}", formatter.layout().device);
        return Err(InstallerError::MissingYesIKnow(target).into());
    }

    log::info!("formatting /dev/{}", formatter.layout().device);
    let (handle, events) = formatter
        .spawn()
        .context("failed to start formatting worker")?;

    let stdout = std::io::stdout();
    let outcome = report_events(&events, &mut stdout.lock());
    let result = handle.join().map_err(|_| InstallerError::WorkerPanicked)?;
    result.map_err(InstallerError::from)?;
    outcome
}

/// Print worker events until the terminal one arrives. Returns an error if the run failed
/// or the worker went away without reporting.
pub fn report_events(events: &Receiver<ProvisionEvent>, out: &mut impl Write) -> Result<()> {
    for event in events.iter() {
        match event {
            ProvisionEvent::Status(message) => {
                writeln!(out, "{}", message)?;
            }
            ProvisionEvent::Error { stage, message } => {
                writeln!(out, "Error: {}", message)?;
                log::error!("stage '{}' failed: {}", stage, message);
                anyhow::bail!("{}", message);
            }
            ProvisionEvent::Completed => {
                writeln!(out, "Done.")?;
                return Ok(());
            }
        }
    }
    Err(InstallerError::NoTerminalEvent.into())
}
