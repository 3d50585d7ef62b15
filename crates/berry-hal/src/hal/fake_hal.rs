//! Fake HAL implementation for testing.
//!
//! This implementation records all operations without executing them,
//! allowing for CI-safe testing without root privileges or real hardware.
//! Individual commands can be told to fail so every abort path of the workflow
//! can be reached.

use super::{CommandSpec, MountOps, ProcessOps, SystemOps};
use crate::HalResult;
use std::collections::HashSet;
#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Command(CommandSpec),
    Sync,
    DropCaches,
    Mount {
        device: PathBuf,
        target: PathBuf,
        fstype: Option<String>,
    },
    Unmount {
        target: PathBuf,
    },
}

#[derive(Debug, Clone)]
struct FailureRule {
    program: String,
    arg_contains: Option<String>,
    exit_code: i32,
}

impl FailureRule {
    fn matches(&self, spec: &CommandSpec) -> bool {
        spec.program == self.program
            && self
                .arg_contains
                .as_deref()
                .map_or(true, |needle| spec.has_arg_containing(needle))
    }
}

/// Shared state for FakeHal operations.
#[derive(Debug, Clone, Default)]
struct FakeHalState {
    /// All operations that were recorded
    operations: Vec<Operation>,
    /// Currently mounted paths
    mounted_paths: HashSet<PathBuf>,
    failures: Vec<FailureRule>,
    stdout: Vec<(String, Vec<u8>)>,
}

/// Fake HAL implementation that records operations without executing them.
#[derive(Debug, Clone, Default)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
}

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
    // Raw wait status: the exit code lives in the second byte.
    ExitStatus::from_raw(code << 8)
}

impl FakeHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every invocation of `program` exit with `exit_code`.
    pub fn fail_program(&self, program: &str, exit_code: i32) {
        self.state.lock().unwrap().failures.push(FailureRule {
            program: program.to_string(),
            arg_contains: None,
            exit_code,
        });
    }

    /// Make invocations of `program` with an argument containing `needle` exit with `exit_code`.
    pub fn fail_matching(&self, program: &str, needle: &str, exit_code: i32) {
        self.state.lock().unwrap().failures.push(FailureRule {
            program: program.to_string(),
            arg_contains: Some(needle.to_string()),
            exit_code,
        });
    }

    /// Canned stdout returned for every invocation of `program`.
    pub fn set_stdout(&self, program: &str, stdout: impl Into<Vec<u8>>) {
        self.state
            .lock()
            .unwrap()
            .stdout
            .push((program.to_string(), stdout.into()));
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Only the recorded commands, in execution order.
    pub fn commands(&self) -> Vec<CommandSpec> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                Operation::Command(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    /// Recorded invocations of one program.
    pub fn commands_for(&self, program: &str) -> Vec<CommandSpec> {
        self.commands()
            .into_iter()
            .filter(|spec| spec.program == program)
            .collect()
    }

    /// Get the number of operations recorded.
    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap().operations.len()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state.lock().unwrap().operations.iter().any(check)
    }

    pub fn is_mounted(&self, target: &Path) -> bool {
        self.state.lock().unwrap().mounted_paths.contains(target)
    }

    /// Clear recorded operations and mounts. Failure rules are kept.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.operations.clear();
        state.mounted_paths.clear();
    }

    fn record_operation(&self, op: Operation) {
        self.state.lock().unwrap().operations.push(op);
    }
}

impl ProcessOps for FakeHal {
    fn run(&self, spec: &CommandSpec) -> HalResult<Output> {
        log::info!("FAKE HAL: {}", spec);
        self.record_operation(Operation::Command(spec.clone()));

        let state = self.state.lock().unwrap();
        let code = state
            .failures
            .iter()
            .find(|rule| rule.matches(spec))
            .map_or(0, |rule| rule.exit_code);
        let stdout = state
            .stdout
            .iter()
            .find(|(program, _)| *program == spec.program)
            .map(|(_, out)| out.clone())
            .unwrap_or_default();

        #[cfg(unix)]
        let status = exit_status(code);
        #[cfg(not(unix))]
        let status = std::process::Command::new(if code == 0 { "true" } else { "false" })
            .status()
            .unwrap();

        Ok(Output {
            status,
            stdout,
            stderr: Vec::new(),
        })
    }
}

impl SystemOps for FakeHal {
    fn sync(&self) -> HalResult<()> {
        self.record_operation(Operation::Sync);
        Ok(())
    }

    fn drop_caches(&self) -> HalResult<()> {
        self.record_operation(Operation::DropCaches);
        Ok(())
    }
}

impl MountOps for FakeHal {
    fn mount_device(&self, device: &Path, target: &Path, fstype: Option<&str>) -> HalResult<()> {
        log::info!(
            "FAKE HAL: mount {} -> {} (type: {:?})",
            device.display(),
            target.display(),
            fstype
        );
        self.record_operation(Operation::Mount {
            device: device.to_path_buf(),
            target: target.to_path_buf(),
            fstype: fstype.map(String::from),
        });
        self.state
            .lock()
            .unwrap()
            .mounted_paths
            .insert(target.to_path_buf());
        Ok(())
    }

    fn unmount(&self, target: &Path) -> HalResult<()> {
        log::info!("FAKE HAL: unmount {}", target.display());
        self.record_operation(Operation::Unmount {
            target: target.to_path_buf(),
        });
        self.state.lock().unwrap().mounted_paths.remove(target);
        Ok(())
    }
}
