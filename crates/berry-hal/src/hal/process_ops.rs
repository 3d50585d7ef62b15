//! Process execution helpers.
//!
//! External commands are considered "world-touching" and must go through the HAL so we can
//! test workflows without spawning real processes.

use super::CommandSpec;
use crate::{HalError, HalResult};
use std::process::Output;

/// Process execution trait (external command runner).
///
/// Implementations block until the child exits. There is no timeout: formatting a slow
/// card can legitimately take minutes.
pub trait ProcessOps {
    /// Run the command and return its captured output regardless of exit status.
    fn run(&self, spec: &CommandSpec) -> HalResult<Output>;

    /// Run the command and fail unless it exits with status zero.
    fn run_status(&self, spec: &CommandSpec) -> HalResult<()> {
        let output = self.run(spec)?;
        if !output.status.success() {
            return Err(HalError::CommandFailed {
                program: spec.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
