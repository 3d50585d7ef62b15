//! Ordered execution of provisioning stages.

use crate::{ProvisionError, Stage};

pub type StageFn<'a, S> = Box<dyn Fn(&mut S) -> Result<(), ProvisionError> + 'a>;

pub struct StageDefinition<'a, S> {
    pub stage: Stage,
    pub run: StageFn<'a, S>,
}

pub trait WorkflowState {
    fn set_current(&mut self, stage: Stage);
    fn mark_completed(&mut self, stage: Stage);
}

/// The stage that aborted a run and why.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: Stage,
    pub error: ProvisionError,
}

/// Runs stages strictly in order and stops at the first failure.
///
/// Nothing is persisted: a failed run leaves the drive in an undefined state and the only
/// recovery is to start over.
#[derive(Debug, Default)]
pub struct StageRunner;

impl StageRunner {
    pub fn new() -> Self {
        Self
    }

    pub fn run<S: WorkflowState>(
        &self,
        state: &mut S,
        stages: &[StageDefinition<'_, S>],
    ) -> Result<(), StageFailure> {
        for def in stages {
            log::info!("stage: {}", def.stage);
            state.set_current(def.stage);
            if let Err(error) = (def.run)(state) {
                log::error!("stage '{}' failed: {}", def.stage, error);
                return Err(StageFailure {
                    stage: def.stage,
                    error,
                });
            }
            state.mark_completed(def.stage);
        }
        Ok(())
    }
}
