use berry_workflow::ProvisionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstallerError {
    #[error("Missing --yes-i-know flag. Formatting {0} destroys everything on it!")]
    MissingYesIKnow(String),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("Formatting worker panicked")]
    WorkerPanicked,

    #[error("Formatting worker exited without reporting a result")]
    NoTerminalEvent,
}
