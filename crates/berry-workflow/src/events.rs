use crate::Stage;

/// Notifications sent from the worker to the caller.
///
/// A run emits any number of `Status` events followed by exactly one `Error` or `Completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionEvent {
    Status(String),
    Error { stage: Stage, message: String },
    Completed,
}

impl ProvisionEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProvisionEvent::Status(_))
    }
}
