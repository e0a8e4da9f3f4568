use thiserror::Error;

/// Reasons a migration refuses to start. Nothing is recorded for the run.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    #[error("A migration is already running in this context")]
    AlreadyMigrating,

    #[error("A migration is already running in another context")]
    RunningElsewhere,
}

/// Errors of the cross-context broadcast channel.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Nobody is listening on the channel, including ourselves.
    #[error("No listener on the broadcast channel")]
    NoListeners,

    #[error("Broadcast channel closed")]
    Closed,

    #[error("Coordination socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode broadcast frame: {0}")]
    Encode(#[from] serde_json::Error),
}
