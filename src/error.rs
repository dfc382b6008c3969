// src/error.rs
// Error taxonomy for the polling engine. Transient classes (source, notifier)
// are isolated per keyword / per record and retried on the next cycle;
// persistence failures abort the running cycle.

use thiserror::Error;

/// Failure of the external marketplace source for one keyword.
/// Transient: the keyword is skipped for the current cycle and retried on the
/// next one, never within the same cycle.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Failure of the notification sink for one listing record.
/// Transient: the record stays unseen and is retried on the next cycle.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}

/// Persistence-layer failure. Fatal for the running cycle: the engine stops
/// advancing the seen registry and surfaces the error through the cycle
/// status instead of committing inconsistent state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but does not parse as a state document. Requires
    /// external intervention; the engine refuses to guess.
    #[error("state file corrupt: {0}")]
    Corrupt(String),
}
