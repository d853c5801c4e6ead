//! Errors raised by the relay host itself.
//!
//! Failures the module reports through its return value are not errors here;
//! they reach the caller as `ModuleResult::Error`, and a return value that
//! cannot be decoded arrives as `ModuleResult::Unreadable`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The module loader failed or went away before delivering a module
    #[error("module unavailable: {0}")]
    ModuleUnavailable(String),

    /// A host-side call into the module failed (trap, bad export, out-of-bounds write)
    #[error("guest module failed to {stage}: {error:#}")]
    Guest {
        stage: &'static str,
        error: anyhow::Error,
    },

    #[error("relay worker has stopped")]
    WorkerStopped,

    #[error("relay worker panicked")]
    WorkerPanicked,

    #[error("failed to spawn relay worker: {0}")]
    Spawn(#[from] std::io::Error),
}

impl RelayError {
    pub(crate) fn guest(stage: &'static str, error: anyhow::Error) -> Self {
        RelayError::Guest { stage, error }
    }
}
