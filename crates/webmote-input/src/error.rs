//! Controller backend errors.

use thiserror::Error;

use crate::ControllerHandle;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to connect to controller backend: {0}")]
    ClientConnect(String),

    #[error("failed to create controller: {0}")]
    Create(String),

    #[error("failed to attach controller: {0}")]
    Attach(String),

    #[error("failed to write controller state: {0}")]
    Write(String),

    #[error("unknown controller {0}")]
    UnknownController(ControllerHandle),

    #[error("backend not available on this platform")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
