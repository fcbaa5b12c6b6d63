//! Daemon errors.

use thiserror::Error;
use webmote_input::BackendError;
use webmote_protocol::ProtocolError;
use webmote_types::{SessionId, UnknownControl};

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("startup failed: {0}")]
    Startup(String),

    /// The backend could not provide a controller for a new client.
    #[error("controller backend unavailable: {0}")]
    BackendUnavailable(#[source] BackendError),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("unrecognized control: {0}")]
    UnrecognizedControl(#[from] UnknownControl),

    #[error("malformed message: {0}")]
    MalformedMessage(#[from] ProtocolError),

    #[error("signaling failed: {0}")]
    SignalingFailure(String),

    #[error("session {0} is closed")]
    SessionClosed(SessionId),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<webrtc::Error> for DaemonError {
    fn from(e: webrtc::Error) -> Self {
        Self::SignalingFailure(e.to_string())
    }
}
