//! Protocol and codec errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("message size {size} exceeds maximum {max}")]
    TooLarge { size: usize, max: usize },

    #[error("codec mismatch: connection speaks {expected}, got a {got} frame")]
    CodecMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("serialisation error: {0}")]
    Serialization(String),

    #[error("channel closed")]
    ChannelClosed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProtocolError {
    /// Whether the error concerns a single bad payload (the connection can
    /// keep going) rather than the channel itself.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::Malformed(_) | Self::TooLarge { .. } | Self::CodecMismatch { .. }
        )
    }
}
