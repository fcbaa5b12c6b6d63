//! Per-connection codec selection.
//!
//! A connection speaks exactly one update codec. It is fixed up front when
//! the client negotiated a WebSocket sub-protocol, otherwise it is sniffed
//! from the first update frame that decodes successfully and then locked.

use tracing::debug;
use webmote_types::Update;

use crate::connection::Frame;
use crate::error::ProtocolError;
use crate::wire;

/// Sub-protocol name for legacy JSON update frames.
pub const SUBPROTOCOL_JSON: &str = "webmote.json";
/// Sub-protocol name for binary update frames.
pub const SUBPROTOCOL_BINARY: &str = "webmote.binary";
/// Sub-protocol name for peer-to-peer signaling.
pub const SUBPROTOCOL_SIGNALING: &str = "webmote.signaling";

/// A WebSocket sub-protocol understood by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubProtocol {
    Json,
    Binary,
    Signaling,
}

impl SubProtocol {
    /// All sub-protocol names, in server preference order.
    pub const NAMES: [&'static str; 3] = [SUBPROTOCOL_SIGNALING, SUBPROTOCOL_BINARY, SUBPROTOCOL_JSON];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            SUBPROTOCOL_JSON => Some(Self::Json),
            SUBPROTOCOL_BINARY => Some(Self::Binary),
            SUBPROTOCOL_SIGNALING => Some(Self::Signaling),
            _ => None,
        }
    }

    /// The update codec this sub-protocol pins, if any.
    pub fn codec(self) -> Option<Codec> {
        match self {
            Self::Json => Some(Codec::Json),
            Self::Binary => Some(Codec::Binary),
            Self::Signaling => None,
        }
    }
}

/// An update codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Legacy JSON text frames.
    Json,
    /// Bincode binary frames.
    Binary,
}

impl Codec {
    pub fn name(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Binary => "binary",
        }
    }

    fn decode(self, frame: &Frame) -> Result<Update, ProtocolError> {
        match (self, frame) {
            (Self::Json, Frame::Text(text)) => wire::decode_json(text),
            (Self::Binary, Frame::Binary(bytes)) => wire::decode_binary(bytes),
            (codec, frame) => Err(ProtocolError::CodecMismatch {
                expected: codec.name(),
                got: frame.kind(),
            }),
        }
    }

    fn for_frame(frame: &Frame) -> Self {
        match frame {
            Frame::Text(_) => Self::Json,
            Frame::Binary(_) => Self::Binary,
        }
    }
}

/// Decodes update frames for one connection.
#[derive(Debug, Clone, Default)]
pub struct CodecSelector {
    locked: Option<Codec>,
}

impl CodecSelector {
    /// A selector that sniffs the codec from the first good frame.
    pub fn sniffing() -> Self {
        Self { locked: None }
    }

    /// A selector pinned to `codec`.
    pub fn fixed(codec: Codec) -> Self {
        Self {
            locked: Some(codec),
        }
    }

    /// The codec in use, once known.
    pub fn codec(&self) -> Option<Codec> {
        self.locked
    }

    /// Decode one frame into an update.
    pub fn decode(&mut self, frame: &Frame) -> Result<Update, ProtocolError> {
        if let Some(codec) = self.locked {
            return codec.decode(frame);
        }
        let codec = Codec::for_frame(frame);
        let update = codec.decode(frame)?;
        debug!(codec = codec.name(), "locked connection codec");
        self.locked = Some(codec);
        Ok(update)
    }
}
