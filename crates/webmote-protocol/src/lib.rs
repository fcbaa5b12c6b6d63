//! Wire protocol for webmote.
//!
//! This crate decodes input updates from the two supported wire formats
//! (legacy JSON text frames and bincode v2 binary frames), parses signaling
//! envelopes, chooses a codec per connection, and defines the
//! transport-agnostic [`Connection`] that both WebSockets and WebRTC data
//! channels are adapted to.

pub mod codec;
pub mod connection;
pub mod error;
pub mod wire;

pub use codec::{Codec, CodecSelector, SubProtocol};
pub use connection::{ChannelEvent, Connection, Frame, RemoteEnd};
pub use error::ProtocolError;
pub use wire::UpdateFrame;
