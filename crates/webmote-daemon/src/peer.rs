//! Peer-to-peer negotiation seam.
//!
//! The signaling state machine drives a [`PeerNegotiation`] without knowing
//! which WebRTC stack sits behind it. Asynchronous happenings on the peer
//! (gathered candidates, the client's data channel opening, transport
//! failure) arrive as [`PeerEvent`]s on the receiver returned by
//! [`PeerConnector::create`].

use async_trait::async_trait;
use tokio::sync::mpsc;
use webmote_protocol::Connection;
use webmote_types::{IceCandidate, SessionDescription};

use crate::error::DaemonError;

/// Something the peer reported.
#[derive(Debug)]
pub enum PeerEvent {
    /// A local candidate to trickle to the client.
    LocalCandidate(IceCandidate),
    /// The client's data channel is open and adapted to a [`Connection`].
    ChannelOpen(Connection),
    /// The peer transport failed.
    Failed(String),
}

/// One negotiation object, answering a single client offer.
#[async_trait]
pub trait PeerNegotiation: Send + Sync {
    /// Apply the client's offer as the remote description.
    async fn apply_remote(&self, offer: SessionDescription) -> Result<(), DaemonError>;

    /// Create an answer to the applied offer.
    async fn create_answer(&self) -> Result<SessionDescription, DaemonError>;

    /// Apply the answer as the local description.
    async fn apply_local(&self, answer: SessionDescription) -> Result<(), DaemonError>;

    /// Add a remote candidate. Only valid once the remote description is set.
    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), DaemonError>;

    /// Close the negotiation object and everything it owns.
    async fn close(&self);
}

/// Creates negotiation objects.
#[async_trait]
pub trait PeerConnector: Send + Sync + 'static {
    async fn create(
        &self,
    ) -> Result<(Box<dyn PeerNegotiation>, mpsc::Receiver<PeerEvent>), DaemonError>;
}
