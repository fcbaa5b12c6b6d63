//! Transport-agnostic message channels.
//!
//! Both the direct WebSocket and the WebRTC data channel are adapted to a
//! [`Connection`]: an ordered stream of inbound [`ChannelEvent`]s plus a sink
//! for outbound [`Frame`]s. The transport adapter holds the [`RemoteEnd`].

use tokio::sync::mpsc;
use tracing::trace;

use crate::error::ProtocolError;

/// Default buffer depth for connection queues.
pub const DEFAULT_CAPACITY: usize = 256;

/// One message on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl Frame {
    /// Short name of the frame kind, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Binary(_) => "binary",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Text(t) => t.len(),
            Self::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Something that happened on the inbound side of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// A message arrived.
    Frame(Frame),
    /// The remote closed the channel. No further events follow.
    Closed,
}

/// The server's side of a channel.
///
/// Dropping the `Connection` closes the outbound queue, which the transport
/// adapter treats as a request to close the underlying socket or channel.
#[derive(Debug)]
pub struct Connection {
    label: String,
    events: mpsc::Receiver<ChannelEvent>,
    outbound: mpsc::Sender<Frame>,
    closed: bool,
}

/// The transport adapter's side of a channel.
#[derive(Debug)]
pub struct RemoteEnd {
    /// Push inbound frames (and finally [`ChannelEvent::Closed`]) here.
    pub events: mpsc::Sender<ChannelEvent>,
    /// Frames the server wants delivered to the remote.
    pub outbound: mpsc::Receiver<Frame>,
}

impl Connection {
    /// Create a connected pair with the default queue depth.
    pub fn pair(label: impl Into<String>) -> (Self, RemoteEnd) {
        Self::with_capacity(label, DEFAULT_CAPACITY)
    }

    /// Create a connected pair with a custom queue depth.
    pub fn with_capacity(label: impl Into<String>, capacity: usize) -> (Self, RemoteEnd) {
        let (event_tx, event_rx) = mpsc::channel(capacity);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        let conn = Self {
            label: label.into(),
            events: event_rx,
            outbound: out_tx,
            closed: false,
        };
        let remote = RemoteEnd {
            events: event_tx,
            outbound: out_rx,
        };
        (conn, remote)
    }

    /// Human-readable label (remote address or channel label).
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Receive the next inbound event.
    ///
    /// Once the remote has gone away this keeps returning
    /// [`ChannelEvent::Closed`], whether or not the adapter sent one.
    pub async fn recv(&mut self) -> ChannelEvent {
        if self.closed {
            return ChannelEvent::Closed;
        }
        match self.events.recv().await {
            Some(ChannelEvent::Frame(frame)) => {
                trace!(label = %self.label, kind = frame.kind(), len = frame.len(), "received frame");
                ChannelEvent::Frame(frame)
            }
            Some(ChannelEvent::Closed) | None => {
                self.closed = true;
                ChannelEvent::Closed
            }
        }
    }

    /// Queue a frame for delivery.
    pub async fn send(&self, frame: Frame) -> Result<(), ProtocolError> {
        let len = frame.len();
        self.outbound
            .send(frame)
            .await
            .map_err(|_| ProtocolError::ChannelClosed)?;
        trace!(label = %self.label, len, "sent frame");
        Ok(())
    }

    /// Close the channel from the server side.
    pub fn close(self) {
        trace!(label = %self.label, "closing connection");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (mut conn, mut remote) = Connection::pair("test");
        remote
            .events
            .send(ChannelEvent::Frame(Frame::Text("hi".into())))
            .await
            .unwrap();
        assert_eq!(conn.recv().await, ChannelEvent::Frame(Frame::Text("hi".into())));

        conn.send(Frame::Binary(vec![1, 2])).await.unwrap();
        assert_eq!(remote.outbound.recv().await, Some(Frame::Binary(vec![1, 2])));
    }

    #[tokio::test]
    async fn dropped_remote_reads_as_closed_forever() {
        let (mut conn, remote) = Connection::pair("test");
        drop(remote);
        assert_eq!(conn.recv().await, ChannelEvent::Closed);
        assert_eq!(conn.recv().await, ChannelEvent::Closed);
        assert!(matches!(
            conn.send(Frame::Text("late".into())).await,
            Err(ProtocolError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn closing_connection_ends_outbound_queue() {
        let (conn, mut remote) = Connection::pair("test");
        conn.close();
        assert_eq!(remote.outbound.recv().await, None);
    }
}
