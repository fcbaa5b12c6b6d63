//! Transport negotiator.
//!
//! Every client connection is served by one task running either
//! [`Negotiator::serve_direct`] (updates arrive on the socket itself) or
//! [`Negotiator::serve_signaling`] (the socket carries offer/answer/candidate
//! envelopes for a WebRTC data channel that then carries the updates).
//!
//! The signaling side is a per-connection state machine:
//!
//! ```text
//! AwaitingOffer --offer--> NegotiatingAnswer --answer sent--> AwaitingChannel
//!       ^                                                           |
//!       +------------- data channel closed <--- Established <-------+
//! ```
//!
//! Any transport error, malformed envelope or expired deadline moves to
//! `Failed`, which sends `{"error": ...}` and closes the socket.

use std::future::pending;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use webmote_protocol::{wire, ChannelEvent, CodecSelector, Connection, Frame};
use webmote_types::{IceCandidate, SdpKind, SessionDescription, SignalMessage};

use crate::dispatch::Dispatcher;
use crate::error::DaemonError;
use crate::peer::{PeerConnector, PeerEvent, PeerNegotiation};
use crate::registry::SessionRegistry;
use crate::session::ControllerSession;
use crate::state::NegotiationPhase;

/// Ephemeral state of one signaled negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalingExchange {
    pub phase: NegotiationPhase,
    /// Remote candidates received before the negotiation could take them.
    pub pending_candidates: Vec<IceCandidate>,
}

impl Default for SignalingExchange {
    fn default() -> Self {
        Self {
            phase: NegotiationPhase::AwaitingOffer,
            pending_candidates: Vec::new(),
        }
    }
}

/// The data channel of an established negotiation.
struct DataChannel {
    session: ControllerSession,
    conn: Connection,
    codec: CodecSelector,
}

#[derive(Default)]
struct Signaling {
    exchange: SignalingExchange,
    peer: Option<Box<dyn PeerNegotiation>>,
    peer_events: Option<mpsc::Receiver<PeerEvent>>,
    channel: Option<DataChannel>,
    deadline: Option<Instant>,
}

enum Flow {
    Continue,
    SocketClosed,
}

enum Step {
    Socket(ChannelEvent),
    Peer(Option<PeerEvent>),
    Channel(ChannelEvent),
    Timeout,
}

enum Answering {
    Answered(Result<SessionDescription, DaemonError>),
    Superseded(SessionDescription),
    SocketClosed,
    Failed(DaemonError),
}

/// Serves client connections.
pub struct Negotiator {
    registry: Arc<SessionRegistry>,
    dispatcher: Dispatcher,
    connector: Arc<dyn PeerConnector>,
    negotiation_timeout: Option<Duration>,
}

impl Negotiator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        connector: Arc<dyn PeerConnector>,
        negotiation_timeout: Option<Duration>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(registry.backend()));
        Self {
            registry,
            dispatcher,
            connector,
            negotiation_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Serve a socket that carries updates directly.
    pub async fn serve_direct(&self, mut conn: Connection, mut codec: CodecSelector) {
        let session = match self.registry.create_session().await {
            Ok(session) => session,
            Err(e) => {
                warn!(label = %conn.label(), error = %e, "rejecting connection");
                let _ = conn.send(Frame::Text(wire::encode_error(&e.to_string()))).await;
                conn.close();
                return;
            }
        };
        self.registry.activate(&session);
        info!(label = %conn.label(), session = %session.id(), "direct connection established");

        while let ChannelEvent::Frame(frame) = conn.recv().await {
            self.dispatch_frame(&session, &mut codec, &frame).await;
        }

        self.registry.destroy(&session).await;
        info!(label = %conn.label(), session = %session.id(), "direct connection closed");
    }

    /// Serve a socket that carries peer-to-peer signaling.
    pub async fn serve_signaling(&self, mut conn: Connection) {
        let mut sig = Signaling::default();
        info!(label = %conn.label(), "signaling connection open");

        loop {
            let step = tokio::select! {
                event = conn.recv() => Step::Socket(event),
                event = next_peer_event(&mut sig.peer_events) => Step::Peer(event),
                event = next_channel_event(&mut sig.channel) => Step::Channel(event),
                () = wait_deadline(sig.deadline) => Step::Timeout,
            };

            let result = match step {
                Step::Socket(ChannelEvent::Closed) => Ok(Flow::SocketClosed),
                Step::Socket(ChannelEvent::Frame(frame)) => {
                    self.on_signal(&mut conn, &mut sig, frame).await
                }
                Step::Peer(Some(event)) => self.on_peer_event(&conn, &mut sig, event).await,
                Step::Peer(None) => {
                    sig.peer_events = None;
                    Ok(Flow::Continue)
                }
                Step::Channel(event) => {
                    self.on_channel_event(&mut sig, event).await;
                    Ok(Flow::Continue)
                }
                Step::Timeout => Err(DaemonError::SignalingFailure(
                    "negotiation timed out".to_string(),
                )),
            };

            match result {
                Ok(Flow::Continue) => {}
                Ok(Flow::SocketClosed) => break,
                Err(e) => {
                    warn!(label = %conn.label(), phase = %sig.exchange.phase, error = %e, "negotiation failed");
                    sig.exchange.phase = NegotiationPhase::Failed;
                    let _ = send_signal(&conn, &SignalMessage::Error(e.to_string())).await;
                    break;
                }
            }
        }

        self.teardown(&mut sig).await;
        info!(label = %conn.label(), "signaling connection closed");
        conn.close();
    }

    async fn on_signal(
        &self,
        conn: &mut Connection,
        sig: &mut Signaling,
        frame: Frame,
    ) -> Result<Flow, DaemonError> {
        match parse_signal(&frame)? {
            SignalMessage::Offer(offer) => self.negotiate(conn, sig, offer).await,
            SignalMessage::Ice(candidate) => {
                match &sig.peer {
                    Some(peer) if sig.exchange.phase != NegotiationPhase::NegotiatingAnswer => {
                        peer.add_candidate(candidate).await?;
                    }
                    _ => sig.exchange.pending_candidates.push(candidate),
                }
                Ok(Flow::Continue)
            }
            other => Err(unexpected(&other)),
        }
    }

    /// Run offer -> answer, superseding whatever negotiation came before.
    async fn negotiate(
        &self,
        conn: &mut Connection,
        sig: &mut Signaling,
        mut offer: SessionDescription,
    ) -> Result<Flow, DaemonError> {
        loop {
            self.supersede(sig).await;
            sig.exchange.phase = NegotiationPhase::NegotiatingAnswer;
            // A timeout too large to represent never fires.
            sig.deadline = self
                .negotiation_timeout
                .and_then(|t| Instant::now().checked_add(t));
            debug!(label = %conn.label(), "negotiating answer");

            let (peer, events) = self.connector.create().await?;
            let deadline = sig.deadline;
            let outcome = {
                let steps = answer_offer(peer.as_ref(), offer);
                tokio::pin!(steps);
                loop {
                    tokio::select! {
                        result = &mut steps => break Answering::Answered(result),
                        event = conn.recv() => match event {
                            ChannelEvent::Closed => break Answering::SocketClosed,
                            ChannelEvent::Frame(frame) => match parse_signal(&frame) {
                                Ok(SignalMessage::Ice(candidate)) => {
                                    sig.exchange.pending_candidates.push(candidate);
                                }
                                Ok(SignalMessage::Offer(next)) => break Answering::Superseded(next),
                                Ok(other) => break Answering::Failed(unexpected(&other)),
                                Err(e) => break Answering::Failed(e),
                            },
                        },
                        () = wait_deadline(deadline) => {
                            break Answering::Failed(DaemonError::SignalingFailure(
                                "negotiation timed out".to_string(),
                            ));
                        }
                    }
                }
            };
            sig.peer = Some(peer);
            sig.peer_events = Some(events);

            let answer = match outcome {
                Answering::Answered(result) => result?,
                Answering::Superseded(next) => {
                    offer = next;
                    continue;
                }
                Answering::SocketClosed => return Ok(Flow::SocketClosed),
                Answering::Failed(e) => return Err(e),
            };

            let pending = std::mem::take(&mut sig.exchange.pending_candidates);
            if let Some(peer) = &sig.peer {
                for candidate in pending {
                    peer.add_candidate(candidate).await?;
                }
            }
            if send_signal(conn, &SignalMessage::Answer(answer)).await.is_err() {
                return Ok(Flow::SocketClosed);
            }
            sig.exchange.phase = NegotiationPhase::AwaitingChannel;
            debug!(label = %conn.label(), "answer sent");
            return Ok(Flow::Continue);
        }
    }

    async fn on_peer_event(
        &self,
        conn: &Connection,
        sig: &mut Signaling,
        event: PeerEvent,
    ) -> Result<Flow, DaemonError> {
        match event {
            PeerEvent::LocalCandidate(candidate) => {
                if send_signal(conn, &SignalMessage::Ice(candidate)).await.is_err() {
                    return Ok(Flow::SocketClosed);
                }
                Ok(Flow::Continue)
            }
            PeerEvent::ChannelOpen(channel) => {
                if sig.exchange.phase != NegotiationPhase::AwaitingChannel {
                    debug!(label = %channel.label(), phase = %sig.exchange.phase, "ignoring extra data channel");
                    channel.close();
                    return Ok(Flow::Continue);
                }
                let session = match self.registry.create_session().await {
                    Ok(session) => session,
                    Err(e) => {
                        channel.close();
                        return Err(e);
                    }
                };
                self.registry.activate(&session);
                info!(label = %conn.label(), session = %session.id(), "peer connection established");
                sig.exchange.phase = NegotiationPhase::Established;
                sig.deadline = None;
                sig.channel = Some(DataChannel {
                    session,
                    conn: channel,
                    codec: CodecSelector::sniffing(),
                });
                Ok(Flow::Continue)
            }
            PeerEvent::Failed(reason) => Err(DaemonError::SignalingFailure(reason)),
        }
    }

    async fn on_channel_event(&self, sig: &mut Signaling, event: ChannelEvent) {
        match event {
            ChannelEvent::Frame(frame) => {
                if let Some(channel) = &mut sig.channel {
                    self.dispatch_frame(&channel.session, &mut channel.codec, &frame)
                        .await;
                }
            }
            ChannelEvent::Closed => {
                info!("data channel closed, awaiting a new offer");
                self.teardown(sig).await;
                sig.exchange.phase = NegotiationPhase::AwaitingOffer;
            }
        }
    }

    async fn dispatch_frame(
        &self,
        session: &ControllerSession,
        codec: &mut CodecSelector,
        frame: &Frame,
    ) {
        let update = match codec.decode(frame) {
            Ok(update) => update,
            Err(e) => {
                debug!(session = %session.id(), error = %e, "dropping malformed update");
                return;
            }
        };
        match self.dispatcher.apply(session, &update).await {
            Ok(()) => {}
            Err(DaemonError::UnrecognizedControl(e)) => {
                warn!(session = %session.id(), error = %e, "dropping update");
            }
            Err(e) => warn!(session = %session.id(), error = %e, "failed to apply update"),
        }
    }

    /// Close a previous negotiation before starting a new one.
    async fn supersede(&self, sig: &mut Signaling) {
        if sig.peer.is_some() {
            debug!(phase = %sig.exchange.phase, "superseding previous negotiation");
            sig.exchange.pending_candidates.clear();
        }
        self.teardown(sig).await;
    }

    /// Release everything the negotiation owns. Idempotent.
    async fn teardown(&self, sig: &mut Signaling) {
        if let Some(channel) = sig.channel.take() {
            self.registry.destroy(&channel.session).await;
            channel.conn.close();
        }
        if let Some(peer) = sig.peer.take() {
            peer.close().await;
        }
        sig.peer_events = None;
        sig.deadline = None;
    }
}

/// Apply the offer, then create and apply the answer.
async fn answer_offer(
    peer: &dyn PeerNegotiation,
    offer: SessionDescription,
) -> Result<SessionDescription, DaemonError> {
    peer.apply_remote(offer).await?;
    let answer = peer.create_answer().await?;
    peer.apply_local(answer.clone()).await?;
    Ok(answer)
}

fn parse_signal(frame: &Frame) -> Result<SignalMessage, DaemonError> {
    let Frame::Text(text) = frame else {
        return Err(DaemonError::SignalingFailure(
            "binary frame on signaling socket".to_string(),
        ));
    };
    let msg = wire::decode_signal(text)
        .map_err(|e| DaemonError::SignalingFailure(format!("bad envelope: {e}")))?;
    if let SignalMessage::Offer(offer) = &msg {
        if offer.kind != SdpKind::Offer {
            return Err(DaemonError::SignalingFailure(
                "offer envelope carries an answer".to_string(),
            ));
        }
    }
    Ok(msg)
}

fn unexpected(msg: &SignalMessage) -> DaemonError {
    let kind = match msg {
        SignalMessage::Offer(_) => "offer",
        SignalMessage::Answer(_) => "answer",
        SignalMessage::Ice(_) => "ice",
        SignalMessage::Error(_) => "error",
    };
    DaemonError::SignalingFailure(format!("unexpected {kind} envelope from client"))
}

async fn send_signal(conn: &Connection, msg: &SignalMessage) -> Result<(), DaemonError> {
    let text = wire::encode_signal(msg)?;
    conn.send(Frame::Text(text)).await?;
    Ok(())
}

async fn next_peer_event(events: &mut Option<mpsc::Receiver<PeerEvent>>) -> Option<PeerEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

async fn next_channel_event(channel: &mut Option<DataChannel>) -> ChannelEvent {
    match channel {
        Some(channel) => channel.conn.recv().await,
        None => pending().await,
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => pending().await,
    }
}
