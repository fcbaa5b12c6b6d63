//! WebRTC answerer built on the `webrtc` crate.
//!
//! The browser creates the data channel and sends the offer; we answer,
//! trickle our candidates back, and adapt the channel to a [`Connection`]
//! once it opens.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webmote_protocol::{ChannelEvent, Connection, Frame, RemoteEnd};
use webmote_types::{IceCandidate, SessionDescription};
use webrtc::api::{APIBuilder, API};
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use crate::error::DaemonError;
use crate::peer::{PeerConnector, PeerEvent, PeerNegotiation};
use crate::session::lock;

const PEER_EVENT_CAPACITY: usize = 64;

/// Creates WebRTC peer connections configured with the given ICE servers.
pub struct WebRtcConnector {
    api: API,
    ice_servers: Vec<String>,
}

impl WebRtcConnector {
    pub fn new(ice_servers: Vec<String>) -> Self {
        Self {
            api: APIBuilder::new().build(),
            ice_servers,
        }
    }

    fn configuration(&self) -> RTCConfiguration {
        let ice_servers = if self.ice_servers.is_empty() {
            Vec::new()
        } else {
            vec![RTCIceServer {
                urls: self.ice_servers.clone(),
                ..Default::default()
            }]
        };
        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn create(
        &self,
    ) -> Result<(Box<dyn PeerNegotiation>, mpsc::Receiver<PeerEvent>), DaemonError> {
        let pc = Arc::new(self.api.new_peer_connection(self.configuration()).await?);
        let (events_tx, events_rx) = mpsc::channel(PEER_EVENT_CAPACITY);

        let tx = events_tx.clone();
        pc.on_ice_candidate(Box::new(move |candidate: Option<RTCIceCandidate>| {
            let tx = tx.clone();
            Box::pin(async move {
                let Some(candidate) = candidate else {
                    debug!("local candidate gathering complete");
                    return;
                };
                match candidate.to_json() {
                    Ok(init) => {
                        let _ = tx.send(PeerEvent::LocalCandidate(from_init(init))).await;
                    }
                    Err(e) => debug!(error = %e, "failed to serialise local candidate"),
                }
            })
        }));

        let tx = events_tx.clone();
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let tx = tx.clone();
            Box::pin(async move {
                debug!(%state, "peer connection state changed");
                if state == RTCPeerConnectionState::Failed {
                    let _ = tx
                        .send(PeerEvent::Failed("peer connection failed".to_string()))
                        .await;
                }
            })
        }));

        let tx = events_tx;
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = tx.clone();
            Box::pin(async move {
                info!(label = %dc.label(), "data channel received");
                attach_channel(dc, tx);
            })
        }));

        Ok((Box::new(WebRtcNegotiation { pc }), events_rx))
    }
}

/// Wire a data channel to a fresh [`Connection`], handed over on open.
fn attach_channel(dc: Arc<RTCDataChannel>, tx: mpsc::Sender<PeerEvent>) {
    let (conn, remote) = Connection::pair(format!("datachannel:{}", dc.label()));
    let RemoteEnd {
        events,
        mut outbound,
    } = remote;

    let inbound = events.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let inbound = inbound.clone();
        Box::pin(async move {
            let frame = if msg.is_string {
                match String::from_utf8(msg.data.to_vec()) {
                    Ok(text) => Frame::Text(text),
                    Err(e) => Frame::Binary(e.into_bytes()),
                }
            } else {
                Frame::Binary(msg.data.to_vec())
            };
            let _ = inbound.send(ChannelEvent::Frame(frame)).await;
        })
    }));

    dc.on_close(Box::new(move || {
        let events = events.clone();
        Box::pin(async move {
            let _ = events.send(ChannelEvent::Closed).await;
        })
    }));

    let slot = Arc::new(Mutex::new(Some(conn)));
    dc.on_open(Box::new(move || {
        let conn = lock(&slot).take();
        let tx = tx.clone();
        Box::pin(async move {
            if let Some(conn) = conn {
                let _ = tx.send(PeerEvent::ChannelOpen(conn)).await;
            }
        })
    }));

    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            let result = match frame {
                Frame::Text(text) => dc.send_text(text).await,
                Frame::Binary(bytes) => dc.send(&Bytes::from(bytes)).await,
            };
            if let Err(e) = result {
                warn!(label = %dc.label(), error = %e, "data channel send failed");
                break;
            }
        }
        if let Err(e) = dc.close().await {
            debug!(error = %e, "data channel close failed");
        }
    });
}

fn from_init(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn to_init(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_mline_index,
        username_fragment: candidate.username_fragment,
    }
}

struct WebRtcNegotiation {
    pc: Arc<RTCPeerConnection>,
}

#[async_trait]
impl PeerNegotiation for WebRtcNegotiation {
    async fn apply_remote(&self, offer: SessionDescription) -> Result<(), DaemonError> {
        let offer = RTCSessionDescription::offer(offer.sdp)?;
        self.pc.set_remote_description(offer).await?;
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, DaemonError> {
        let answer = self.pc.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn apply_local(&self, answer: SessionDescription) -> Result<(), DaemonError> {
        let answer = RTCSessionDescription::answer(answer.sdp)?;
        self.pc.set_local_description(answer).await?;
        Ok(())
    }

    async fn add_candidate(&self, candidate: IceCandidate) -> Result<(), DaemonError> {
        self.pc.add_ice_candidate(to_init(candidate)).await?;
        Ok(())
    }

    async fn close(&self) {
        if let Err(e) = self.pc.close().await {
            debug!(error = %e, "peer connection close failed");
        }
    }
}
