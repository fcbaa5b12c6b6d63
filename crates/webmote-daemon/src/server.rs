//! HTTP surface: status document, health probe and the `/ws` endpoint.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info};
use webmote_protocol::wire::MAX_MESSAGE_SIZE;
use webmote_protocol::{ChannelEvent, CodecSelector, Connection, Frame, RemoteEnd, SubProtocol};
use webmote_types::StatusReport;

use crate::config::TransportMode;
use crate::negotiator::Negotiator;
use crate::status::get_status;

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub negotiator: Arc<Negotiator>,
    /// Mode for sockets that negotiated no sub-protocol.
    pub transport: TransportMode,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/status", get(status))
        .route("/healthz", get(healthz))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(get_status(state.negotiator.registry()))
}

async fn healthz() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.protocols(SubProtocol::NAMES)
        .max_message_size(MAX_MESSAGE_SIZE)
        .on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(socket: WebSocket, state: AppState) {
    let protocol = socket
        .protocol()
        .and_then(|p| p.to_str().ok())
        .and_then(SubProtocol::from_name);
    info!(protocol = ?protocol, "websocket connected");

    let (conn, remote) = Connection::pair("websocket");
    let RemoteEnd { events, outbound } = remote;
    let (sink, stream) = socket.split();
    tokio::spawn(pump_outbound(sink, outbound));
    let reader = tokio::spawn(pump_inbound(stream, events));

    let negotiator = &state.negotiator;
    match (protocol, state.transport) {
        (Some(SubProtocol::Signaling), _) | (None, TransportMode::Signaling) => {
            negotiator.serve_signaling(conn).await;
        }
        (Some(p), _) => {
            let codec = p.codec().map_or_else(CodecSelector::sniffing, CodecSelector::fixed);
            negotiator.serve_direct(conn, codec).await;
        }
        (None, TransportMode::Direct) => {
            negotiator.serve_direct(conn, CodecSelector::sniffing()).await;
        }
    }
    reader.abort();
}

async fn pump_inbound(mut stream: SplitStream<WebSocket>, events: mpsc::Sender<ChannelEvent>) {
    while let Some(msg) = stream.next().await {
        let frame = match msg {
            Ok(Message::Text(text)) => Frame::Text(text),
            Ok(Message::Binary(bytes)) => Frame::Binary(bytes),
            Ok(Message::Ping(_) | Message::Pong(_)) => continue,
            Ok(Message::Close(_)) => break,
            Err(e) => {
                debug!(error = %e, "websocket read failed");
                break;
            }
        };
        if events.send(ChannelEvent::Frame(frame)).await.is_err() {
            return;
        }
    }
    let _ = events.send(ChannelEvent::Closed).await;
}

async fn pump_outbound(mut sink: SplitSink<WebSocket, Message>, mut outbound: mpsc::Receiver<Frame>) {
    while let Some(frame) = outbound.recv().await {
        let msg = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        if let Err(e) = sink.send(msg).await {
            debug!(error = %e, "websocket write failed");
            return;
        }
    }
    let _ = sink.close().await;
}
