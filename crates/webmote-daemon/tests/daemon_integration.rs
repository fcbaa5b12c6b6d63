//! Integration tests exercising the full daemon on loopback.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing_subscriber::EnvFilter;
use webmote_daemon::config::{Config, TransportMode};
use webmote_daemon::peer::{PeerConnector, PeerEvent, PeerNegotiation};
use webmote_daemon::{Daemon, DaemonError, DaemonEvent};
use webmote_input::mock::{MockBackend, MockBackendHandle};
use webmote_protocol::{wire, ChannelEvent, Connection, Frame, RemoteEnd};
use webmote_types::{IceCandidate, SessionDescription, SignalMessage, Update};

const WAIT: Duration = Duration::from_secs(5);

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A running daemon plus the handles tests poke at.
struct TestDaemon {
    addr: SocketAddr,
    backend: MockBackendHandle,
    shutdown: mpsc::Sender<DaemonEvent>,
    handle: tokio::task::JoinHandle<Result<(), DaemonError>>,
}

impl TestDaemon {
    async fn shutdown(self) {
        let _ = self.shutdown.send(DaemonEvent::Shutdown).await;
        let _ = tokio::time::timeout(WAIT, self.handle).await;
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

async fn start_daemon(transport: TransportMode, connector: Option<ScriptedConnector>) -> TestDaemon {
    init_tracing();
    let mut config = Config::default();
    config.server.bind = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.transport = transport;

    let backend = MockBackend::new();
    let handle = backend.handle();
    let mut daemon = Daemon::new(config, Arc::new(backend));
    if let Some(connector) = connector {
        daemon = daemon.with_connector(Arc::new(connector));
    }
    let shutdown = daemon.event_sender();
    let listener = daemon.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let join = tokio::spawn(daemon.serve(listener));

    TestDaemon {
        addr,
        backend: handle,
        shutdown,
        handle: join,
    }
}

async fn connect(addr: SocketAddr, protocol: Option<&str>) -> Client {
    let mut request = format!("ws://{addr}/ws").into_client_request().unwrap();
    if let Some(protocol) = protocol {
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", HeaderValue::from_str(protocol).unwrap());
    }
    let (ws, _response) = tokio_tungstenite::connect_async(request).await.unwrap();
    ws
}

/// Fetch `/status` with a bare HTTP/1.1 request.
async fn get_status(addr: SocketAddr) -> serde_json::Value {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /status HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let text = String::from_utf8(raw).unwrap();
    let (head, body) = text.split_once("\r\n\r\n").unwrap();
    assert!(head.starts_with("HTTP/1.1 200"), "{head}");
    serde_json::from_str(body).unwrap()
}

/// Poll `/status` until `pred` holds.
async fn wait_for_status(
    addr: SocketAddr,
    pred: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    tokio::time::timeout(WAIT, async {
        loop {
            let status = get_status(addr).await;
            if pred(&status) {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("status condition not reached")
}

fn controller_count(status: &serde_json::Value) -> usize {
    status["controllers"].as_array().map_or(0, Vec::len)
}

async fn next_text(ws: &mut Client) -> Option<String> {
    loop {
        match tokio::time::timeout(WAIT, ws.next()).await.expect("timed out")? {
            Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

#[tokio::test]
async fn direct_json_updates_show_in_status() {
    let daemon = start_daemon(TransportMode::Direct, None).await;
    let mut ws = connect(daemon.addr, None).await;
    wait_for_status(daemon.addr, |s| controller_count(s) == 1).await;

    ws.send(Message::text(r#"{"type":"button","name":"a","value":true}"#))
        .await
        .unwrap();
    ws.send(Message::text(r#"{"type":"axis","name":"left","value":[0.5,-0.3]}"#))
        .await
        .unwrap();
    ws.send(Message::text(r#"{"type":"axis","name":"center","value":[1,1]}"#))
        .await
        .unwrap();
    ws.send(Message::text("not json")).await.unwrap();
    ws.send(Message::text(r#"{"type":"button","name":"b","value":0.25}"#))
        .await
        .unwrap();

    let status = wait_for_status(daemon.addr, |s| s["controllers"][0]["button"]["B"] == 0.25).await;
    let controller = &status["controllers"][0];
    assert_eq!(controller["button"]["A"], true);
    assert_eq!(controller["axis"]["leftX"], 0.5);
    assert_eq!(controller["axis"]["leftY"], -0.3);
    assert_eq!(controller["axis"]["rightX"], 0.0);
    assert_eq!(controller["attached"], true);
    assert_eq!(controller["type"], "x360");

    ws.close(None).await.unwrap();
    wait_for_status(daemon.addr, |s| controller_count(s) == 0).await;
    assert_eq!(daemon.backend.total_releases(), 1);

    daemon.shutdown().await;
}

#[tokio::test]
async fn binary_sub_protocol_updates() {
    let daemon = start_daemon(TransportMode::Direct, None).await;
    let mut ws = connect(daemon.addr, Some("webmote.binary")).await;
    wait_for_status(daemon.addr, |s| controller_count(s) == 1).await;

    let frame = wire::encode_binary(&Update::axis("right", -1.0, 0.75)).unwrap();
    ws.send(Message::binary(frame)).await.unwrap();
    // JSON is not accepted on a binary socket.
    ws.send(Message::text(r#"{"type":"button","name":"a","value":true}"#))
        .await
        .unwrap();
    let frame = wire::encode_binary(&Update::button("guide", true)).unwrap();
    ws.send(Message::binary(frame)).await.unwrap();

    let status =
        wait_for_status(daemon.addr, |s| s["controllers"][0]["button"]["GUIDE"] == true).await;
    let controller = &status["controllers"][0];
    assert_eq!(controller["axis"]["rightX"], -1.0);
    assert_eq!(controller["axis"]["rightY"], 0.75);
    assert_eq!(controller["button"]["A"], false);

    daemon.shutdown().await;
}

#[tokio::test]
async fn backend_failure_rejects_only_one_connection() {
    let daemon = start_daemon(TransportMode::Direct, None).await;
    let mut first = connect(daemon.addr, None).await;
    wait_for_status(daemon.addr, |s| controller_count(s) == 1).await;

    daemon.backend.fail_next_creates(1);
    let mut rejected = connect(daemon.addr, None).await;
    let error = next_text(&mut rejected).await.expect("error frame");
    let error: serde_json::Value = serde_json::from_str(&error).unwrap();
    assert_eq!(error["type"], "error");
    assert_eq!(next_text(&mut rejected).await, None);

    let _third = connect(daemon.addr, None).await;
    wait_for_status(daemon.addr, |s| controller_count(s) == 2).await;

    first
        .send(Message::text(r#"{"type":"button","name":"x","value":true}"#))
        .await
        .unwrap();
    let status = wait_for_status(daemon.addr, |s| s["controllers"][0]["button"]["X"] == true).await;
    assert_eq!(status["controllers"][1]["button"]["X"], false);
    assert_eq!(status["controllers"][0]["userIndex"], 0);
    assert_eq!(status["controllers"][1]["userIndex"], 1);

    daemon.shutdown().await;
}

#[tokio::test]
async fn shutdown_releases_open_controllers() {
    let daemon = start_daemon(TransportMode::Direct, None).await;
    let _a = connect(daemon.addr, None).await;
    let _b = connect(daemon.addr, None).await;
    wait_for_status(daemon.addr, |s| controller_count(s) == 2).await;

    let backend = daemon.backend.clone();
    daemon.shutdown().await;
    assert!(backend.is_shutdown());
    assert_eq!(backend.attached_count(), 0);
}

/// Peer connector that answers every offer and hands each created peer's
/// event sender to the test.
#[derive(Clone, Default)]
struct ScriptedConnector {
    peers: Arc<Mutex<Vec<mpsc::Sender<PeerEvent>>>>,
}

struct ScriptedPeer;

#[async_trait]
impl PeerNegotiation for ScriptedPeer {
    async fn apply_remote(&self, _offer: SessionDescription) -> Result<(), DaemonError> {
        Ok(())
    }

    async fn create_answer(&self) -> Result<SessionDescription, DaemonError> {
        Ok(SessionDescription::answer("v=0 scripted"))
    }

    async fn apply_local(&self, _answer: SessionDescription) -> Result<(), DaemonError> {
        Ok(())
    }

    async fn add_candidate(&self, _candidate: IceCandidate) -> Result<(), DaemonError> {
        Ok(())
    }

    async fn close(&self) {}
}

#[async_trait]
impl PeerConnector for ScriptedConnector {
    async fn create(
        &self,
    ) -> Result<(Box<dyn PeerNegotiation>, mpsc::Receiver<PeerEvent>), DaemonError> {
        let (tx, rx) = mpsc::channel(16);
        self.peers.lock().unwrap().push(tx);
        Ok((Box::new(ScriptedPeer), rx))
    }
}

impl ScriptedConnector {
    /// Open a data channel on the most recent peer.
    async fn open_channel(&self) -> RemoteEnd {
        let tx = self.peers.lock().unwrap().last().cloned().expect("no peer");
        let (conn, remote) = Connection::pair("scripted-channel");
        tx.send(PeerEvent::ChannelOpen(conn)).await.unwrap();
        remote
    }
}

#[tokio::test]
async fn signaled_data_channel_lifecycle() {
    let connector = ScriptedConnector::default();
    let daemon = start_daemon(TransportMode::Signaling, Some(connector.clone())).await;
    let mut ws = connect(daemon.addr, None).await;

    let offer = wire::encode_signal(&SignalMessage::Offer(SessionDescription::offer("v=0")))
        .unwrap();
    ws.send(Message::text(offer)).await.unwrap();
    let answer = next_text(&mut ws).await.expect("answer");
    assert_eq!(
        wire::decode_signal(&answer).unwrap(),
        SignalMessage::Answer(SessionDescription::answer("v=0 scripted"))
    );
    assert_eq!(controller_count(&get_status(daemon.addr).await), 0);

    let channel = connector.open_channel().await;
    wait_for_status(daemon.addr, |s| controller_count(s) == 1).await;

    channel
        .events
        .send(ChannelEvent::Frame(Frame::Text(
            r#"{"type":"button","name":"rb","value":true}"#.to_string(),
        )))
        .await
        .unwrap();
    wait_for_status(daemon.addr, |s| s["controllers"][0]["button"]["RB"] == true).await;

    channel.events.send(ChannelEvent::Closed).await.unwrap();
    wait_for_status(daemon.addr, |s| controller_count(s) == 0).await;

    daemon.shutdown().await;
}

#[tokio::test]
async fn malformed_signaling_closes_the_socket() {
    let daemon = start_daemon(TransportMode::Direct, Some(ScriptedConnector::default())).await;
    let mut ws = connect(daemon.addr, Some("webmote.signaling")).await;

    ws.send(Message::text(r#"{"type":"button","name":"a","value":true}"#))
        .await
        .unwrap();
    let reply = next_text(&mut ws).await.expect("error envelope");
    assert!(matches!(
        wire::decode_signal(&reply).unwrap(),
        SignalMessage::Error(_)
    ));
    assert_eq!(next_text(&mut ws).await, None);
    assert_eq!(controller_count(&get_status(daemon.addr).await), 0);

    daemon.shutdown().await;
}
