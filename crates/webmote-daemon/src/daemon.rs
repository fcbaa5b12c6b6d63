//! Core daemon orchestration.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;
use webmote_input::ControllerBackend;

use crate::config::Config;
use crate::error::DaemonError;
use crate::negotiator::Negotiator;
use crate::peer::PeerConnector;
use crate::registry::SessionRegistry;
use crate::rtc::WebRtcConnector;
use crate::server::{build_router, AppState};

/// Events processed by the daemon's main loop.
#[derive(Debug)]
pub enum DaemonEvent {
    /// Stop accepting connections and release every controller.
    Shutdown,
}

/// The webmote daemon.
pub struct Daemon {
    config: Config,
    backend: Arc<dyn ControllerBackend>,
    registry: Arc<SessionRegistry>,
    connector: Arc<dyn PeerConnector>,
    event_tx: mpsc::Sender<DaemonEvent>,
    event_rx: mpsc::Receiver<DaemonEvent>,
}

impl Daemon {
    /// Create a new daemon around an already-open backend.
    pub fn new(config: Config, backend: Arc<dyn ControllerBackend>) -> Self {
        let connector = Arc::new(WebRtcConnector::new(config.signaling.ice_servers.clone()));
        let registry = Arc::new(SessionRegistry::new(Arc::clone(&backend)));
        let (event_tx, event_rx) = mpsc::channel(16);
        Self {
            config,
            backend,
            registry,
            connector,
            event_tx,
            event_rx,
        }
    }

    /// Replace the peer connector used for signaled connections.
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn PeerConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Get a clone of the event sender for feeding events into the daemon.
    pub fn event_sender(&self) -> mpsc::Sender<DaemonEvent> {
        self.event_tx.clone()
    }

    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Bind the configured listen address.
    pub async fn bind(&self) -> Result<TcpListener, DaemonError> {
        let server = &self.config.server;
        TcpListener::bind((server.bind.as_str(), server.port))
            .await
            .map_err(|e| {
                DaemonError::Startup(format!("failed to bind {}:{}: {e}", server.bind, server.port))
            })
    }

    /// Bind and serve until shutdown.
    pub async fn run(self) -> Result<(), DaemonError> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already-bound listener until a shutdown event or Ctrl-C.
    pub async fn serve(self, listener: TcpListener) -> Result<(), DaemonError> {
        let Self {
            config,
            backend,
            registry,
            connector,
            event_tx: _event_tx,
            event_rx: mut events,
        } = self;

        let addr = listener
            .local_addr()
            .map_err(|e| DaemonError::Startup(format!("listener has no address: {e}")))?;
        let negotiator = Arc::new(Negotiator::new(
            Arc::clone(&registry),
            connector,
            config.signaling.negotiation_timeout(),
        ));
        let app = build_router(AppState {
            negotiator,
            transport: config.server.transport,
        });
        info!(%addr, transport = ?config.server.transport, "daemon listening");

        let shutdown = async move {
            tokio::select! {
                event = events.recv() => info!(?event, "shutting down"),
                _ = tokio::signal::ctrl_c() => info!("interrupted, shutting down"),
            }
        };
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| DaemonError::Other(e.into()))?;

        registry.close_all().await;
        backend.shutdown().await?;
        info!("daemon stopped");
        Ok(())
    }
}
