//! Core daemon for webmote.
//!
//! Owns the controller session registry, dispatches decoded updates to the
//! controller backend, negotiates client transports (direct WebSocket or
//! signaled WebRTC data channel), and serves the HTTP surface.

pub mod config;
pub mod daemon;
pub mod dispatch;
pub mod error;
pub mod negotiator;
pub mod peer;
pub mod registry;
pub mod rtc;
pub mod server;
pub mod session;
pub mod setup;
pub mod state;
pub mod status;

pub use config::Config;
pub use daemon::{Daemon, DaemonEvent};
pub use dispatch::Dispatcher;
pub use error::DaemonError;
pub use negotiator::Negotiator;
pub use registry::SessionRegistry;
pub use session::ControllerSession;
