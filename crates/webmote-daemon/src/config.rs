//! Daemon configuration loaded from TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub signaling: SignalingConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

/// How `/ws` clients reach their controller when they name no sub-protocol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Updates flow over the WebSocket itself.
    #[default]
    Direct,
    /// The WebSocket carries signaling for a WebRTC data channel.
    Signaling,
}

impl std::str::FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" => Ok(Self::Direct),
            "signaling" => Ok(Self::Signaling),
            other => Err(format!("unknown transport {other:?} (expected direct or signaling)")),
        }
    }
}

/// HTTP listener and runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub transport: TransportMode,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            transport: TransportMode::default(),
            log_level: default_log_level(),
        }
    }
}

/// Peer-to-peer negotiation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingConfig {
    #[serde(default = "default_ice_servers")]
    pub ice_servers: Vec<String>,
    /// Seconds a negotiation may stay unestablished. `0` disables the limit.
    #[serde(default = "default_negotiation_timeout")]
    pub negotiation_timeout_secs: u64,
}

impl SignalingConfig {
    pub fn negotiation_timeout(&self) -> Option<Duration> {
        (self.negotiation_timeout_secs > 0)
            .then(|| Duration::from_secs(self.negotiation_timeout_secs))
    }
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            negotiation_timeout_secs: default_negotiation_timeout(),
        }
    }
}

/// Which controller backend to drive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Virtual gamepads over Linux uinput.
    #[default]
    Uinput,
    /// In-memory backend that only records writes.
    Mock,
}

/// Controller backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            device_name: default_device_name(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ice_servers() -> Vec<String> {
    vec!["stun:stun.l.google.com:19302".to_string()]
}

fn default_negotiation_timeout() -> u64 {
    30
}

fn default_device_name() -> String {
    "webmote virtual gamepad".to_string()
}
