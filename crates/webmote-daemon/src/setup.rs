//! Config loading and backend construction.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use webmote_input::ControllerBackend;

use crate::config::{BackendConfig, BackendKind, Config};
use crate::error::DaemonError;

/// Load configuration from the given path, or the default location.
///
/// A missing file yields the defaults; an unreadable or invalid one is an error.
pub fn load_config(path: Option<&str>) -> Result<Config, DaemonError> {
    let config_path = match path {
        Some(p) => PathBuf::from(p),
        None => default_config_path(),
    };

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| DaemonError::Config(format!("failed to read config: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| DaemonError::Config(format!("failed to parse config: {e}")))?;
        info!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        info!("no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Get the default config directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("webmote")
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Open the process-wide controller backend.
///
/// Failure here is fatal: without a backend no client can be served.
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn ControllerBackend>, DaemonError> {
    match config.kind {
        BackendKind::Uinput => open_uinput(config),
        BackendKind::Mock => open_mock(),
    }
}

#[cfg(feature = "linux")]
fn open_uinput(config: &BackendConfig) -> Result<Arc<dyn ControllerBackend>, DaemonError> {
    let backend = webmote_input::linux::UinputBackend::connect(config.device_name.clone())
        .map_err(|e| DaemonError::Startup(e.to_string()))?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "linux"))]
fn open_uinput(_config: &BackendConfig) -> Result<Arc<dyn ControllerBackend>, DaemonError> {
    Err(DaemonError::Startup(
        "uinput backend not compiled in (enable the `linux` feature)".to_string(),
    ))
}

#[cfg(any(test, feature = "mock"))]
fn open_mock() -> Result<Arc<dyn ControllerBackend>, DaemonError> {
    info!("using mock controller backend");
    Ok(Arc::new(webmote_input::mock::MockBackend::new()))
}

#[cfg(not(any(test, feature = "mock")))]
fn open_mock() -> Result<Arc<dyn ControllerBackend>, DaemonError> {
    Err(DaemonError::Startup(
        "mock backend not compiled in (enable the `mock` feature)".to_string(),
    ))
}
