//! Virtual game-controller backends for webmote.
//!
//! This crate defines the [`ControllerBackend`] trait that emulation
//! backends implement. The uinput backend (Linux, feature `linux`) creates
//! real virtual gamepads; the mock backend (feature `mock`) records every
//! call for tests.

use async_trait::async_trait;
use webmote_types::{Axis, Button, ButtonValue, ControllerKind};

pub mod error;
#[cfg(feature = "linux")]
pub mod linux;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::BackendError;

/// Opaque handle to one controller instance owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControllerHandle(pub u32);

impl std::fmt::Display for ControllerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Backend-reported facts about a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerInfo {
    /// Backend-assigned index, stable for the controller's lifetime.
    pub index: u32,
    /// Player slot (0-based) the host assigned, if attached.
    pub user_index: u32,
    /// Whether the controller is currently plugged into the host.
    pub attached: bool,
    pub kind: ControllerKind,
}

/// Creates virtual controllers and writes their state.
///
/// A backend value is the process-wide client connection: it is created once
/// at startup and shared by every session. Implementations use interior
/// mutability so that sessions on different tasks can drive their own
/// controllers concurrently.
#[async_trait]
pub trait ControllerBackend: Send + Sync + 'static {
    /// Allocate a new controller. It is not visible to the host until
    /// [`connect`](Self::connect) succeeds.
    async fn create_controller(&self) -> Result<ControllerHandle, BackendError>;

    /// Plug the controller into the host.
    async fn connect(&self, handle: ControllerHandle) -> Result<(), BackendError>;

    /// Unplug the controller and release the handle. Unknown handles are ignored.
    async fn disconnect(&self, handle: ControllerHandle) -> Result<(), BackendError>;

    /// Set a button's value.
    async fn set_button(
        &self,
        handle: ControllerHandle,
        button: Button,
        value: ButtonValue,
    ) -> Result<(), BackendError>;

    /// Set an axis value in `-1.0..=1.0`.
    async fn set_axis(
        &self,
        handle: ControllerHandle,
        axis: Axis,
        value: f64,
    ) -> Result<(), BackendError>;

    /// Read the backend's view of a controller.
    fn describe(&self, handle: ControllerHandle) -> Option<ControllerInfo>;

    /// Release every controller still held.
    async fn shutdown(&self) -> Result<(), BackendError>;
}

/// Lowest player slot not present in `used`.
#[cfg(any(test, feature = "mock", feature = "linux"))]
pub(crate) fn lowest_free_slot(used: impl IntoIterator<Item = u32>) -> u32 {
    let mut used: Vec<u32> = used.into_iter().collect();
    used.sort_unstable();
    let mut slot = 0;
    for u in used {
        if u == slot {
            slot += 1;
        } else if u > slot {
            break;
        }
    }
    slot
}
