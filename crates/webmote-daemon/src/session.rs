//! Controller sessions: one client's claim on one virtual controller.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use webmote_input::ControllerHandle;
use webmote_types::{Axis, Button, ButtonValue, ResolvedUpdate, SessionId};

use crate::state::TransportState;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Last-applied control values, mirrored for status reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlMirror {
    pub axis: BTreeMap<String, f64>,
    pub button: BTreeMap<String, ButtonValue>,
}

impl Default for ControlMirror {
    fn default() -> Self {
        Self {
            axis: Axis::ALL
                .iter()
                .map(|a| (a.as_str().to_string(), 0.0))
                .collect(),
            button: Button::ALL
                .iter()
                .map(|b| (b.as_str().to_string(), ButtonValue::default()))
                .collect(),
        }
    }
}

impl ControlMirror {
    fn record(&mut self, update: &ResolvedUpdate) {
        match *update {
            ResolvedUpdate::Button { button, value } => {
                self.button.insert(button.as_str().to_string(), value);
            }
            ResolvedUpdate::Stick { stick, x, y } => {
                let (ax, ay) = stick.axes();
                self.axis.insert(ax.as_str().to_string(), x);
                self.axis.insert(ay.as_str().to_string(), y);
            }
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    transport: TransportState,
    mirror: ControlMirror,
}

#[derive(Debug)]
struct Shared {
    inner: Mutex<SessionInner>,
    destroyed: AtomicBool,
}

/// A session handle. Clones refer to the same session.
#[derive(Debug, Clone)]
pub struct ControllerSession {
    id: SessionId,
    handle: ControllerHandle,
    shared: Arc<Shared>,
}

impl ControllerSession {
    pub(crate) fn new(handle: ControllerHandle) -> Self {
        Self {
            id: SessionId::new(),
            handle,
            shared: Arc::new(Shared {
                inner: Mutex::new(SessionInner {
                    transport: TransportState::Connecting,
                    mirror: ControlMirror::default(),
                }),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn handle(&self) -> ControllerHandle {
        self.handle
    }

    pub fn transport_state(&self) -> TransportState {
        lock(&self.shared.inner).transport
    }

    /// Whether the session still owns its controller.
    pub fn is_live(&self) -> bool {
        self.transport_state().is_live()
    }

    /// Copy of the mirrored control values.
    pub fn mirror(&self) -> ControlMirror {
        lock(&self.shared.inner).mirror.clone()
    }

    pub fn axis(&self, name: &str) -> Option<f64> {
        lock(&self.shared.inner).mirror.axis.get(name).copied()
    }

    pub fn button(&self, name: &str) -> Option<ButtonValue> {
        lock(&self.shared.inner).mirror.button.get(name).copied()
    }

    /// Move `Connecting -> Open`. Returns whether the transition happened.
    pub(crate) fn open(&self) -> bool {
        let mut inner = lock(&self.shared.inner);
        if inner.transport.can_activate() {
            inner.transport = TransportState::Open;
            true
        } else {
            false
        }
    }

    /// Claim the one-time teardown. Only the first caller gets `true`.
    pub(crate) fn begin_destroy(&self) -> bool {
        if self.shared.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        lock(&self.shared.inner).transport = TransportState::Closed;
        true
    }

    /// Mirror an update that the backend accepted. Ignored once closed.
    pub(crate) fn record(&self, update: &ResolvedUpdate) {
        let mut inner = lock(&self.shared.inner);
        if inner.transport.is_live() {
            inner.mirror.record(update);
        }
    }

    /// Read transport state and mirror under one lock.
    pub(crate) fn view(&self) -> (TransportState, ControlMirror) {
        let inner = lock(&self.shared.inner);
        (inner.transport, inner.mirror.clone())
    }
}
