//! Mock controller backend for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use webmote_types::{Axis, Button, ButtonValue, ControllerKind};

use crate::error::BackendError;
use crate::{lowest_free_slot, ControllerBackend, ControllerHandle, ControllerInfo};

/// A write recorded by the mock, for test observation.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedWrite {
    Button {
        handle: ControllerHandle,
        button: Button,
        value: ButtonValue,
    },
    Axis {
        handle: ControllerHandle,
        axis: Axis,
        value: f64,
    },
}

#[derive(Debug, Clone)]
struct MockController {
    index: u32,
    user_index: Option<u32>,
}

/// Shared state for observing what `MockBackend` did.
#[derive(Debug, Default)]
struct MockBackendState {
    controllers: BTreeMap<ControllerHandle, MockController>,
    writes: Vec<RecordedWrite>,
    releases: HashMap<ControllerHandle, u32>,
    disconnect_calls: HashMap<ControllerHandle, u32>,
    next_id: u32,
    fail_creates: u32,
    fail_connects: u32,
    fail_writes: bool,
    shutdown: bool,
}

/// Mock controller backend for testing.
pub struct MockBackend {
    state: Arc<Mutex<MockBackendState>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockBackendState::default())),
        }
    }

    /// Get a clonable handle for observing and steering the backend from tests.
    pub fn handle(&self) -> MockBackendHandle {
        MockBackendHandle {
            state: Arc::clone(&self.state),
        }
    }
}

/// Clonable observer handle for `MockBackend`.
///
/// Tests use this to inspect controllers and writes, and to inject failures.
#[derive(Clone)]
pub struct MockBackendHandle {
    state: Arc<Mutex<MockBackendState>>,
}

impl MockBackendHandle {
    /// Handles of all controllers currently held by the backend.
    pub fn controllers(&self) -> Vec<ControllerHandle> {
        self.state.lock().unwrap().controllers.keys().copied().collect()
    }

    /// Number of controllers currently attached to the host.
    pub fn attached_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .controllers
            .values()
            .filter(|c| c.user_index.is_some())
            .count()
    }

    /// Every write, in the order the backend received it.
    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.state.lock().unwrap().writes.clone()
    }

    /// How many times `disconnect` released `handle`.
    pub fn release_count(&self, handle: ControllerHandle) -> u32 {
        self.state
            .lock()
            .unwrap()
            .releases
            .get(&handle)
            .copied()
            .unwrap_or(0)
    }

    /// How many times `disconnect` was called for `handle`, known or not.
    pub fn disconnect_calls(&self, handle: ControllerHandle) -> u32 {
        self.state
            .lock()
            .unwrap()
            .disconnect_calls
            .get(&handle)
            .copied()
            .unwrap_or(0)
    }

    /// Total number of releases across all controllers.
    pub fn total_releases(&self) -> u32 {
        self.state.lock().unwrap().releases.values().sum()
    }

    /// Make the next `count` calls to `create_controller` fail.
    pub fn fail_next_creates(&self, count: u32) {
        self.state.lock().unwrap().fail_creates = count;
    }

    /// Make the next `count` calls to `connect` fail.
    pub fn fail_next_connects(&self, count: u32) {
        self.state.lock().unwrap().fail_connects = count;
    }

    /// Make every write fail while `fail` is set.
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    /// Check if shutdown was called.
    pub fn is_shutdown(&self) -> bool {
        self.state.lock().unwrap().shutdown
    }
}

impl MockBackendState {
    fn write(&mut self, write: RecordedWrite, handle: ControllerHandle) -> Result<(), BackendError> {
        if self.fail_writes {
            return Err(BackendError::Write("injected write failure".to_string()));
        }
        match self.controllers.get(&handle) {
            Some(c) if c.user_index.is_some() => {
                self.writes.push(write);
                Ok(())
            }
            _ => Err(BackendError::UnknownController(handle)),
        }
    }
}

#[async_trait]
impl ControllerBackend for MockBackend {
    async fn create_controller(&self) -> Result<ControllerHandle, BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_creates > 0 {
            state.fail_creates -= 1;
            return Err(BackendError::Create("injected create failure".to_string()));
        }
        state.next_id += 1;
        let handle = ControllerHandle(state.next_id);
        let index = state.next_id;
        state.controllers.insert(
            handle,
            MockController {
                index,
                user_index: None,
            },
        );
        Ok(handle)
    }

    async fn connect(&self, handle: ControllerHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(BackendError::Attach("injected connect failure".to_string()));
        }
        let slot = lowest_free_slot(state.controllers.values().filter_map(|c| c.user_index));
        let controller = state
            .controllers
            .get_mut(&handle)
            .ok_or(BackendError::UnknownController(handle))?;
        controller.user_index = Some(slot);
        Ok(())
    }

    async fn disconnect(&self, handle: ControllerHandle) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        *state.disconnect_calls.entry(handle).or_insert(0) += 1;
        if state.controllers.remove(&handle).is_some() {
            *state.releases.entry(handle).or_insert(0) += 1;
        }
        Ok(())
    }

    async fn set_button(
        &self,
        handle: ControllerHandle,
        button: Button,
        value: ButtonValue,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        state.write(
            RecordedWrite::Button {
                handle,
                button,
                value,
            },
            handle,
        )
    }

    async fn set_axis(
        &self,
        handle: ControllerHandle,
        axis: Axis,
        value: f64,
    ) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        state.write(
            RecordedWrite::Axis {
                handle,
                axis,
                value,
            },
            handle,
        )
    }

    fn describe(&self, handle: ControllerHandle) -> Option<ControllerInfo> {
        let state = self.state.lock().unwrap();
        state.controllers.get(&handle).map(|c| ControllerInfo {
            index: c.index,
            user_index: c.user_index.unwrap_or(0),
            attached: c.user_index.is_some(),
            kind: ControllerKind::X360,
        })
    }

    async fn shutdown(&self) -> Result<(), BackendError> {
        let mut state = self.state.lock().unwrap();
        let handles: Vec<ControllerHandle> = state.controllers.keys().copied().collect();
        for handle in handles {
            state.controllers.remove(&handle);
            *state.releases.entry(handle).or_insert(0) += 1;
        }
        state.shutdown = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_connect_write_disconnect() {
        let backend = MockBackend::new();
        let observer = backend.handle();

        let handle = backend.create_controller().await.unwrap();
        assert!(!backend.describe(handle).unwrap().attached);
        assert!(backend
            .set_button(handle, Button::A, ButtonValue::Digital(true))
            .await
            .is_err());

        backend.connect(handle).await.unwrap();
        let info = backend.describe(handle).unwrap();
        assert!(info.attached);
        assert_eq!(info.user_index, 0);

        backend
            .set_axis(handle, Axis::LeftX, 0.5)
            .await
            .unwrap();
        assert_eq!(
            observer.writes(),
            vec![RecordedWrite::Axis {
                handle,
                axis: Axis::LeftX,
                value: 0.5
            }]
        );

        backend.disconnect(handle).await.unwrap();
        backend.disconnect(handle).await.unwrap();
        assert_eq!(observer.release_count(handle), 1);
        assert_eq!(observer.disconnect_calls(handle), 2);
        assert!(backend.describe(handle).is_none());
    }

    #[tokio::test]
    async fn user_slots_are_reused() {
        let backend = MockBackend::new();
        let a = backend.create_controller().await.unwrap();
        let b = backend.create_controller().await.unwrap();
        backend.connect(a).await.unwrap();
        backend.connect(b).await.unwrap();
        assert_eq!(backend.describe(b).unwrap().user_index, 1);

        backend.disconnect(a).await.unwrap();
        let c = backend.create_controller().await.unwrap();
        backend.connect(c).await.unwrap();
        assert_eq!(backend.describe(c).unwrap().user_index, 0);
        assert_ne!(backend.describe(c).unwrap().index, 1);
    }

    #[tokio::test]
    async fn injected_failures() {
        let backend = MockBackend::new();
        let observer = backend.handle();

        observer.fail_next_creates(1);
        assert!(backend.create_controller().await.is_err());
        let handle = backend.create_controller().await.unwrap();

        observer.fail_next_connects(1);
        assert!(backend.connect(handle).await.is_err());
        backend.connect(handle).await.unwrap();

        observer.set_fail_writes(true);
        assert!(backend.set_axis(handle, Axis::RightY, 1.0).await.is_err());
        assert!(observer.writes().is_empty());

        backend.shutdown().await.unwrap();
        assert!(observer.is_shutdown());
        assert_eq!(observer.total_releases(), 1);
    }
}
