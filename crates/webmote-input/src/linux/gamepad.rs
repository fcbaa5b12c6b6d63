//! uinput-based virtual gamepads.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use evdev::uinput::VirtualDevice;
use evdev::{AttributeSet, BusType, EventType, InputId, KeyCode as EvdevKey};
use tracing::{debug, info, warn};
use webmote_types::{Axis, Button, ButtonValue, ControllerKind};

use super::keymap::{self, ButtonTarget};
use crate::error::BackendError;
use crate::{lowest_free_slot, ControllerBackend, ControllerHandle, ControllerInfo};

const UINPUT_PATH: &str = "/dev/uinput";

/// Microsoft Xbox 360 wired controller.
const VENDOR_ID: u16 = 0x045e;
const PRODUCT_ID: u16 = 0x028e;
const VERSION: u16 = 0x0114;

struct Slot {
    index: u32,
    user_index: Option<u32>,
    device: Option<VirtualDevice>,
}

#[derive(Default)]
struct Table {
    slots: BTreeMap<ControllerHandle, Slot>,
    next_id: u32,
}

impl Table {
    fn allocate(&mut self) -> ControllerHandle {
        self.next_id += 1;
        let handle = ControllerHandle(self.next_id);
        self.slots.insert(
            handle,
            Slot {
                index: self.next_id,
                user_index: None,
                device: None,
            },
        );
        handle
    }

    /// Claim the lowest free user slot for `handle` before its device exists.
    fn reserve(&mut self, handle: ControllerHandle) -> Result<u32, BackendError> {
        if let Some(user_index) = self.slots.get(&handle).and_then(|s| s.user_index) {
            return Ok(user_index);
        }
        let user_index = lowest_free_slot(self.slots.values().filter_map(|s| s.user_index));
        let slot = self
            .slots
            .get_mut(&handle)
            .ok_or(BackendError::UnknownController(handle))?;
        slot.user_index = Some(user_index);
        Ok(user_index)
    }

    fn unreserve(&mut self, handle: ControllerHandle) {
        if let Some(slot) = self.slots.get_mut(&handle) {
            if slot.device.is_none() {
                slot.user_index = None;
            }
        }
    }
}

fn build_device(name: &str) -> Result<VirtualDevice, BackendError> {
    let mut keys = AttributeSet::<EvdevKey>::new();
    for key in keymap::keys() {
        keys.insert(key);
    }

    let mut builder = VirtualDevice::builder()
        .map_err(|e| BackendError::Attach(e.to_string()))?
        .name(name)
        .input_id(InputId::new(BusType::BUS_USB, VENDOR_ID, PRODUCT_ID, VERSION))
        .with_keys(&keys)
        .map_err(|e| BackendError::Attach(e.to_string()))?;
    for setup in keymap::abs_setups() {
        builder = builder
            .with_absolute_axis(&setup)
            .map_err(|e| BackendError::Attach(e.to_string()))?;
    }
    builder
        .build()
        .map_err(|e| BackendError::Attach(e.to_string()))
}

/// Linux controller backend using uinput virtual devices.
///
/// Each connected controller is its own `VirtualDevice`; dropping the device
/// unplugs it from the host.
pub struct UinputBackend {
    device_name: String,
    table: Mutex<Table>,
}

impl UinputBackend {
    /// Open the backend, checking that uinput is reachable.
    pub fn connect(device_name: impl Into<String>) -> Result<Self, BackendError> {
        OpenOptions::new()
            .write(true)
            .open(UINPUT_PATH)
            .map_err(|e| BackendError::ClientConnect(format!("{UINPUT_PATH}: {e}")))?;
        let device_name = device_name.into();
        info!(name = %device_name, "uinput backend ready");
        Ok(Self {
            device_name,
            table: Mutex::new(Table::default()),
        })
    }

    fn table(&self) -> Result<MutexGuard<'_, Table>, BackendError> {
        self.table
            .lock()
            .map_err(|_| BackendError::Other(anyhow::anyhow!("controller table poisoned")))
    }

    fn emit(
        &self,
        handle: ControllerHandle,
        events: &[evdev::InputEvent],
    ) -> Result<(), BackendError> {
        let mut table = self.table()?;
        let device = table
            .slots
            .get_mut(&handle)
            .and_then(|s| s.device.as_mut())
            .ok_or(BackendError::UnknownController(handle))?;
        device
            .emit(events)
            .map_err(|e| BackendError::Write(e.to_string()))
    }
}

#[async_trait]
impl ControllerBackend for UinputBackend {
    async fn create_controller(&self) -> Result<ControllerHandle, BackendError> {
        let handle = self.table()?.allocate();
        debug!(%handle, "allocated controller");
        Ok(handle)
    }

    async fn connect(&self, handle: ControllerHandle) -> Result<(), BackendError> {
        let user_index = self.table()?.reserve(handle)?;

        // uinput setup is a series of blocking ioctls; keep it off the table lock.
        let name = format!("{} {}", self.device_name, user_index + 1);
        let built = tokio::task::spawn_blocking(move || build_device(&name))
            .await
            .map_err(|e| BackendError::Attach(e.to_string()))
            .and_then(|result| result);

        let mut table = self.table()?;
        let device = match built {
            Ok(device) => device,
            Err(e) => {
                table.unreserve(handle);
                return Err(e);
            }
        };
        let slot = table
            .slots
            .get_mut(&handle)
            .ok_or(BackendError::UnknownController(handle))?;
        slot.device = Some(device);
        info!(%handle, user_index, "plugged in virtual gamepad");
        Ok(())
    }

    async fn disconnect(&self, handle: ControllerHandle) -> Result<(), BackendError> {
        let mut table = self.table()?;
        if let Some(slot) = table.slots.remove(&handle) {
            info!(%handle, attached = slot.device.is_some(), "unplugged virtual gamepad");
        }
        Ok(())
    }

    async fn set_button(
        &self,
        handle: ControllerHandle,
        button: Button,
        value: ButtonValue,
    ) -> Result<(), BackendError> {
        let target = keymap::button_target(button);
        let level = keymap::button_value(target, value);
        let event = match target {
            ButtonTarget::Key(key) => evdev::InputEvent::new(EventType::KEY.0, key.0, level),
            ButtonTarget::Trigger(abs) => {
                evdev::InputEvent::new(EventType::ABSOLUTE.0, abs.0, level)
            }
        };
        self.emit(handle, &[event])
    }

    async fn set_axis(
        &self,
        handle: ControllerHandle,
        axis: Axis,
        value: f64,
    ) -> Result<(), BackendError> {
        let code = keymap::axis_code(axis);
        let event =
            evdev::InputEvent::new(EventType::ABSOLUTE.0, code.0, keymap::stick_value(value));
        self.emit(handle, &[event])
    }

    fn describe(&self, handle: ControllerHandle) -> Option<ControllerInfo> {
        let table = self.table().ok()?;
        table.slots.get(&handle).map(|s| ControllerInfo {
            index: s.index,
            user_index: s.user_index.unwrap_or(0),
            attached: s.device.is_some(),
            kind: ControllerKind::X360,
        })
    }

    async fn shutdown(&self) -> Result<(), BackendError> {
        let mut table = self.table()?;
        let count = table.slots.len();
        table.slots.clear();
        if count > 0 {
            warn!(count, "released controllers still held at shutdown");
        }
        info!("shut down uinput backend");
        Ok(())
    }
}
