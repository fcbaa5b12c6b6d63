//! Linux backend: virtual Xbox 360 pads over uinput.

mod gamepad;
pub mod keymap;

pub use gamepad::UinputBackend;
