//! Mapping from webmote controls to evdev codes.
//!
//! Button codes follow the kernel's xpad driver so that games see the same
//! layout as a wired Xbox 360 pad.

use evdev::{AbsInfo, AbsoluteAxisCode, KeyCode as EvdevKey, UinputAbsSetup};
use webmote_types::{Axis, Button, ButtonValue};

/// Stick range reported to the host.
pub const STICK_MIN: i32 = -32768;
pub const STICK_MAX: i32 = 32767;
/// Trigger range reported to the host.
pub const TRIGGER_MAX: i32 = 255;

/// Where a button's value lands on the virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonTarget {
    Key(EvdevKey),
    /// Triggers are analog axes on xpad.
    Trigger(AbsoluteAxisCode),
}

pub fn button_target(button: Button) -> ButtonTarget {
    match button {
        Button::A => ButtonTarget::Key(EvdevKey::BTN_SOUTH),
        Button::B => ButtonTarget::Key(EvdevKey::BTN_EAST),
        Button::X => ButtonTarget::Key(EvdevKey::BTN_NORTH),
        Button::Y => ButtonTarget::Key(EvdevKey::BTN_WEST),
        Button::LB => ButtonTarget::Key(EvdevKey::BTN_TL),
        Button::RB => ButtonTarget::Key(EvdevKey::BTN_TR),
        Button::LT => ButtonTarget::Trigger(AbsoluteAxisCode::ABS_Z),
        Button::RT => ButtonTarget::Trigger(AbsoluteAxisCode::ABS_RZ),
        Button::Back => ButtonTarget::Key(EvdevKey::BTN_SELECT),
        Button::Start => ButtonTarget::Key(EvdevKey::BTN_START),
        Button::LS => ButtonTarget::Key(EvdevKey::BTN_THUMBL),
        Button::RS => ButtonTarget::Key(EvdevKey::BTN_THUMBR),
        Button::Up => ButtonTarget::Key(EvdevKey::BTN_DPAD_UP),
        Button::Down => ButtonTarget::Key(EvdevKey::BTN_DPAD_DOWN),
        Button::Left => ButtonTarget::Key(EvdevKey::BTN_DPAD_LEFT),
        Button::Right => ButtonTarget::Key(EvdevKey::BTN_DPAD_RIGHT),
        Button::Guide => ButtonTarget::Key(EvdevKey::BTN_MODE),
    }
}

pub fn axis_code(axis: Axis) -> AbsoluteAxisCode {
    match axis {
        Axis::LeftX => AbsoluteAxisCode::ABS_X,
        Axis::LeftY => AbsoluteAxisCode::ABS_Y,
        Axis::RightX => AbsoluteAxisCode::ABS_RX,
        Axis::RightY => AbsoluteAxisCode::ABS_RY,
    }
}

/// Convert a button value to the evdev value for its target.
pub fn button_value(target: ButtonTarget, value: ButtonValue) -> i32 {
    match target {
        ButtonTarget::Key(_) => i32::from(value.is_pressed()),
        #[allow(clippy::cast_possible_truncation)]
        ButtonTarget::Trigger(_) => (value.level() * f64::from(TRIGGER_MAX)).round() as i32,
    }
}

/// Scale a stick value in `-1.0..=1.0` to the device range.
#[allow(clippy::cast_possible_truncation)]
pub fn stick_value(value: f64) -> i32 {
    let scaled = (value.clamp(-1.0, 1.0) * f64::from(STICK_MAX)).round() as i32;
    scaled.clamp(STICK_MIN, STICK_MAX)
}

/// Every key the virtual pad advertises.
pub fn keys() -> impl Iterator<Item = EvdevKey> {
    Button::ALL.iter().filter_map(|b| match button_target(*b) {
        ButtonTarget::Key(key) => Some(key),
        ButtonTarget::Trigger(_) => None,
    })
}

/// Absolute axis setups for the sticks and triggers.
pub fn abs_setups() -> Vec<UinputAbsSetup> {
    let mut setups: Vec<UinputAbsSetup> = Axis::ALL
        .iter()
        .map(|a| UinputAbsSetup::new(axis_code(*a), AbsInfo::new(0, STICK_MIN, STICK_MAX, 16, 128, 0)))
        .collect();
    for trigger in [AbsoluteAxisCode::ABS_Z, AbsoluteAxisCode::ABS_RZ] {
        setups.push(UinputAbsSetup::new(trigger, AbsInfo::new(0, 0, TRIGGER_MAX, 0, 0, 0)));
    }
    setups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_button_has_a_distinct_target() {
        let mut seen = Vec::new();
        for button in Button::ALL {
            let target = button_target(button);
            assert!(!seen.contains(&target), "{button} collides");
            seen.push(target);
        }
        assert_eq!(keys().count(), Button::ALL.len() - 2);
    }

    #[test]
    fn triggers_are_axes() {
        assert_eq!(
            button_target(Button::LT),
            ButtonTarget::Trigger(AbsoluteAxisCode::ABS_Z)
        );
        let target = button_target(Button::RT);
        assert_eq!(button_value(target, ButtonValue::Analog(1.0)), TRIGGER_MAX);
        assert_eq!(button_value(target, ButtonValue::Analog(0.5)), 128);
        assert_eq!(button_value(target, ButtonValue::Digital(true)), TRIGGER_MAX);
    }

    #[test]
    fn key_values_threshold_analog_input() {
        let target = button_target(Button::A);
        assert_eq!(button_value(target, ButtonValue::Digital(true)), 1);
        assert_eq!(button_value(target, ButtonValue::Analog(0.2)), 0);
        assert_eq!(button_value(target, ButtonValue::Analog(0.9)), 1);
    }

    #[test]
    fn stick_scaling() {
        assert_eq!(stick_value(0.0), 0);
        assert_eq!(stick_value(1.0), STICK_MAX);
        assert_eq!(stick_value(-1.0), -STICK_MAX);
        assert_eq!(stick_value(4.0), STICK_MAX);
        assert_eq!(stick_value(0.5), 16384);
    }
}
