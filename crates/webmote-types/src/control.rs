//! Controller buttons, sticks and axes.
//!
//! Control names arriving from clients are resolved through explicit lookup
//! tables. Anything outside these tables is an [`UnknownControl`] and must
//! never reach a controller backend.

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::update::Update;

/// A digital or analog button on the emulated gamepad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Button {
    A,
    B,
    X,
    Y,
    LB,
    RB,
    LT,
    RT,
    Back,
    Start,
    LS,
    RS,
    Up,
    Down,
    Left,
    Right,
    Guide,
}

/// Canonical (upper-case) name of every button, in report order.
const BUTTON_TABLE: [(&str, Button); 17] = [
    ("A", Button::A),
    ("B", Button::B),
    ("X", Button::X),
    ("Y", Button::Y),
    ("LB", Button::LB),
    ("RB", Button::RB),
    ("LT", Button::LT),
    ("RT", Button::RT),
    ("BACK", Button::Back),
    ("START", Button::Start),
    ("LS", Button::LS),
    ("RS", Button::RS),
    ("UP", Button::Up),
    ("DOWN", Button::Down),
    ("LEFT", Button::Left),
    ("RIGHT", Button::Right),
    ("GUIDE", Button::Guide),
];

impl Button {
    /// Every button, in canonical order.
    pub const ALL: [Button; 17] = [
        Button::A,
        Button::B,
        Button::X,
        Button::Y,
        Button::LB,
        Button::RB,
        Button::LT,
        Button::RT,
        Button::Back,
        Button::Start,
        Button::LS,
        Button::RS,
        Button::Up,
        Button::Down,
        Button::Left,
        Button::Right,
        Button::Guide,
    ];

    /// Look up a button by name. Matching is case-insensitive.
    pub fn lookup(name: &str) -> Option<Self> {
        BUTTON_TABLE
            .iter()
            .find(|(canonical, _)| canonical.eq_ignore_ascii_case(name))
            .map(|(_, button)| *button)
    }

    /// Canonical upper-case name.
    pub fn as_str(self) -> &'static str {
        BUTTON_TABLE
            .iter()
            .find(|(_, button)| *button == self)
            .map_or("?", |(canonical, _)| canonical)
    }
}

impl std::fmt::Display for Button {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value carried by a button update: pressed/released, or an analog level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
#[serde(untagged)]
pub enum ButtonValue {
    Digital(bool),
    Analog(f64),
}

impl ButtonValue {
    /// Analog level in `0.0..=1.0`.
    pub fn level(self) -> f64 {
        match self {
            Self::Digital(true) => 1.0,
            Self::Digital(false) => 0.0,
            Self::Analog(v) => v.clamp(0.0, 1.0),
        }
    }

    /// Whether the button counts as held down.
    pub fn is_pressed(self) -> bool {
        self.level() >= 0.5
    }

    /// Clamp analog values into `0.0..=1.0`.
    #[must_use]
    pub fn clamped(self) -> Self {
        match self {
            Self::Digital(b) => Self::Digital(b),
            Self::Analog(v) => Self::Analog(v.clamp(0.0, 1.0)),
        }
    }
}

impl Default for ButtonValue {
    fn default() -> Self {
        Self::Digital(false)
    }
}

/// An analog stick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stick {
    Left,
    Right,
}

impl Stick {
    /// Look up a stick by name. Only `left` and `right` are accepted.
    pub fn lookup(name: &str) -> Option<Self> {
        match name {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            _ => None,
        }
    }

    /// The X and Y axes driven by this stick.
    pub fn axes(self) -> (Axis, Axis) {
        match self {
            Self::Left => (Axis::LeftX, Axis::LeftY),
            Self::Right => (Axis::RightX, Axis::RightY),
        }
    }
}

/// A single analog axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Axis {
    LeftX,
    LeftY,
    RightX,
    RightY,
}

impl Axis {
    /// Every axis, in canonical order.
    pub const ALL: [Axis; 4] = [Axis::LeftX, Axis::LeftY, Axis::RightX, Axis::RightY];

    /// Report name (`leftX`, `leftY`, `rightX`, `rightY`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LeftX => "leftX",
            Self::LeftY => "leftY",
            Self::RightX => "rightX",
            Self::RightY => "rightY",
        }
    }
}

impl std::fmt::Display for Axis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An update whose control names have been resolved against the lookup tables.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedUpdate {
    Button { button: Button, value: ButtonValue },
    Stick { stick: Stick, x: f64, y: f64 },
}

/// A control name that is not part of the recognised set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnknownControl {
    #[error("unknown button {0:?}")]
    Button(String),

    #[error("unknown stick {0:?}")]
    Stick(String),
}

impl ResolvedUpdate {
    /// Resolve the names in `update`, clamping values to their nominal ranges.
    pub fn resolve(update: &Update) -> Result<Self, UnknownControl> {
        match update {
            Update::Button { name, pressed } => {
                let button =
                    Button::lookup(name).ok_or_else(|| UnknownControl::Button(name.clone()))?;
                Ok(Self::Button {
                    button,
                    value: pressed.clamped(),
                })
            }
            Update::Axis { stick, x, y } => {
                let resolved =
                    Stick::lookup(stick).ok_or_else(|| UnknownControl::Stick(stick.clone()))?;
                Ok(Self::Stick {
                    stick: resolved,
                    x: x.clamp(-1.0, 1.0),
                    y: y.clamp(-1.0, 1.0),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_lookup_is_case_insensitive() {
        assert_eq!(Button::lookup("a"), Some(Button::A));
        assert_eq!(Button::lookup("Start"), Some(Button::Start));
        assert_eq!(Button::lookup("guide"), Some(Button::Guide));
        assert_eq!(Button::lookup("lt"), Some(Button::LT));
        assert_eq!(Button::lookup("Z"), None);
        assert_eq!(Button::lookup(""), None);
    }

    #[test]
    fn button_names_are_canonical_upper_case() {
        for button in Button::ALL {
            let name = button.as_str();
            assert_eq!(name, name.to_ascii_uppercase());
            assert_eq!(Button::lookup(name), Some(button));
        }
    }

    #[test]
    fn stick_lookup_only_accepts_left_and_right() {
        assert_eq!(Stick::lookup("left"), Some(Stick::Left));
        assert_eq!(Stick::lookup("right"), Some(Stick::Right));
        assert_eq!(Stick::lookup("center"), None);
        assert_eq!(Stick::lookup("leftX"), None);
    }

    #[test]
    fn stick_axes() {
        assert_eq!(Stick::Left.axes(), (Axis::LeftX, Axis::LeftY));
        assert_eq!(Stick::Right.axes(), (Axis::RightX, Axis::RightY));
        assert_eq!(Axis::RightY.to_string(), "rightY");
    }

    #[test]
    fn resolve_clamps_values() {
        let update = Update::Axis {
            stick: "left".to_string(),
            x: 3.0,
            y: -0.25,
        };
        assert_eq!(
            ResolvedUpdate::resolve(&update).unwrap(),
            ResolvedUpdate::Stick {
                stick: Stick::Left,
                x: 1.0,
                y: -0.25
            }
        );

        let update = Update::Button {
            name: "rt".to_string(),
            pressed: ButtonValue::Analog(1.5),
        };
        assert_eq!(
            ResolvedUpdate::resolve(&update).unwrap(),
            ResolvedUpdate::Button {
                button: Button::RT,
                value: ButtonValue::Analog(1.0)
            }
        );
    }

    #[test]
    fn resolve_rejects_unknown_names() {
        let update = Update::Axis {
            stick: "center".to_string(),
            x: 1.0,
            y: 1.0,
        };
        assert_eq!(
            ResolvedUpdate::resolve(&update),
            Err(UnknownControl::Stick("center".to_string()))
        );

        let update = Update::Button {
            name: "turbo".to_string(),
            pressed: ButtonValue::Digital(true),
        };
        assert!(matches!(
            ResolvedUpdate::resolve(&update),
            Err(UnknownControl::Button(_))
        ));
    }

    #[test]
    fn button_value_json_is_untagged() {
        assert_eq!(
            serde_json::to_string(&ButtonValue::Digital(true)).unwrap(),
            "true"
        );
        assert_eq!(
            serde_json::to_string(&ButtonValue::Analog(0.5)).unwrap(),
            "0.5"
        );
        let v: ButtonValue = serde_json::from_str("0.25").unwrap();
        assert_eq!(v, ButtonValue::Analog(0.25));
        assert!(!v.is_pressed());
        assert!(ButtonValue::Digital(true).is_pressed());
    }
}
