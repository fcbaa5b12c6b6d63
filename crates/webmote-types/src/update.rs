//! Decoded input updates.

use serde::{Deserialize, Serialize};

use crate::control::ButtonValue;

/// Canonical decoded input event, independent of the wire codec it came from.
///
/// Names are carried as received; they are only resolved (and possibly
/// rejected) by [`ResolvedUpdate::resolve`](crate::ResolvedUpdate::resolve).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Update {
    /// A button changed state.
    Button { name: String, pressed: ButtonValue },

    /// A stick moved. `x` and `y` are normalised to `-1.0..=1.0`.
    Axis { stick: String, x: f64, y: f64 },
}

impl Update {
    /// Convenience constructor for a digital button update.
    pub fn button(name: impl Into<String>, pressed: bool) -> Self {
        Self::Button {
            name: name.into(),
            pressed: ButtonValue::Digital(pressed),
        }
    }

    /// Convenience constructor for a stick update.
    pub fn axis(stick: impl Into<String>, x: f64, y: f64) -> Self {
        Self::Axis {
            stick: stick.into(),
            x,
            y,
        }
    }

    /// The raw control name this update targets.
    pub fn control_name(&self) -> &str {
        match self {
            Self::Button { name, .. } => name,
            Self::Axis { stick, .. } => stick,
        }
    }
}
