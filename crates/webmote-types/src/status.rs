//! Status report schema served by `GET /status`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::control::ButtonValue;

/// Kind of emulated controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ControllerKind {
    /// Xbox 360 compatible gamepad.
    X360,
}

/// Live view of one attached controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatus {
    pub index: u32,
    pub user_index: u32,
    pub attached: bool,
    #[serde(rename = "type")]
    pub kind: ControllerKind,
    /// Axis name (`leftX`, ...) -> last applied value.
    pub axis: BTreeMap<String, f64>,
    /// Button name (`A`, ...) -> last applied value.
    pub button: BTreeMap<String, ButtonValue>,
}

/// Top-level status document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub controllers: Vec<ControllerStatus>,
}
