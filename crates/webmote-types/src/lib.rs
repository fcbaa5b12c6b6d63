//! Shared types for webmote.
//!
//! This crate contains all types shared across the webmote workspace:
//! the closed set of controller buttons and axes, decoded input updates,
//! session identity, signaling envelopes, and the status report schema.

pub mod control;
pub mod session;
pub mod signaling;
pub mod status;
pub mod update;

pub use control::{Axis, Button, ButtonValue, ResolvedUpdate, Stick, UnknownControl};
pub use session::SessionId;
pub use signaling::{IceCandidate, SdpKind, SessionDescription, SignalMessage};
pub use status::{ControllerKind, ControllerStatus, StatusReport};
pub use update::Update;
