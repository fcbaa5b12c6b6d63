//! Wire formats.
//!
//! Update frames come in two flavours:
//!
//! - legacy JSON text: `{"type":"button","name":"a","value":true}` or
//!   `{"type":"axis","name":"left","value":[0.5,-0.3]}`
//! - binary: a bincode v2 (standard config) encoded [`UpdateFrame`]
//!
//! Signaling envelopes are always JSON text, see [`SignalMessage`].

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use webmote_types::{ButtonValue, SignalMessage, Update};

use crate::error::ProtocolError;

/// Maximum accepted frame size (64 KiB). Input updates are tiny.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Binary update frame.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum UpdateFrame {
    Button { name: String, pressed: ButtonValue },
    Axis { name: String, x: f64, y: f64 },
}

impl From<UpdateFrame> for Update {
    fn from(frame: UpdateFrame) -> Self {
        match frame {
            UpdateFrame::Button { name, pressed } => Update::Button { name, pressed },
            UpdateFrame::Axis { name, x, y } => Update::Axis { stick: name, x, y },
        }
    }
}

impl From<&Update> for UpdateFrame {
    fn from(update: &Update) -> Self {
        match update {
            Update::Button { name, pressed } => UpdateFrame::Button {
                name: name.clone(),
                pressed: *pressed,
            },
            Update::Axis { stick, x, y } => UpdateFrame::Axis {
                name: stick.clone(),
                x: *x,
                y: *y,
            },
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum LegacyMessage {
    Button { name: String, value: ButtonValue },
    Axis { name: String, value: (f64, f64) },
}

fn check_size(len: usize) -> Result<(), ProtocolError> {
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::TooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }
    Ok(())
}

fn check_finite(update: &Update) -> Result<(), ProtocolError> {
    let finite = match update {
        Update::Button { pressed, .. } => match pressed {
            ButtonValue::Digital(_) => true,
            ButtonValue::Analog(v) => v.is_finite(),
        },
        Update::Axis { x, y, .. } => x.is_finite() && y.is_finite(),
    };
    if finite {
        Ok(())
    } else {
        Err(ProtocolError::Malformed(format!(
            "non-finite value for {:?}",
            update.control_name()
        )))
    }
}

/// Decode a legacy JSON text update.
pub fn decode_json(text: &str) -> Result<Update, ProtocolError> {
    check_size(text.len())?;
    let msg: LegacyMessage =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let update = match msg {
        LegacyMessage::Button { name, value } => Update::Button {
            name,
            pressed: value,
        },
        LegacyMessage::Axis {
            name,
            value: (x, y),
        } => Update::Axis { stick: name, x, y },
    };
    check_finite(&update)?;
    Ok(update)
}

/// Decode a binary update frame.
pub fn decode_binary(payload: &[u8]) -> Result<Update, ProtocolError> {
    check_size(payload.len())?;
    let config = bincode::config::standard().with_limit::<MAX_MESSAGE_SIZE>();
    let (frame, read): (UpdateFrame, usize) = bincode::decode_from_slice(payload, config)
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    if read != payload.len() {
        return Err(ProtocolError::Malformed(format!(
            "{} trailing bytes after update frame",
            payload.len() - read
        )));
    }
    let update = Update::from(frame);
    check_finite(&update)?;
    Ok(update)
}

/// Encode an update as a binary frame.
pub fn encode_binary(update: &Update) -> Result<Vec<u8>, ProtocolError> {
    let config = bincode::config::standard();
    bincode::encode_to_vec(UpdateFrame::from(update), config)
        .map_err(|e| ProtocolError::Serialization(e.to_string()))
}

/// Decode a signaling envelope.
pub fn decode_signal(text: &str) -> Result<SignalMessage, ProtocolError> {
    check_size(text.len())?;
    serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Encode a signaling envelope.
pub fn encode_signal(msg: &SignalMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))
}

/// Error frame sent to a direct-socket client whose connection is rejected.
pub fn encode_error(message: &str) -> String {
    serde_json::json!({ "type": "error", "message": message }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_button_frame() {
        let update = decode_json(r#"{"type":"button","name":"a","value":true}"#).unwrap();
        assert_eq!(update, Update::button("a", true));

        let update = decode_json(r#"{"type":"button","name":"LT","value":0.75}"#).unwrap();
        assert_eq!(
            update,
            Update::Button {
                name: "LT".to_string(),
                pressed: ButtonValue::Analog(0.75)
            }
        );
    }

    #[test]
    fn legacy_axis_frame() {
        let update = decode_json(r#"{"type":"axis","name":"left","value":[0.5,-0.3]}"#).unwrap();
        assert_eq!(update, Update::axis("left", 0.5, -0.3));
    }

    #[test]
    fn legacy_axis_keeps_unknown_stick_for_the_dispatcher() {
        let update = decode_json(r#"{"type":"axis","name":"center","value":[1,1]}"#).unwrap();
        assert_eq!(update, Update::axis("center", 1.0, 1.0));
    }

    #[test]
    fn legacy_rejects_malformed_frames() {
        for bad in [
            "not json",
            r#"{"type":"wheel","name":"a","value":1}"#,
            r#"{"type":"axis","name":"left","value":[1]}"#,
            r#"{"type":"axis","name":"left","value":"up"}"#,
            r#"{"type":"button","value":true}"#,
        ] {
            let err = decode_json(bad).unwrap_err();
            assert!(err.is_malformed(), "{bad} -> {err}");
        }
    }

    #[test]
    fn binary_frame_decodes_to_update() {
        let update = Update::axis("right", -1.0, 0.25);
        let bytes = encode_binary(&update).unwrap();
        assert_eq!(decode_binary(&bytes).unwrap(), update);
    }

    #[test]
    fn binary_rejects_trailing_bytes_and_nan() {
        let mut bytes = encode_binary(&Update::button("b", false)).unwrap();
        bytes.push(0);
        assert!(decode_binary(&bytes).unwrap_err().is_malformed());

        let bytes = encode_binary(&Update::axis("left", f64::NAN, 0.0)).unwrap();
        assert!(decode_binary(&bytes).unwrap_err().is_malformed());

        assert!(decode_binary(&[0xff, 0xff, 0xff]).unwrap_err().is_malformed());
    }

    #[test]
    fn binary_length_prefix_beyond_limit_is_malformed() {
        // Button variant, then a string length of 2^46 with no bytes behind it.
        let mut payload = vec![0x00, 0xfd];
        payload.extend_from_slice(&(1u64 << 46).to_le_bytes());
        assert!(decode_binary(&payload).unwrap_err().is_malformed());

        let mut payload = vec![0x00, 0xfd];
        payload.extend_from_slice(&u64::MAX.to_le_bytes());
        assert!(decode_binary(&payload).unwrap_err().is_malformed());
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let text = " ".repeat(MAX_MESSAGE_SIZE + 1);
        assert!(matches!(
            decode_json(&text),
            Err(ProtocolError::TooLarge { .. })
        ));
    }

    #[test]
    fn error_frame_shape() {
        let value: serde_json::Value = serde_json::from_str(&encode_error("no backend")).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], "no backend");
    }
}
