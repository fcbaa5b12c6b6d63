//! Signaling envelopes exchanged while negotiating a peer-to-peer data channel.
//!
//! Envelopes are JSON objects with a single key naming the message kind:
//! `{"offer": {...}}`, `{"answer": {...}}`, `{"ice": {...}}`, `{"error": "..."}`.

use serde::{Deserialize, Serialize};

/// A signaling message, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalMessage {
    /// Remote session description (client -> server).
    Offer(SessionDescription),
    /// Local session description (server -> client).
    Answer(SessionDescription),
    /// A network candidate, trickled in either direction.
    Ice(IceCandidate),
    /// Negotiation failed; the server is about to close the socket.
    Error(String),
}

/// Kind of a session description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// A session description as browsers serialise `RTCSessionDescription`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// A network candidate as browsers serialise `RTCIceCandidateInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default)]
    pub sdp_mid: Option<String>,
    #[serde(default, rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

impl IceCandidate {
    pub fn new(candidate: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            sdp_mid: Some("0".to_string()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offer_envelope_parses_browser_json() {
        let json = r#"{"offer":{"type":"offer","sdp":"v=0\r\n"}}"#;
        let msg: SignalMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, SignalMessage::Offer(SessionDescription::offer("v=0\r\n")));
    }

    #[test]
    fn ice_envelope_uses_browser_field_names() {
        let json = r#"{"ice":{"candidate":"candidate:1 1 udp 1 10.0.0.1 5000 typ host","sdpMid":"0","sdpMLineIndex":0}}"#;
        let msg: SignalMessage = serde_json::from_str(json).unwrap();
        let SignalMessage::Ice(candidate) = msg else {
            panic!("expected ice envelope");
        };
        assert_eq!(candidate.sdp_mid.as_deref(), Some("0"));
        assert_eq!(candidate.sdp_mline_index, Some(0));

        let out = serde_json::to_value(SignalMessage::Ice(candidate)).unwrap();
        assert_eq!(out["ice"]["sdpMLineIndex"], 0);
        assert!(out["ice"].get("usernameFragment").is_none());
    }

    #[test]
    fn answer_serialises_with_type_field() {
        let out = serde_json::to_value(SignalMessage::Answer(SessionDescription::answer("x"))).unwrap();
        assert_eq!(out["answer"]["type"], "answer");
        assert_eq!(out["answer"]["sdp"], "x");
    }
}
