//! Session and negotiation state machines.

/// Transport state of a controller session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Controller allocated, channel not yet handed to the dispatcher.
    Connecting,
    /// Channel usable; the session appears in status snapshots.
    Open,
    /// Controller released. Terminal.
    Closed,
}

impl TransportState {
    /// Whether we can transition to the Open state.
    pub fn can_activate(self) -> bool {
        self == Self::Connecting
    }

    /// Whether the session still owns its controller.
    pub fn is_live(self) -> bool {
        self != Self::Closed
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Phase of a signaled peer-to-peer negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationPhase {
    /// No negotiation in progress; waiting for the client's offer.
    AwaitingOffer,
    /// Applying the offer and producing an answer.
    NegotiatingAnswer,
    /// Answer sent; waiting for the client's data channel.
    AwaitingChannel,
    /// Data channel open and wired to a controller session.
    Established,
    /// Negotiation failed. Terminal.
    Failed,
}

impl NegotiationPhase {
    /// Whether a negotiation object exists in this phase.
    pub fn has_peer(self) -> bool {
        matches!(
            self,
            Self::NegotiatingAnswer | Self::AwaitingChannel | Self::Established
        )
    }

    /// Whether the negotiation deadline applies in this phase.
    pub fn is_timed(self) -> bool {
        matches!(self, Self::NegotiatingAnswer | Self::AwaitingChannel)
    }
}

impl std::fmt::Display for NegotiationPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingOffer => write!(f, "AwaitingOffer"),
            Self::NegotiatingAnswer => write!(f, "NegotiatingAnswer"),
            Self::AwaitingChannel => write!(f, "AwaitingChannel"),
            Self::Established => write!(f, "Established"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}
