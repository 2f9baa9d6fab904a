//! Companion states of the terminal.
//!
//! The terminal cannot see the gateway's lifecycle; it follows it through the
//! status tokens the gateway sends.
//!
//! # Valid Transitions
//!
//! ```text
//! Boot ──> WaitPeer ──> SendConfig ──> WaitReady ──> Operational
//!                         ^   ^            │              │
//!                         │   └────────────┴──────────────┘  REQ_CONFIG
//!                         │                │              │
//!                     cooldown             v              v
//!                         └─────────────  Error  <────────┘  timeout / *_FAIL
//! ```
//!
//! `Operational` never restarts the handshake on its own; only a token from
//! the gateway moves it.

use std::fmt;

use serde::{Deserialize, Serialize};

use doorlink_core::State;

/// Terminal companion state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    /// Powered up, nothing announced yet.
    Boot,
    /// Announced, waiting for the gateway to ask for configuration.
    WaitPeer,
    /// Paced handshake in progress.
    SendConfig,
    /// Handshake sent, waiting for `SYS_READY`.
    WaitReady,
    /// Scanning cards and exchanging access events.
    Operational,
    /// Cooling down before resending the handshake.
    Error,
}

impl TerminalState {
    /// Whether card scans are turned into access events.
    #[must_use]
    pub fn is_operational(self) -> bool {
        matches!(self, TerminalState::Operational)
    }

    /// Whether a handshake is sent or awaiting its outcome.
    #[must_use]
    pub fn is_handshaking(self) -> bool {
        matches!(self, TerminalState::SendConfig | TerminalState::WaitReady)
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            TerminalState::Boot => "Boot",
            TerminalState::WaitPeer => "WaitPeer",
            TerminalState::SendConfig => "SendConfig",
            TerminalState::WaitReady => "WaitReady",
            TerminalState::Operational => "Operational",
            TerminalState::Error => "Error",
        };
        write!(f, "{state_str}")
    }
}

impl State for TerminalState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use TerminalState::*;

        matches!(
            (self, target),
            (Boot, WaitPeer)
                | (WaitPeer, SendConfig)
                | (SendConfig, WaitReady | Error)
                | (WaitReady, Operational | Error | SendConfig)
                | (Operational, SendConfig | Error)
                | (Error, SendConfig)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TerminalState::Boot, TerminalState::WaitPeer, true)]
    #[case(TerminalState::WaitPeer, TerminalState::SendConfig, true)]
    #[case(TerminalState::SendConfig, TerminalState::WaitReady, true)]
    #[case(TerminalState::WaitReady, TerminalState::Operational, true)]
    #[case(TerminalState::WaitReady, TerminalState::Error, true)]
    #[case(TerminalState::Error, TerminalState::SendConfig, true)]
    #[case(TerminalState::Operational, TerminalState::SendConfig, true)]
    #[case(TerminalState::WaitPeer, TerminalState::Operational, false)]
    #[case(TerminalState::SendConfig, TerminalState::Operational, false)]
    #[case(TerminalState::Error, TerminalState::Operational, false)]
    #[case(TerminalState::Operational, TerminalState::WaitReady, false)]
    #[case(TerminalState::Boot, TerminalState::SendConfig, false)]
    fn test_transition_table(
        #[case] from: TerminalState,
        #[case] to: TerminalState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }

    #[test]
    fn test_only_operational_scans() {
        assert!(TerminalState::Operational.is_operational());
        assert!(!TerminalState::WaitReady.is_operational());
        assert!(TerminalState::WaitReady.is_handshaking());
    }
}
