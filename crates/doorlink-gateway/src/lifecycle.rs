//! Connection lifecycle states of the gateway.
//!
//! # Valid Transitions
//!
//! ```text
//! ┌──────┐   ┌────────────┐ CONNECT  ┌────────────────┐ joined ┌───────────────┐ subscribed ┌───────┐
//! │ Boot │──>│ WaitConfig │─────────>│ ConnectNetwork │───────>│ ConnectBroker │───────────>│ Ready │
//! └──────┘   └────────────┘          └────────────────┘        └───────────────┘            └───────┘
//!                  ^                          │                        │
//!                  │  cooldown                │ timeout                │ refused / timeout
//!                  │                          v                        v
//!                  │                     ┌──────────────────────────────────┐
//!                  └─────────────────────│               Error              │
//!                                        └──────────────────────────────────┘
//! ```
//!
//! `Ready` never falls back: a dropped broker link is repaired in place by the
//! reconnect check. `Error` is the only recovery path.

use std::fmt;

use serde::{Deserialize, Serialize};

use doorlink_core::State;

/// Gateway connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Powered up, nothing announced yet.
    Boot,
    /// Accumulating handshake fields.
    WaitConfig,
    /// Network join in flight.
    ConnectNetwork,
    /// Broker connect and subscribe in flight.
    ConnectBroker,
    /// Publishing allowed.
    Ready,
    /// Cooling down before the handshake is requested again.
    Error,
}

impl ConnectionState {
    /// Whether access events may be accepted for publishing.
    #[must_use]
    pub fn accepts_events(self) -> bool {
        matches!(self, ConnectionState::Ready)
    }

    /// Whether handshake fields may still change.
    #[must_use]
    pub fn accepts_config(self) -> bool {
        matches!(self, ConnectionState::WaitConfig)
    }

    /// Whether a connection attempt sequence is in flight.
    #[must_use]
    pub fn is_connecting(self) -> bool {
        matches!(
            self,
            ConnectionState::ConnectNetwork | ConnectionState::ConnectBroker
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state_str = match self {
            ConnectionState::Boot => "Boot",
            ConnectionState::WaitConfig => "WaitConfig",
            ConnectionState::ConnectNetwork => "ConnectNetwork",
            ConnectionState::ConnectBroker => "ConnectBroker",
            ConnectionState::Ready => "Ready",
            ConnectionState::Error => "Error",
        };
        write!(f, "{state_str}")
    }
}

impl State for ConnectionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (ConnectionState::Boot, ConnectionState::WaitConfig)
                | (ConnectionState::WaitConfig, ConnectionState::ConnectNetwork)
                | (
                    ConnectionState::ConnectNetwork,
                    ConnectionState::ConnectBroker | ConnectionState::Error
                )
                | (
                    ConnectionState::ConnectBroker,
                    ConnectionState::Ready | ConnectionState::Error
                )
                | (ConnectionState::Error, ConnectionState::WaitConfig)
        )
    }
}
