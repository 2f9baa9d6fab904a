use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stage of link establishment at which a transient failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStage {
    /// Joining the wireless network.
    NetworkJoin,
    /// Connecting to the broker.
    BrokerConnect,
    /// Subscribing to the result topic.
    Subscribe,
    /// Publishing a queued event.
    Publish,
}

impl LinkStage {
    /// Wire token reported to the peer when this stage fails.
    pub fn failure_token(self) -> &'static str {
        match self {
            LinkStage::NetworkJoin => "WIFI_FAIL",
            LinkStage::BrokerConnect => "BRK_FAIL",
            LinkStage::Subscribe => "SUB_FAIL",
            LinkStage::Publish => "PUB_FAIL",
        }
    }
}

impl fmt::Display for LinkStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            LinkStage::NetworkJoin => "network join",
            LinkStage::BrokerConnect => "broker connect",
            LinkStage::Subscribe => "subscribe",
            LinkStage::Publish => "publish",
        };
        write!(f, "{stage}")
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // Handshake errors
    #[error("Configuration incomplete, missing: {missing}")]
    ConfigIncomplete { missing: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidConfigValue { key: String, reason: String },

    #[error("Configuration locked while {state}")]
    ConfigLocked { state: String },

    // Link errors
    #[error("Transient link failure during {stage}: {reason}")]
    TransientLinkFailure { stage: LinkStage, reason: String },

    // Queue errors
    #[error("Publish queue full (capacity {capacity})")]
    QueueFull { capacity: usize },

    // Integrity errors
    #[error("Integrity mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("Stale result: {reason}")]
    StaleResult { reason: String },

    // Framing errors
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Frame exceeds receive buffer of {capacity} bytes")]
    FrameOverflow { capacity: usize },

    // Validation errors
    #[error("Invalid card identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid door id: {0}")]
    InvalidDoorId(String),

    #[error("Invalid auth token: {0}")]
    InvalidToken(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the node recovers from this error on its own.
    ///
    /// Every protocol-level failure has an automatic recovery path (resend,
    /// cooldown-retry, drop-with-signal or fail-safe deny). Only a broken
    /// transport or a programming error in a transition table is not.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::Io(_) | Error::InvalidStateTransition { .. })
    }

    /// Token reported over the link when this error is surfaced to the peer.
    ///
    /// ```
    /// use doorlink_core::Error;
    ///
    /// let err = Error::InvalidConfigValue { key: "PORT".into(), reason: "not a number".into() };
    /// assert_eq!(err.diagnostic(), "PORT_INVALID");
    /// assert_eq!(Error::QueueFull { capacity: 3 }.diagnostic(), "PUB_FAIL");
    /// ```
    pub fn diagnostic(&self) -> String {
        match self {
            Error::ConfigIncomplete { .. } => "CONFIG_INCOMPLETE".to_string(),
            Error::InvalidConfigValue { key, .. } => format!("{key}_INVALID"),
            Error::ConfigLocked { .. } => "CONFIG_LOCKED".to_string(),
            Error::TransientLinkFailure { stage, .. } => stage.failure_token().to_string(),
            Error::QueueFull { .. } => "PUB_FAIL".to_string(),
            Error::IntegrityMismatch { .. } => "SIG_MISMATCH".to_string(),
            Error::StaleResult { .. } => "STALE_RESULT".to_string(),
            Error::MalformedFrame(_) => "MALFORMED_EVENT".to_string(),
            Error::FrameOverflow { .. } => "FRAME_OVERFLOW".to_string(),
            Error::InvalidIdentifier(_) | Error::InvalidDoorId(_) | Error::InvalidToken(_) => {
                "INVALID_EVENT".to_string()
            }
            Error::InvalidStateTransition { .. } => "STATE_ERROR".to_string(),
            Error::Io(_) => "IO_ERROR".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
