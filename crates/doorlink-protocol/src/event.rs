//! Access event and access result bodies.
//!
//! Both travel as compact JSON inside passthrough event frames:
//!
//! ```text
//! MQTT_TX|{"cardID":"04A1B2","doorID":"room1","timestamp":1000,"sig":"6E4F","token":"ABC123DEF456"}|
//! MQTT_RX|{"accessResult":"OK","cardID":"04A1B2","timestamp":1000,"sig":"6E4F"}\n
//! ```
//!
//! The event body never contains `|` or a newline: card UIDs are hex, door ids
//! and tokens are restricted to `[A-Za-z0-9_.-]`, and `serde_json` emits no
//! whitespace in compact mode.

use std::fmt;

use serde::{Deserialize, Serialize};

use doorlink_core::{AuthToken, CardUid, DoorId, Error, Result};

use crate::integrity::{self, IntegrityTag};

/// Access request raised by a card scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEvent {
    #[serde(rename = "cardID")]
    pub card_id: CardUid,
    #[serde(rename = "doorID")]
    pub door_id: DoorId,
    /// Milliseconds since the terminal booted.
    pub timestamp: u64,
    pub sig: IntegrityTag,
    pub token: AuthToken,
}

impl AccessEvent {
    /// Build an event and sign it.
    #[must_use]
    pub fn new(card_id: CardUid, door_id: DoorId, timestamp: u64, token: AuthToken) -> Self {
        let sig = integrity::tag(card_id.as_str(), door_id.as_str(), timestamp);
        Self {
            card_id,
            door_id,
            timestamp,
            sig,
            token,
        }
    }

    /// Whether `sig` matches the other fields.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        integrity::tag(self.card_id.as_str(), self.door_id.as_str(), self.timestamp)
            .matches(self.sig)
    }

    /// Compact JSON body.
    ///
    /// # Errors
    /// Returns `Error::MalformedFrame` if serialization fails.
    pub fn to_body(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::MalformedFrame(e.to_string()))
    }

    /// Parse a JSON body.
    ///
    /// # Errors
    /// Returns `Error::MalformedFrame` if the body is not a valid event.
    pub fn from_body(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| Error::MalformedFrame(e.to_string()))
    }
}

/// Backend decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "DENY")]
    Deny,
}

impl Verdict {
    #[must_use]
    pub fn is_granted(self) -> bool {
        matches!(self, Verdict::Ok)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Ok => f.write_str("OK"),
            Verdict::Deny => f.write_str("DENY"),
        }
    }
}

/// Outcome of checking the echoed fields of a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Echo present and the tag matches; carries the echoed timestamp.
    Verified { timestamp: u64 },
    /// No echoed fields at all.
    Unverified,
}

/// Access decision published by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessResult {
    #[serde(rename = "accessResult")]
    pub verdict: Verdict,
    #[serde(rename = "cardID", default, skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sig: Option<String>,
}

impl AccessResult {
    /// Result echoing the correlation fields of `event`.
    #[must_use]
    pub fn for_event(event: &AccessEvent, verdict: Verdict) -> Self {
        Self {
            verdict,
            card_id: Some(event.card_id.to_string()),
            timestamp: Some(event.timestamp),
            sig: Some(event.sig.to_string()),
        }
    }

    /// Result without correlation fields.
    #[must_use]
    pub fn bare(verdict: Verdict) -> Self {
        Self {
            verdict,
            card_id: None,
            timestamp: None,
            sig: None,
        }
    }

    /// Parse a JSON body. Unknown fields are ignored.
    ///
    /// # Errors
    /// Returns `Error::MalformedFrame` if the body is not JSON or lacks a valid
    /// `accessResult`.
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| Error::MalformedFrame(e.to_string()))
    }

    /// Compact JSON body.
    ///
    /// # Errors
    /// Returns `Error::MalformedFrame` if serialization fails.
    pub fn to_body(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::MalformedFrame(e.to_string()))
    }

    /// Recompute the tag for `door_id` and compare it with the echoed one.
    ///
    /// # Errors
    /// - `Error::MalformedFrame` if only some echo fields are present or the
    ///   echoed tag is not 4 hex digits
    /// - `Error::IntegrityMismatch` if the tags differ
    pub fn verify(&self, door_id: &str) -> Result<Verification> {
        match (&self.card_id, self.timestamp, &self.sig) {
            (None, None, None) => Ok(Verification::Unverified),
            (Some(card_id), Some(timestamp), Some(sig)) => {
                let echoed: IntegrityTag = sig.parse()?;
                integrity::verify(card_id, door_id, timestamp, echoed)?;
                Ok(Verification::Verified { timestamp })
            }
            _ => Err(Error::MalformedFrame(
                "result echoes only some of cardID, timestamp, sig".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> AccessEvent {
        AccessEvent::new(
            CardUid::new("04A1B2").unwrap(),
            DoorId::new("room1").unwrap(),
            1000,
            AuthToken::new("ABC123DEF456").unwrap(),
        )
    }

    #[test]
    fn test_event_body_layout() {
        let body = event().to_body().unwrap();
        assert_eq!(
            body,
            r#"{"cardID":"04A1B2","doorID":"room1","timestamp":1000,"sig":"6E4F","token":"ABC123DEF456"}"#
        );
        assert!(!body.contains('|'));
        assert!(!body.contains('\n'));
    }

    #[test]
    fn test_event_from_body() {
        let parsed = AccessEvent::from_body(&event().to_body().unwrap()).unwrap();
        assert_eq!(parsed, event());
        assert!(parsed.is_signed());
    }

    #[test]
    fn test_event_from_body_rejects_bad_uid() {
        let body = r#"{"cardID":"XYZ","doorID":"room1","timestamp":1,"sig":"0000","token":"t"}"#;
        assert!(matches!(
            AccessEvent::from_body(body),
            Err(Error::MalformedFrame(_))
        ));
    }

    #[test]
    fn test_result_parse_minimal() {
        let result = AccessResult::parse(r#"{"accessResult":"DENY"}"#).unwrap();
        assert_eq!(result, AccessResult::bare(Verdict::Deny));
        assert_eq!(result.verify("room1").unwrap(), Verification::Unverified);
    }

    #[test]
    fn test_result_parse_ignores_unknown_fields() {
        let result =
            AccessResult::parse(r#"{"accessResult":"OK","room":"101","note":"a|b"}"#).unwrap();
        assert!(result.verdict.is_granted());
    }

    #[test]
    fn test_result_parse_rejects_unknown_verdict() {
        assert!(AccessResult::parse(r#"{"accessResult":"MAYBE"}"#).is_err());
        assert!(AccessResult::parse("not json").is_err());
        assert!(AccessResult::parse("{}").is_err());
    }

    #[test]
    fn test_result_echo_verifies() {
        let result = AccessResult::for_event(&event(), Verdict::Ok);
        let body = result.to_body().unwrap();
        assert_eq!(
            body,
            r#"{"accessResult":"OK","cardID":"04A1B2","timestamp":1000,"sig":"6E4F"}"#
        );
        assert_eq!(
            AccessResult::parse(&body).unwrap().verify("room1").unwrap(),
            Verification::Verified { timestamp: 1000 }
        );
    }

    #[test]
    fn test_result_for_other_door_fails() {
        let result = AccessResult::for_event(&event(), Verdict::Ok);
        assert!(matches!(
            result.verify("room2"),
            Err(Error::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn test_result_partial_echo_is_malformed() {
        let mut result = AccessResult::for_event(&event(), Verdict::Ok);
        result.sig = None;
        assert!(matches!(
            result.verify("room1"),
            Err(Error::MalformedFrame(_))
        ));
    }
}
