//! Access result acceptance.
//!
//! A result only opens the door if it provably answers one of this
//! terminal's own requests and is fresh. Every failed check yields an error
//! describing why; the caller turns it into a fail-safe `DENY`.

use std::time::Duration;

use doorlink_core::{DoorId, Error, Result};
use doorlink_protocol::{AccessResult, Verdict, Verification};

/// Checks echoed correlation fields and timestamp freshness.
#[derive(Debug, Clone)]
pub struct ResultVerifier {
    door_id: DoorId,
    max_age: Duration,
    require_verification: bool,
    last_accepted: Option<u64>,
}

impl ResultVerifier {
    pub fn new(door_id: DoorId, max_age: Duration, require_verification: bool) -> Self {
        Self {
            door_id,
            max_age,
            require_verification,
            last_accepted: None,
        }
    }

    /// Decide the effective verdict of `result` at terminal uptime `now_ms`.
    ///
    /// A backend `DENY` is returned as is. An `OK` is returned only if the
    /// echoed tag matches this door and the echoed timestamp is not in the
    /// future, not older than the maximum age and strictly newer than the
    /// last accepted result.
    ///
    /// A verified copy of the last accepted result yields `Ok(None)`: the
    /// backend may answer a retransmitted event twice.
    ///
    /// # Errors
    /// - `Error::IntegrityMismatch` if the tag does not match
    /// - `Error::StaleResult` if the timestamp fails a freshness check
    /// - `Error::MalformedFrame` if the echo is partial, or absent while
    ///   verification is required
    pub fn check(&mut self, result: &AccessResult, now_ms: u64) -> Result<Option<Verdict>> {
        if !result.verdict.is_granted() {
            return Ok(Some(Verdict::Deny));
        }

        match result.verify(self.door_id.as_str())? {
            Verification::Unverified if self.require_verification => Err(Error::MalformedFrame(
                "result carries no verification fields".to_string(),
            )),
            Verification::Unverified => Ok(Some(Verdict::Ok)),
            Verification::Verified { timestamp } if self.last_accepted == Some(timestamp) => {
                Ok(None)
            }
            Verification::Verified { timestamp } => {
                self.check_fresh(timestamp, now_ms)?;
                self.last_accepted = Some(timestamp);
                Ok(Some(Verdict::Ok))
            }
        }
    }

    fn check_fresh(&self, timestamp: u64, now_ms: u64) -> Result<()> {
        if timestamp > now_ms {
            return Err(stale(format!(
                "timestamp {timestamp} is ahead of uptime {now_ms}"
            )));
        }

        let age = now_ms - timestamp;
        let max_age = u64::try_from(self.max_age.as_millis()).unwrap_or(u64::MAX);
        if age > max_age {
            return Err(stale(format!("{age} ms old, limit {max_age} ms")));
        }

        if let Some(last) = self.last_accepted
            && timestamp <= last
        {
            return Err(stale(format!(
                "timestamp {timestamp} not newer than last accepted {last}"
            )));
        }
        Ok(())
    }

    /// Timestamp of the last accepted result.
    pub fn last_accepted(&self) -> Option<u64> {
        self.last_accepted
    }

    pub fn door_id(&self) -> &DoorId {
        &self.door_id
    }
}

fn stale(reason: String) -> Error {
    Error::StaleResult { reason }
}
