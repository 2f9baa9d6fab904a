use std::time::{Duration, Instant};

use doorlink_core::CardUid;

/// Suppresses repeated reads of a card held in the field.
///
/// A scan is accepted when its UID differs from the last accepted one, or
/// when the re-scan interval has elapsed since that acceptance.
#[derive(Debug, Clone)]
pub struct ScanDebouncer {
    interval: Duration,
    last: Option<(CardUid, Instant)>,
}

impl ScanDebouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether `uid` read at `now` should become a new event.
    pub fn accept(&mut self, uid: &CardUid, now: Instant) -> bool {
        let accepted = match &self.last {
            None => true,
            Some((last_uid, at)) => {
                last_uid != uid || now.saturating_duration_since(*at) >= self.interval
            }
        };
        if accepted {
            self.last = Some((uid.clone(), now));
        }
        accepted
    }

    /// Last accepted UID.
    pub fn last_uid(&self) -> Option<&CardUid> {
        self.last.as_ref().map(|(uid, _)| uid)
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
