//! Card reader interface and a scripted reader.

use std::collections::VecDeque;
use std::time::Instant;

use doorlink_core::CardUid;

/// Contactless card reader, polled by the control loop.
pub trait CardReader {
    /// UID of a card in the field, if one is readable at `now`.
    fn poll_card(&mut self, now: Instant) -> Option<CardUid>;
}

#[derive(Debug, Clone)]
struct Presentation {
    uid: CardUid,
    at: Option<Instant>,
}

/// Reader that yields a scripted sequence of cards.
///
/// Each presented card is read exactly once, on the first poll at or after
/// its scheduled instant.
///
/// ```
/// use std::time::{Duration, Instant};
/// use doorlink_core::CardUid;
/// use doorlink_terminal::reader::{CardReader, MockReader};
///
/// let t0 = Instant::now();
/// let mut reader = MockReader::new();
/// reader.present_at(CardUid::new("04A1B2").unwrap(), t0 + Duration::from_secs(1));
///
/// assert!(reader.poll_card(t0).is_none());
/// assert_eq!(reader.poll_card(t0 + Duration::from_secs(1)).unwrap().as_str(), "04A1B2");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockReader {
    script: VecDeque<Presentation>,
    reads: usize,
}

impl MockReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a card readable on the next poll.
    pub fn present(&mut self, uid: CardUid) {
        self.script.push_back(Presentation { uid, at: None });
    }

    /// Queue a card readable from `at` on.
    pub fn present_at(&mut self, uid: CardUid, at: Instant) {
        self.script.push_back(Presentation { uid, at: Some(at) });
    }

    /// Cards not read yet.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// Cards read so far.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl CardReader for MockReader {
    fn poll_card(&mut self, now: Instant) -> Option<CardUid> {
        let due = self
            .script
            .front()
            .is_some_and(|p| p.at.is_none_or(|at| now >= at));
        if !due {
            return None;
        }
        self.reads += 1;
        self.script.pop_front().map(|p| p.uid)
    }
}
