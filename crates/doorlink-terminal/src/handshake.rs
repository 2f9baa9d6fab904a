//! Paced handshake sender.
//!
//! The gateway's receive buffer is small, so the handshake frames go out one
//! at a time with a minimum spacing between them. The sender only decides
//! *when* the next frame is due; the control loop keeps running in between.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use doorlink_core::{ConfigField, ConfigSet};
use doorlink_protocol::{Command, Frame, Token};

/// Queue of handshake frames released at a fixed spacing.
#[derive(Debug, Clone)]
pub struct HandshakeSender {
    spacing: Duration,
    pending: VecDeque<Frame>,
    next_at: Option<Instant>,
    sent: usize,
}

impl HandshakeSender {
    pub fn new(spacing: Duration) -> Self {
        Self {
            spacing,
            pending: VecDeque::with_capacity(ConfigField::ALL.len() + 1),
            next_at: None,
            sent: 0,
        }
    }

    /// Load the four field frames and `CONNECT`, discarding anything not yet
    /// sent. The first frame is due at `now`.
    pub fn begin(&mut self, credentials: &ConfigSet, now: Instant) {
        self.pending.clear();
        for field in ConfigField::ALL {
            self.pending
                .push_back(Command::config(field, credentials.value(field)).to_frame());
        }
        self.pending.push_back(Token::Connect.to_frame());
        self.next_at = Some(now);
        self.sent = 0;
    }

    /// Next frame if it is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<Frame> {
        let due = self.next_at.is_some_and(|at| now >= at);
        if !due {
            return None;
        }
        let frame = self.pending.pop_front()?;
        self.sent += 1;
        self.next_at = if self.pending.is_empty() {
            None
        } else {
            Some(now + self.spacing)
        };
        Some(frame)
    }

    /// Whether a handshake was loaded and every frame has gone out.
    pub fn is_done(&self) -> bool {
        self.sent > 0 && self.pending.is_empty()
    }

    /// Frames of the current handshake sent so far.
    pub fn sent(&self) -> usize {
        self.sent
    }

    pub fn spacing(&self) -> Duration {
        self.spacing
    }

    /// Drop the rest of the current handshake.
    pub fn cancel(&mut self) {
        self.pending.clear();
        self.next_at = None;
        self.sent = 0;
    }
}
