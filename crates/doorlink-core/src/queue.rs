//! Bounded outbound queue and its delivery discipline.
//!
//! [`PublishQueue`] is a fixed-capacity ring that never overwrites an
//! unacknowledged entry: inserting into a full ring fails with
//! [`Error::QueueFull`] and leaves the contents untouched.
//!
//! [`Outbox`] layers at-least-once delivery on top. The oldest entry is handed
//! out for transmission at most once per retry interval and only leaves the
//! ring on an explicit acknowledgement. A negative acknowledgement keeps it at
//! the head, so later entries are never reordered ahead of it.
//!
//! ```
//! use std::time::{Duration, Instant};
//! use doorlink_core::Outbox;
//!
//! let mut outbox: Outbox<&str, 3> = Outbox::new(Duration::from_secs(3));
//! let t0 = Instant::now();
//!
//! outbox.push("event-1").unwrap();
//! assert_eq!(outbox.poll_send(t0), Some(&"event-1"));
//! assert_eq!(outbox.poll_send(t0), None); // waiting for an ack
//!
//! outbox.reject(t0);
//! assert_eq!(outbox.poll_send(t0 + Duration::from_secs(3)), Some(&"event-1"));
//! assert_eq!(outbox.acknowledge(), Some("event-1"));
//! ```

use std::time::{Duration, Instant};

use crate::{Result, error::Error};

/// Fixed-capacity FIFO ring of pending events
#[derive(Debug, Clone)]
pub struct PublishQueue<T, const N: usize> {
    slots: [Option<T>; N],
    head: usize,
    len: usize,
}

impl<T, const N: usize> PublishQueue<T, N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
            head: 0,
            len: 0,
        }
    }

    /// Append an item at the tail.
    ///
    /// # Errors
    /// Returns `Error::QueueFull` when the ring holds `N` items. The item is
    /// dropped and the existing contents are not modified.
    pub fn enqueue(&mut self, item: T) -> Result<()> {
        if self.is_full() {
            return Err(Error::QueueFull { capacity: N });
        }
        let tail = (self.head + self.len) % N;
        self.slots[tail] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Oldest item, if any.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.head].as_ref()
    }

    /// Remove and return the oldest item.
    pub fn dequeue(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let item = self.slots[self.head].take();
        self.head = (self.head + 1) % N;
        self.len -= 1;
        item
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == N
    }

    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Drop every queued item.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.slots[(self.head + i) % N].as_ref())
    }
}

impl<T: PartialEq, const N: usize> PublishQueue<T, N> {
    /// Whether an equal item is already queued.
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.iter().any(|queued| queued == item)
    }
}

impl<T, const N: usize> Default for PublishQueue<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Publish queue with head-of-line retry
#[derive(Debug, Clone)]
pub struct Outbox<T, const N: usize> {
    queue: PublishQueue<T, N>,
    retry_interval: Duration,
    last_sent: Option<Instant>,
    attempts: u32,
}

impl<T, const N: usize> Outbox<T, N> {
    #[must_use]
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            queue: PublishQueue::new(),
            retry_interval,
            last_sent: None,
            attempts: 0,
        }
    }

    /// Queue an item for delivery.
    ///
    /// # Errors
    /// Returns `Error::QueueFull` when the ring is at capacity.
    pub fn push(&mut self, item: T) -> Result<()> {
        self.queue.enqueue(item)
    }

    /// Head item if it is due for (re)transmission at `now`.
    ///
    /// A fresh head is due immediately. Once sent it is due again only after
    /// the retry interval has elapsed since the last transmission. Each
    /// returned item counts as one attempt.
    pub fn poll_send(&mut self, now: Instant) -> Option<&T> {
        self.queue.peek()?;

        let due = match self.last_sent {
            None => true,
            Some(sent) => now.saturating_duration_since(sent) >= self.retry_interval,
        };
        if !due {
            return None;
        }

        self.last_sent = Some(now);
        self.attempts = self.attempts.saturating_add(1);
        self.queue.peek()
    }

    /// Positive acknowledgement for the head item: remove and return it.
    pub fn acknowledge(&mut self) -> Option<T> {
        let item = self.queue.dequeue()?;
        self.last_sent = None;
        self.attempts = 0;
        Some(item)
    }

    /// Negative acknowledgement: keep the head and restart its retry timer.
    pub fn reject(&mut self, now: Instant) {
        if !self.queue.is_empty() {
            self.last_sent = Some(now);
        }
    }

    /// Whether the head has been sent and is awaiting an acknowledgement.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.last_sent.is_some() && !self.queue.is_empty()
    }

    /// Transmissions of the current head so far.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    #[must_use]
    pub fn head(&self) -> Option<&T> {
        self.queue.peek()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    #[must_use]
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    #[must_use]
    pub fn queue(&self) -> &PublishQueue<T, N> {
        &self.queue
    }

    /// Drop everything, including the retry state.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.last_sent = None;
        self.attempts = 0;
    }
}

impl<T: PartialEq, const N: usize> Outbox<T, N> {
    #[must_use]
    pub fn contains(&self, item: &T) -> bool {
        self.queue.contains(item)
    }
}
