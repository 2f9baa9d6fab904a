//! Byte-stream framer for the doorlink link protocol.
//!
//! The framer consumes raw bytes as they arrive from the peer and extracts
//! complete frames from them. It never blocks and never grows beyond its
//! fixed-size receive buffer.
//!
//! # Dual Terminators
//!
//! Two dialects share one stream:
//!
//! ```text
//! SSID=hotel|PORT=1883|CONNECT|          command frames, end at '|'
//! MQTT_RX|{"accessResult":"OK"}\n        passthrough event, ends at '\n'
//! ```
//!
//! The terminator of a frame is decided solely by whether the frame starts
//! with the passthrough tag. A pipe that completes the tag belongs to the tag;
//! every later pipe is body content until the passthrough terminator arrives.
//!
//! # Usage
//!
//! ```
//! use doorlink_protocol::{Frame, LinkFramer, Passthrough};
//!
//! let mut framer = LinkFramer::new(Passthrough::Inbound);
//!
//! framer.feed(b"SYS_READY|MQTT_RX|{\"a\":\"x|y\"}");
//! framer.feed(b"\n");
//!
//! let frames: Vec<_> = framer.drain_frames().map(|f| f.unwrap()).collect();
//! assert_eq!(frames, vec![
//!     Frame::command("SYS_READY"),
//!     Frame::Inbound("{\"a\":\"x|y\"}".to_string()),
//! ]);
//! ```

use std::collections::VecDeque;

use doorlink_core::{
    Error, Result,
    constants::{COMMAND_TERMINATOR, MAX_PENDING_FRAMES, RX_BUFFER_SIZE},
};

use crate::frame::{Frame, Passthrough};

/// Framer sized with the reference receive buffer.
pub type LinkFramer = Framer<RX_BUFFER_SIZE>;

/// State machine states of the framer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    /// Between frames.
    ///
    /// Leading whitespace and control bytes are skipped here, as are stray
    /// pipes (an empty command frame is a no-op).
    Idle,

    /// Accumulating a command frame; a pipe terminates it.
    ///
    /// While the buffer is still a prefix of the passthrough tag, the frame
    /// may yet turn into an event.
    Command,

    /// The buffer starts with the passthrough tag; only the passthrough
    /// terminator ends the frame.
    Passthrough,

    /// The current frame overflowed the receive buffer and is being dropped
    /// up to its terminator.
    Discarding {
        /// Byte that ends the discarded frame.
        terminator: u8,
    },
}

/// Stateful byte-stream framer with a fixed `CAP`-byte receive buffer.
///
/// # State Machine
///
/// ```text
///               significant byte            buffer == tag
/// ┌──────┐ ───────────────────────> ┌─────────┐ ─────────────> ┌─────────────┐
/// │ Idle │                          │ Command │                │ Passthrough │
/// └──────┘ <─────────────────────── └─────────┘                └─────────────┘
///   ^  ^        '|' (frame out)          │                       │       │
///   │  │                                 │ buffer full           │       │
///   │  │                                 v                       │       │
///   │  │  terminator              ┌────────────┐  buffer full    │       │
///   │  └───────────────────────── │ Discarding │ <───────────────┘       │
///   │                             └────────────┘                         │
///   └────────────────────────────────────────────────────────────────────┘
///                      passthrough terminator (event out)
/// ```
///
/// Null bytes are dropped wherever they appear. Extracted content is trimmed
/// of surrounding whitespace and control characters.
#[derive(Debug)]
pub struct Framer<const CAP: usize> {
    passthrough: Passthrough,
    buffer: [u8; CAP],
    len: usize,
    state: FramerState,
    frames: VecDeque<Result<Frame>>,
    overflows: u64,
}

impl<const CAP: usize> Framer<CAP> {
    /// Create a framer recognising the given passthrough direction.
    pub fn new(passthrough: Passthrough) -> Self {
        Self {
            passthrough,
            buffer: [0; CAP],
            len: 0,
            state: FramerState::Idle,
            frames: VecDeque::with_capacity(MAX_PENDING_FRAMES),
            overflows: 0,
        }
    }

    /// Advance the state machine by one byte.
    ///
    /// Returns `Some` when the byte completes a frame, or when it overflows
    /// the receive buffer (`Err(Error::FrameOverflow)`).
    pub fn push(&mut self, byte: u8) -> Option<Result<Frame>> {
        match self.state {
            FramerState::Idle => {
                if byte == COMMAND_TERMINATOR || byte.is_ascii_whitespace() || byte.is_ascii_control()
                {
                    return None;
                }
                self.state = FramerState::Command;
                self.append(byte)
            }
            FramerState::Command => {
                if byte == 0 {
                    return None;
                }
                if byte == COMMAND_TERMINATOR && !self.extends_tag(byte) {
                    return self.finish_command();
                }
                if let Some(overflow) = self.append(byte) {
                    return Some(overflow);
                }
                if self.buffered() == self.passthrough.tag().as_bytes() {
                    self.state = FramerState::Passthrough;
                }
                None
            }
            FramerState::Passthrough => {
                if byte == self.passthrough.terminator() {
                    return self.finish_event();
                }
                if byte == 0 {
                    return None;
                }
                self.append(byte)
            }
            FramerState::Discarding { terminator } => {
                if byte == terminator {
                    self.state = FramerState::Idle;
                }
                None
            }
        }
    }

    /// Feed bytes from the link into the framer and return how many were
    /// consumed.
    ///
    /// Completed frames and overflow errors are queued in arrival order for
    /// [`next_frame`](Self::next_frame). Once [`MAX_PENDING_FRAMES`] items
    /// are queued the framer stops consuming; the caller drains the queue and
    /// feeds the remaining bytes again.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let mut consumed = 0;
        for &byte in bytes {
            if self.frames.len() >= MAX_PENDING_FRAMES {
                break;
            }
            consumed += 1;
            if let Some(item) = self.push(byte) {
                self.frames.push_back(item);
            }
        }
        consumed
    }

    /// Next queued frame or framing error.
    pub fn next_frame(&mut self) -> Option<Result<Frame>> {
        self.frames.pop_front()
    }

    /// Number of queued items.
    pub fn frames_available(&self) -> usize {
        self.frames.len()
    }

    /// Iterator draining every queued item.
    pub fn drain_frames(&mut self) -> DrainFrames<'_, CAP> {
        DrainFrames { framer: self }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    pub fn passthrough(&self) -> Passthrough {
        self.passthrough
    }

    /// Bytes of the frame currently being assembled.
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    /// Frames dropped because they outgrew the buffer.
    pub fn overflow_count(&self) -> u64 {
        self.overflows
    }

    /// Receive buffer size.
    pub const fn capacity(&self) -> usize {
        CAP
    }

    /// Drop the partial frame and every queued item.
    pub fn clear(&mut self) {
        self.len = 0;
        self.state = FramerState::Idle;
        self.frames.clear();
    }

    /// Whether appending `byte` keeps the buffer a strict prefix of the tag.
    fn extends_tag(&self, byte: u8) -> bool {
        let tag = self.passthrough.tag().as_bytes();
        self.len < tag.len() && tag[..self.len] == self.buffer[..self.len] && tag[self.len] == byte
    }

    fn append(&mut self, byte: u8) -> Option<Result<Frame>> {
        if self.len == CAP {
            let terminator = match self.state {
                FramerState::Passthrough => self.passthrough.terminator(),
                _ => COMMAND_TERMINATOR,
            };
            self.len = 0;
            self.state = FramerState::Discarding { terminator };
            self.overflows += 1;
            return Some(Err(Error::FrameOverflow { capacity: CAP }));
        }
        self.buffer[self.len] = byte;
        self.len += 1;
        None
    }

    fn finish_command(&mut self) -> Option<Result<Frame>> {
        let content = trimmed(&self.buffer[..self.len]);
        self.reset();
        if content.is_empty() {
            return None;
        }
        Some(Ok(Frame::Command(content)))
    }

    fn finish_event(&mut self) -> Option<Result<Frame>> {
        let tag_len = self.passthrough.tag().len();
        let body = trimmed(&self.buffer[tag_len..self.len]);
        self.reset();
        Some(Ok(Frame::event(self.passthrough, body)))
    }

    fn reset(&mut self) {
        self.len = 0;
        self.state = FramerState::Idle;
    }
}

fn trimmed(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_matches(|c: char| c.is_whitespace() || c.is_control())
        .to_string()
}

/// Iterator that drains queued items from a [`Framer`].
///
/// Created by [`Framer::drain_frames`].
pub struct DrainFrames<'a, const CAP: usize> {
    framer: &'a mut Framer<CAP>,
}

impl<const CAP: usize> Iterator for DrainFrames<'_, CAP> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.framer.next_frame()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.framer.frames_available();
        (len, Some(len))
    }
}

impl<const CAP: usize> ExactSizeIterator for DrainFrames<'_, CAP> {
    fn len(&self) -> usize {
        self.framer.frames_available()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn frames_of<const CAP: usize>(framer: &mut Framer<CAP>, bytes: &[u8]) -> Vec<Frame> {
        framer.feed(bytes);
        framer.drain_frames().map(|item| item.unwrap()).collect()
    }

    #[test]
    fn test_new_framer() {
        let framer = LinkFramer::new(Passthrough::Inbound);
        assert_eq!(framer.state(), FramerState::Idle);
        assert_eq!(framer.frames_available(), 0);
        assert_eq!(framer.capacity(), RX_BUFFER_SIZE);
    }

    #[test]
    fn test_command_frames() {
        let mut framer = LinkFramer::new(Passthrough::Outbound);
        let frames = frames_of(&mut framer, b"SSID=hotel|PASS=a=b|CONNECT|");
        assert_eq!(
            frames,
            vec![
                Frame::command("SSID=hotel"),
                Frame::command("PASS=a=b"),
                Frame::command("CONNECT"),
            ]
        );
    }

    #[test]
    fn test_partial_frame_across_feeds() {
        let mut framer = LinkFramer::new(Passthrough::Inbound);
        framer.feed(b"SYS_RE");
        assert!(framer.next_frame().is_none());
        assert_eq!(framer.state(), FramerState::Command);

        framer.feed(b"ADY|");
        assert_eq!(framer.next_frame().unwrap().unwrap(), Frame::command("SYS_READY"));
    }

    #[test]
    fn test_inbound_event_keeps_pipes() {
        let mut framer = LinkFramer::new(Passthrough::Inbound);
        let frames = frames_of(&mut framer, b"MQTT_RX|{\"a\":\"b|c|d\"}\nPUB_OK|");
        assert_eq!(
            frames,
            vec![
                Frame::Inbound("{\"a\":\"b|c|d\"}".into()),
                Frame::command("PUB_OK"),
            ]
        );
    }

    #[test]
    fn test_outbound_event_ends_at_second_pipe() {
        let mut framer = LinkFramer::new(Passthrough::Outbound);
        let frames = frames_of(&mut framer, b"MQTT_TX|{\"cardID\":\"04A1B2\"}|CONNECT|");
        assert_eq!(
            frames,
            vec![
                Frame::Outbound("{\"cardID\":\"04A1B2\"}".into()),
                Frame::command("CONNECT"),
            ]
        );
    }

    #[test]
    fn test_passthrough_mode_entered_on_tag_pipe() {
        let mut framer = LinkFramer::new(Passthrough::Inbound);
        framer.feed(b"MQTT_RX");
        assert_eq!(framer.state(), FramerState::Command);
        framer.feed(b"|");
        assert_eq!(framer.state(), FramerState::Passthrough);
        framer.feed(b"x|y");
        assert_eq!(framer.frames_available(), 0);
    }

    #[rstest]
    #[case(b"MQTT|".as_slice(), "MQTT")]
    #[case(b"MQTT_R|".as_slice(), "MQTT_R")]
    #[case(b"MQTT_TX|".as_slice(), "MQTT_TX")]
    fn test_tag_false_start_is_a_command(#[case] input: &[u8], #[case] expected: &str) {
        let mut framer = LinkFramer::new(Passthrough::Inbound);
        assert_eq!(frames_of(&mut framer, input), vec![Frame::command(expected)]);
    }

    #[test]
    fn test_other_direction_tag_is_not_passthrough() {
        let mut framer = LinkFramer::new(Passthrough::Outbound);
        let frames = frames_of(&mut framer, b"MQTT_RX|{\"a\":1}\n|");
        assert_eq!(
            frames,
            vec![Frame::command("MQTT_RX"), Frame::command("{\"a\":1}")]
        );
    }

    #[test]
    fn test_leading_noise_and_empty_frames_skipped() {
        let mut framer = LinkFramer::new(Passthrough::Inbound);
        let frames = frames_of(&mut framer, b"\r\n \t||\x01SYS_READY \r|||");
        assert_eq!(frames, vec![Frame::command("SYS_READY")]);
    }

    #[test]
    fn test_null_bytes_dropped() {
        let mut framer = LinkFramer::new(Passthrough::Inbound);
        let frames = frames_of(&mut framer, b"\0PUB\0_OK|MQTT_RX|a\0b\n");
        assert_eq!(
            frames,
            vec![Frame::command("PUB_OK"), Frame::Inbound("ab".into())]
        );
    }

    #[test]
    fn test_event_body_trimmed() {
        let mut framer = LinkFramer::new(Passthrough::Inbound);
        let frames = frames_of(&mut framer, b"MQTT_RX|  {}\r\n");
        assert_eq!(frames, vec![Frame::Inbound("{}".into())]);
    }

    #[test]
    fn test_frame_filling_buffer_exactly() {
        let mut framer: Framer<8> = Framer::new(Passthrough::Inbound);
        let frames = frames_of(&mut framer, b"ABCDEFGH|");
        assert_eq!(frames, vec![Frame::command("ABCDEFGH")]);
        assert_eq!(framer.overflow_count(), 0);
    }

    #[test]
    fn test_command_overflow_discards_and_recovers() {
        let mut framer: Framer<8> = Framer::new(Passthrough::Inbound);
        framer.feed(b"ABCDEFGHIJKL|PUB_OK|");

        let first = framer.next_frame().unwrap();
        assert!(matches!(first, Err(Error::FrameOverflow { capacity: 8 })));
        assert_eq!(framer.next_frame().unwrap().unwrap(), Frame::command("PUB_OK"));
        assert!(framer.next_frame().is_none());
        assert_eq!(framer.overflow_count(), 1);
    }

    #[test]
    fn test_event_overflow_discards_up_to_newline() {
        let mut framer: Framer<12> = Framer::new(Passthrough::Inbound);
        framer.feed(b"MQTT_RX|abcd|efgh|ijkl\nSYS_READY|");

        assert!(matches!(
            framer.next_frame(),
            Some(Err(Error::FrameOverflow { .. }))
        ));
        assert_eq!(framer.next_frame().unwrap().unwrap(), Frame::command("SYS_READY"));
        assert_eq!(framer.state(), FramerState::Idle);
    }

    #[test]
    fn test_pending_frames_are_bounded() {
        let mut framer = LinkFramer::new(Passthrough::Inbound);
        let burst = b"A|".repeat(MAX_PENDING_FRAMES + 8);

        let consumed = framer.feed(&burst);
        assert_eq!(consumed, MAX_PENDING_FRAMES * 2);
        assert_eq!(framer.frames_available(), MAX_PENDING_FRAMES);

        assert_eq!(framer.drain_frames().count(), MAX_PENDING_FRAMES);
        assert_eq!(framer.feed(&burst[consumed..]), 16);
        assert_eq!(framer.frames_available(), 8);
    }

    #[test]
    fn test_clear_drops_partial_frame() {
        let mut framer = LinkFramer::new(Passthrough::Inbound);
        framer.feed(b"MQTT_RX|{\"half");
        framer.clear();
        assert_eq!(framer.state(), FramerState::Idle);
        assert!(framer.buffered().is_empty());

        let frames = frames_of(&mut framer, b"PUB_OK|");
        assert_eq!(frames, vec![Frame::command("PUB_OK")]);
    }

    #[test]
    fn test_drain_frames_exact_size() {
        let mut framer = LinkFramer::new(Passthrough::Inbound);
        framer.feed(b"A|B|C|");
        let drain = framer.drain_frames();
        assert_eq!(drain.len(), 3);
        assert_eq!(drain.count(), 3);
        assert_eq!(framer.frames_available(), 0);
    }
}
