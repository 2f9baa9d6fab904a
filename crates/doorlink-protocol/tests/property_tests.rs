//! Property-based tests for the link framer.
//!
//! These tests use proptest to generate arbitrary byte streams and frame
//! sequences and verify that framing invariants hold for all of them.

use doorlink_protocol::{Dialect, Frame, LinkFramer, Passthrough};
use proptest::prelude::*;

/// Strategy for command frame content (no terminator, no leading noise).
fn command_content() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][A-Z0-9_=.:-]{0,40}")
        .expect("Failed to create command regex strategy")
        .prop_filter("tag prefix opens an event", |s| !s.starts_with("MQTT_RX"))
}

/// Strategy for inbound event bodies, which may contain pipes but no newline.
fn inbound_body() -> impl Strategy<Value = String> {
    prop::string::string_regex("\\{[a-zA-Z0-9\":,| ]{0,120}\\}")
        .expect("Failed to create body regex strategy")
}

/// Strategy for a mixed sequence of command and inbound event frames.
fn frame_sequence() -> impl Strategy<Value = Vec<Frame>> {
    prop::collection::vec(
        prop_oneof![
            command_content().prop_map(Frame::Command),
            inbound_body().prop_map(Frame::Inbound),
        ],
        0..20,
    )
}

/// Feed all of `bytes`, draining between feeds, and collect every frame.
fn decode_all(framer: &mut LinkFramer, mut bytes: &[u8]) -> Vec<Frame> {
    let mut frames = Vec::new();
    loop {
        let consumed = framer.feed(bytes);
        bytes = &bytes[consumed..];
        frames.extend(framer.drain_frames().map(|f| f.unwrap()));
        if bytes.is_empty() {
            return frames;
        }
    }
}

/// Collect every item the framer yields, rendering errors as `None`.
fn run(framer: &mut LinkFramer) -> Vec<Option<Frame>> {
    framer.drain_frames().map(Result::ok).collect()
}

proptest! {
    /// Property: byte-at-a-time and all-at-once feeding yield identical output.
    #[test]
    fn prop_chunking_invariance(bytes in prop::collection::vec(any::<u8>(), 0..1024)) {
        let mut whole = LinkFramer::new(Passthrough::Inbound);
        whole.feed(&bytes);

        let mut bytewise = LinkFramer::new(Passthrough::Inbound);
        for byte in &bytes {
            bytewise.feed(std::slice::from_ref(byte));
        }

        prop_assert_eq!(run(&mut whole), run(&mut bytewise));
        prop_assert_eq!(whole.state(), bytewise.state());
    }

    /// Property: arbitrary split points do not change the output.
    #[test]
    fn prop_split_invariance(
        frames in frame_sequence(),
        splits in prop::collection::vec(any::<prop::sample::Index>(), 0..8),
    ) {
        let wire: Vec<u8> = frames.iter().flat_map(Frame::to_bytes).collect();

        let mut cuts: Vec<usize> = splits.iter().map(|i| i.index(wire.len() + 1)).collect();
        cuts.sort_unstable();

        let mut framer = LinkFramer::new(Passthrough::Inbound);
        let mut decoded = Vec::new();
        let mut start = 0;
        for cut in cuts {
            decoded.extend(decode_all(&mut framer, &wire[start..cut]));
            start = cut;
        }
        decoded.extend(decode_all(&mut framer, &wire[start..]));

        prop_assert_eq!(decoded, frames);
    }

    /// Property: a pipe-laden body is one event exactly when it carries the tag.
    #[test]
    fn prop_pipe_bodies(body in inbound_body()) {
        let mut framer = LinkFramer::new(Passthrough::Inbound);
        let tagged = decode_all(&mut framer, &Frame::Inbound(body.clone()).to_bytes());
        prop_assert_eq!(tagged, vec![Frame::Inbound(body.clone())]);

        let mut framer = LinkFramer::new(Passthrough::Inbound);
        let mut untagged = decode_all(&mut framer, body.as_bytes());
        untagged.extend(decode_all(&mut framer, b"\n|"));
        prop_assert!(untagged.iter().all(|f| f.dialect() == Dialect::Command));
        let segments = body.split('|').filter(|s| !s.trim().is_empty()).count();
        prop_assert_eq!(untagged.len(), segments);
    }

    /// Property: the framer never buffers more than its capacity.
    #[test]
    fn prop_buffer_bounded(bytes in prop::collection::vec(any::<u8>(), 0..2048)) {
        let mut framer = LinkFramer::new(Passthrough::Outbound);
        for byte in &bytes {
            framer.feed(std::slice::from_ref(byte));
            prop_assert!(framer.buffered().len() <= framer.capacity());
        }
    }
}
