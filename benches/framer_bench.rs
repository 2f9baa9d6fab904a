//! Performance benchmarks for the link framer and codec.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench framer_bench
//! ```

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use doorlink_core::{AuthToken, CardUid, DoorId};
use doorlink_protocol::{AccessEvent, Frame, LinkCodec, LinkFramer, Passthrough, tag};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

/// Handshake burst as sent by the terminal.
fn handshake_bytes() -> Vec<u8> {
    b"SSID=hotel-wifi|PASS=s3cret|BROKER=10.0.0.2|PORT=1883|CONNECT|".to_vec()
}

/// Outbound access event frame.
fn event_bytes() -> Vec<u8> {
    let event = AccessEvent::new(
        CardUid::new("04A1B2C3D4E5F6").unwrap(),
        DoorId::new("room1").unwrap(),
        123_456,
        AuthToken::new("ABC123DEF456").unwrap(),
    );
    Frame::Outbound(event.to_body().unwrap()).to_bytes()
}

/// Benchmark framing a handshake burst in one feed.
fn bench_feed_handshake(c: &mut Criterion) {
    let mut group = c.benchmark_group("feed_handshake");
    let bytes = handshake_bytes();
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("feed_whole", |b| {
        b.iter(|| {
            let mut framer = LinkFramer::new(Passthrough::Outbound);
            framer.feed(black_box(&bytes));
            black_box(framer.drain_frames().count());
        });
    });

    group.bench_function("feed_bytewise", |b| {
        b.iter(|| {
            let mut framer = LinkFramer::new(Passthrough::Outbound);
            for byte in black_box(&bytes) {
                framer.feed(std::slice::from_ref(byte));
            }
            black_box(framer.drain_frames().count());
        });
    });

    group.finish();
}

/// Benchmark decoding batches of event frames through the codec.
fn bench_decode_events(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_events");
    let frame = event_bytes();

    for batch_size in [1usize, 10, 100].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        let input: Vec<u8> = frame.repeat(*batch_size);

        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &input,
            |b, input| {
                b.iter(|| {
                    let mut codec = LinkCodec::new(Passthrough::Outbound);
                    let mut src = BytesMut::from(&input[..]);
                    let mut count = 0;
                    while let Ok(Some(item)) = codec.decode(&mut src) {
                        black_box(item.unwrap());
                        count += 1;
                    }
                    black_box(count);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark encoding result frames.
fn bench_encode_result(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_result");
    group.throughput(Throughput::Elements(1));
    let frame = Frame::Inbound(
        r#"{"accessResult":"OK","cardID":"04A1B2","timestamp":1000,"sig":"6E4F"}"#.to_string(),
    );

    group.bench_function("encode_inbound_event", |b| {
        b.iter(|| {
            let mut codec = LinkCodec::new(Passthrough::Inbound);
            let mut dst = BytesMut::new();
            codec.encode(black_box(frame.clone()), &mut dst).unwrap();
            black_box(dst);
        });
    });

    group.finish();
}

/// Benchmark the integrity tag.
fn bench_tag(c: &mut Criterion) {
    c.bench_function("integrity_tag", |b| {
        b.iter(|| black_box(tag(black_box("04A1B2C3D4E5F6"), black_box("room1"), black_box(1000))));
    });
}

criterion_group!(
    benches,
    bench_feed_handshake,
    bench_decode_events,
    bench_encode_result,
    bench_tag
);
criterion_main!(benches);
