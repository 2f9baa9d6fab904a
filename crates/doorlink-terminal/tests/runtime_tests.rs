//! Integration tests for TerminalRuntime
//!
//! The test plays the gateway over an in-memory duplex stream with the
//! clock paused, so handshake pacing and the boot wait elapse instantly.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::time::timeout;
use tokio_util::codec::Framed;

use doorlink_core::{AuthToken, CardUid, ConfigSet, DoorId};
use doorlink_protocol::{AccessEvent, AccessResult, Frame, LinkCodec, Passthrough, Verdict};
use doorlink_terminal::indicator::MockIndicator;
use doorlink_terminal::reader::MockReader;
use doorlink_terminal::{Led, Terminal, TerminalConfig, TerminalRuntime, TerminalState};

type GatewayLink = Framed<DuplexStream, LinkCodec>;
type Handle = tokio::task::JoinHandle<TerminalRuntime<MockReader, MockIndicator>>;

fn config() -> TerminalConfig {
    TerminalConfig::new(
        DoorId::new("room1").unwrap(),
        AuthToken::new("ABC123DEF456").unwrap(),
        ConfigSet {
            ssid: "lobby".into(),
            password: "secret".into(),
            broker: "10.0.0.2".into(),
            port: 1883,
        },
    )
}

fn spawn_terminal(reader: MockReader) -> (GatewayLink, Handle) {
    let (gateway_io, terminal_io) = tokio::io::duplex(1024);
    let terminal = Terminal::new(
        config(),
        reader,
        MockIndicator::default(),
        tokio::time::Instant::now().into_std(),
    );
    let mut runtime = TerminalRuntime::new(terminal);
    let handle = tokio::spawn(async move {
        runtime.run(terminal_io).await.unwrap();
        runtime
    });
    (
        Framed::new(gateway_io, LinkCodec::new(Passthrough::Outbound)),
        handle,
    )
}

async fn next_frame(link: &mut GatewayLink) -> Frame {
    timeout(Duration::from_secs(120), link.next())
        .await
        .expect("terminal went quiet")
        .expect("link closed")
        .expect("transport error")
        .expect("framing error")
}

async fn expect(link: &mut GatewayLink, expected: Frame) {
    assert_eq!(next_frame(link).await, expected);
}

async fn expect_handshake(link: &mut GatewayLink) {
    for field in ["SSID=lobby", "PASS=secret", "BROKER=10.0.0.2", "PORT=1883", "CONNECT"] {
        expect(link, Frame::command(field)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_scan_publish_and_verified_result() {
    let mut reader = MockReader::new();
    reader.present(CardUid::new("04a1b2").unwrap());
    let (mut link, handle) = spawn_terminal(reader);

    expect(&mut link, Frame::command("TERM_BOOT")).await;
    link.send(Frame::command("REQ_CONFIG")).await.unwrap();
    expect_handshake(&mut link).await;
    link.send(Frame::command("SYS_READY")).await.unwrap();

    let event = match next_frame(&mut link).await {
        Frame::Outbound(body) => AccessEvent::from_body(&body).unwrap(),
        other => panic!("expected an access event, got {other:?}"),
    };
    assert_eq!(event.card_id.as_str(), "04A1B2");
    assert_eq!(event.door_id.as_str(), "room1");
    assert!(event.is_signed());

    link.send(Frame::command("PUB_QUEUED")).await.unwrap();
    link.send(Frame::command("PUB_OK")).await.unwrap();
    let result = AccessResult::for_event(&event, Verdict::Ok);
    link.send(Frame::Inbound(result.to_body().unwrap()))
        .await
        .unwrap();

    drop(link);
    let runtime = handle.await.unwrap();
    let terminal = runtime.terminal();
    assert_eq!(terminal.state(), TerminalState::Operational);
    assert_eq!(terminal.last_verdict(), Some(Verdict::Ok));
    assert!(terminal.outbox().is_empty());
    assert!(terminal.panel().hardware().times_lit(Led::Ok) >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_sent_after_boot_wait() {
    let (mut link, handle) = spawn_terminal(MockReader::new());

    expect(&mut link, Frame::command("TERM_BOOT")).await;
    let booted = tokio::time::Instant::now();
    expect(&mut link, Frame::command("SSID=lobby")).await;
    assert!(booted.elapsed() >= Duration::from_millis(790));

    drop(link);
    let runtime = handle.await.unwrap();
    assert!(runtime.terminal().state().is_handshaking());
}

#[tokio::test(start_paused = true)]
async fn test_handshake_frames_spaced_on_the_wire() {
    let (mut link, handle) = spawn_terminal(MockReader::new());

    expect(&mut link, Frame::command("TERM_BOOT")).await;
    link.send(Frame::command("REQ_CONFIG")).await.unwrap();
    expect(&mut link, Frame::command("SSID=lobby")).await;

    let first = tokio::time::Instant::now();
    expect(&mut link, Frame::command("PASS=secret")).await;
    assert!(first.elapsed() >= Duration::from_millis(40));

    drop(link);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_overflow_reported_to_gateway() {
    let (mut link, handle) = spawn_terminal(MockReader::new());
    expect(&mut link, Frame::command("TERM_BOOT")).await;

    link.get_mut().write_all(&[b'A'; 300]).await.unwrap();
    link.get_mut().write_all(b"|REQ_CONFIG|").await.unwrap();

    expect(&mut link, Frame::command("FRAME_OVERFLOW")).await;
    expect(&mut link, Frame::command("SSID=lobby")).await;

    drop(link);
    handle.await.unwrap();
}
