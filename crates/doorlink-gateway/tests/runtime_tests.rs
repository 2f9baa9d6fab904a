//! Integration tests for GatewayRuntime
//!
//! The runtime is driven over an in-memory duplex stream; the test plays the
//! terminal side with its own framed codec. The tokio clock is paused so the
//! tick loop and the lifecycle timeouts advance instantly.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::time::timeout;
use tokio_util::codec::Framed;

use doorlink_gateway::mock::{JoinBehavior, MockBroker, MockNetwork};
use doorlink_gateway::network::InboundMessage;
use doorlink_gateway::{Gateway, GatewayConfig, GatewayRuntime};
use doorlink_protocol::{Frame, LinkCodec, Passthrough};

type TerminalLink = Framed<DuplexStream, LinkCodec>;

fn spawn_gateway(
    network: MockNetwork,
    broker: MockBroker,
) -> (
    TerminalLink,
    tokio::task::JoinHandle<GatewayRuntime<MockNetwork, MockBroker>>,
) {
    let (terminal_io, gateway_io) = tokio::io::duplex(1024);
    let gateway = Gateway::new(
        GatewayConfig::default(),
        network,
        broker,
        tokio::time::Instant::now().into_std(),
    );
    let mut runtime = GatewayRuntime::new(gateway);
    let handle = tokio::spawn(async move {
        runtime.run(gateway_io).await.unwrap();
        runtime
    });
    (
        Framed::new(terminal_io, LinkCodec::new(Passthrough::Inbound)),
        handle,
    )
}

async fn expect(link: &mut TerminalLink, expected: Frame) {
    let frame = timeout(Duration::from_secs(120), link.next())
        .await
        .expect("gateway went quiet")
        .expect("link closed")
        .expect("transport error")
        .expect("framing error");
    assert_eq!(frame, expected);
}

async fn handshake(link: &mut TerminalLink) {
    for field in ["SSID=lobby", "PASS=secret", "BROKER=10.0.0.2", "PORT=1883", "CONNECT"] {
        link.send(Frame::command(field)).await.unwrap();
    }
    for ack in ["SSID_OK", "PASS_OK", "BROKER_OK", "PORT_OK"] {
        expect(link, Frame::command(ack)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_handshake_publish_and_result_round_trip() {
    let broker = MockBroker::new().with_responder(Box::new(|_, _| {
        Some(InboundMessage {
            topic: "doorlink/room1/result".to_string(),
            payload: r#"{"accessResult":"OK"}"#.to_string(),
        })
    }));
    let (mut link, handle) = spawn_gateway(MockNetwork::new(), broker);

    expect(&mut link, Frame::command("BOOT_DONE")).await;
    expect(&mut link, Frame::command("REQ_CONFIG")).await;

    handshake(&mut link).await;
    expect(&mut link, Frame::command("WIFI_OK")).await;
    expect(&mut link, Frame::command("BRK_OK")).await;
    expect(&mut link, Frame::command("SYS_READY")).await;

    link.send(Frame::Outbound(r#"{"cardID":"04A1B2"}"#.to_string()))
        .await
        .unwrap();
    expect(&mut link, Frame::command("PUB_QUEUED")).await;
    expect(&mut link, Frame::command("PUB_OK")).await;
    expect(
        &mut link,
        Frame::Inbound(r#"{"accessResult":"OK"}"#.to_string()),
    )
    .await;

    drop(link);
    let runtime = handle.await.unwrap();
    let published = runtime.gateway().broker().published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].1, r#"{"cardID":"04A1B2"}"#);
}

#[tokio::test(start_paused = true)]
async fn test_join_timeout_recovers_to_config_request() {
    let network = MockNetwork::with_behavior(JoinBehavior::Hang);
    let (mut link, handle) = spawn_gateway(network, MockBroker::new());

    expect(&mut link, Frame::command("BOOT_DONE")).await;
    expect(&mut link, Frame::command("REQ_CONFIG")).await;

    let started = tokio::time::Instant::now();
    handshake(&mut link).await;

    // Frames are still serviced while the join is pending.
    link.send(Frame::command("PING")).await.unwrap();
    expect(&mut link, Frame::command("UNKNOWN_CMD=PING")).await;

    expect(&mut link, Frame::command("WIFI_FAIL")).await;
    assert!(started.elapsed() >= Duration::from_secs(20));

    expect(&mut link, Frame::command("REQ_CONFIG")).await;
    assert!(started.elapsed() >= Duration::from_secs(30));

    drop(link);
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_overflow_reported_and_link_survives() {
    let (mut link, handle) = spawn_gateway(MockNetwork::new(), MockBroker::new());
    expect(&mut link, Frame::command("BOOT_DONE")).await;
    expect(&mut link, Frame::command("REQ_CONFIG")).await;

    let noise = vec![b'A'; 300];
    link.get_mut().write_all(&noise).await.unwrap();
    link.get_mut().write_all(b"|SSID=lobby|").await.unwrap();

    expect(&mut link, Frame::command("FRAME_OVERFLOW")).await;
    expect(&mut link, Frame::command("SSID_OK")).await;

    drop(link);
    handle.await.unwrap();
}
