//! Bench simulation: one terminal, one gateway, a simulated network, broker
//! and backend, all on the tokio clock.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use doorlink_core::CardUid;
use doorlink_gateway::mock::{JoinBehavior, MockBroker, MockNetwork, Responder};
use doorlink_gateway::network::InboundMessage;
use doorlink_gateway::{ConnectionState, Gateway, GatewayRuntime};
use doorlink_protocol::{AccessEvent, AccessResult, Verdict};
use doorlink_terminal::indicator::MockIndicator;
use doorlink_terminal::reader::MockReader;
use doorlink_terminal::{Led, Terminal, TerminalRuntime, TerminalState};

use crate::provisioning::Setup;

/// What the simulated world does
#[derive(Debug, Clone)]
pub struct Plan {
    /// Cards presented to the reader, one every `scan_every`.
    pub cards: Vec<CardUid>,
    /// Cards the backend grants.
    pub allow: Vec<CardUid>,
    pub join_delay: Duration,
    pub scan_every: Duration,
    pub duration: Duration,
}

/// Where both nodes ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub terminal_state: TerminalState,
    pub gateway_state: ConnectionState,
    pub presented: usize,
    pub read: usize,
    pub published: usize,
    pub pending: usize,
    pub last_verdict: Option<Verdict>,
    pub ok_lit: bool,
    pub deny_lit: bool,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = match self.last_verdict {
            Some(Verdict::Ok) => "OK",
            Some(Verdict::Deny) => "DENY",
            None => "none",
        };
        let level = |on: bool| if on { "on" } else { "off" };

        writeln!(f, "terminal: {} (last result {verdict})", self.terminal_state)?;
        writeln!(f, "gateway:  {}", self.gateway_state)?;
        writeln!(
            f,
            "cards:    {} presented, {} read, {} published, {} pending",
            self.presented, self.read, self.published, self.pending
        )?;
        write!(
            f,
            "leds:     OK {}, DENY {}",
            level(self.ok_lit),
            level(self.deny_lit)
        )
    }
}

/// Backend granting the cards in `allow` and denying everything else, each
/// answer echoing the request's correlation fields.
fn backend(request_topic: String, result_topic: String, allow: Vec<CardUid>) -> Responder {
    Box::new(move |topic, payload| {
        if topic != request_topic {
            return None;
        }
        let event = match AccessEvent::from_body(payload) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "backend received an unreadable request");
                return None;
            }
        };

        let verdict = if allow.contains(&event.card_id) {
            Verdict::Ok
        } else {
            Verdict::Deny
        };
        info!(card_id = %event.card_id, verdict = ?verdict, "Backend decided");

        match AccessResult::for_event(&event, verdict).to_body() {
            Ok(payload) => Some(InboundMessage {
                topic: result_topic.clone(),
                payload,
            }),
            Err(err) => {
                warn!(error = %err, "backend could not encode its answer");
                None
            }
        }
    })
}

/// Run both nodes for `plan.duration` and report where they ended up.
pub async fn run(setup: Setup, plan: Plan) -> Result<Summary> {
    let Setup {
        terminal: terminal_config,
        gateway: gateway_config,
    } = setup;
    let start = tokio::time::Instant::now().into_std();

    let mut reader = MockReader::new();
    let mut at = start;
    for uid in &plan.cards {
        at += plan.scan_every;
        reader.present_at(uid.clone(), at);
    }

    let network = MockNetwork::with_behavior(JoinBehavior::Succeed {
        after: plan.join_delay,
    });
    let broker = MockBroker::new().with_responder(backend(
        gateway_config.request_topic.clone(),
        gateway_config.result_topic.clone(),
        plan.allow.clone(),
    ));

    info!(
        door_id = %terminal_config.door_id,
        ssid = %terminal_config.credentials.ssid,
        broker = %terminal_config.credentials.broker_addr(),
        cards = plan.cards.len(),
        "Starting simulation"
    );

    let mut gateway = GatewayRuntime::new(Gateway::new(gateway_config, network, broker, start));
    let mut terminal = TerminalRuntime::new(Terminal::new(
        terminal_config,
        reader,
        MockIndicator::default(),
        start,
    ));
    let (terminal_io, gateway_io) = tokio::io::duplex(1024);

    let outcome = tokio::select! {
        result = terminal.run(terminal_io) => result.context("terminal stopped"),
        result = gateway.run(gateway_io) => result.context("gateway stopped"),
        () = tokio::time::sleep(plan.duration) => Ok(()),
    };
    outcome?;

    let terminal = terminal.terminal();
    let gateway = gateway.gateway();
    let summary = Summary {
        terminal_state: terminal.state(),
        gateway_state: gateway.state(),
        presented: plan.cards.len(),
        read: terminal.reader().reads(),
        published: gateway.broker().published().len(),
        pending: terminal.outbox().len(),
        last_verdict: terminal.last_verdict(),
        ok_lit: terminal.panel().is_lit(Led::Ok),
        deny_lit: terminal.panel().is_lit(Led::Deny),
    };
    info!(
        terminal = %summary.terminal_state,
        gateway = %summary.gateway_state,
        published = summary.published,
        "Simulation finished"
    );
    Ok(summary)
}
