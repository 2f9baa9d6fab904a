//! Gateway context: configuration handshake, connection lifecycle and the
//! publish queue.
//!
//! The context is sans-IO. [`Gateway::handle_frame`] consumes one frame
//! received from the terminal, [`Gateway::poll`] advances timers and the
//! collaborators, and both return the frames to send back. The driver loop
//! owns the byte stream and the clock.
//!
//! ```text
//! terminal frames ──> handle_frame ──┐
//!                                     ├──> Vec<Frame> ──> terminal
//! tick (now)      ──> poll ──────────┘
//!                      │
//!                      ├── NetworkJoin::poll_join
//!                      └── BrokerClient::poll_connect / publish / poll_inbound
//! ```

use std::time::Instant;

use tracing::{debug, error, info, trace, warn};

use doorlink_core::{
    ConfigField, ConfigSet, Error, LinkStage, Outbox, PartialConfig, Result, StateMachine,
    constants::{INBOUND_EVENT_TAG, PUBLISH_QUEUE_CAPACITY, RX_BUFFER_SIZE},
};
use doorlink_protocol::{Command, Frame, Token};

use crate::{
    config::GatewayConfig,
    lifecycle::ConnectionState,
    network::{BrokerClient, BrokerError, ConnectStatus, InboundMessage, JoinStatus, NetworkJoin},
};

/// Longest inbound body the terminal's receive buffer can hold.
const MAX_FORWARD_BODY: usize = RX_BUFFER_SIZE - INBOUND_EVENT_TAG.len();

/// Repair of a dropped broker link while `Ready`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reconnect {
    /// Network was down; waiting for the rejoin.
    Network { started: Instant },
    /// Waiting for the broker connect.
    Broker { started: Instant },
}

/// Gateway node state and collaborators.
pub struct Gateway<N, B> {
    config: GatewayConfig,
    machine: StateMachine<ConnectionState>,
    pending: PartialConfig,
    active: Option<ConfigSet>,
    outbox: Outbox<String, PUBLISH_QUEUE_CAPACITY>,
    network: N,
    broker: B,
    reconnect: Option<Reconnect>,
    last_reconnect: Option<Instant>,
}

impl<N: NetworkJoin, B: BrokerClient> Gateway<N, B> {
    pub fn new(config: GatewayConfig, network: N, broker: B, now: Instant) -> Self {
        let outbox = Outbox::new(config.publish_retry());
        Self {
            config,
            machine: StateMachine::new(ConnectionState::Boot, now),
            pending: PartialConfig::new(),
            active: None,
            outbox,
            network,
            broker,
            reconnect: None,
            last_reconnect: None,
        }
    }

    /// Announce the gateway and ask for the handshake.
    ///
    /// Only meaningful in `Boot`; later calls return nothing.
    pub fn start(&mut self, now: Instant) -> Vec<Frame> {
        if self.state() != ConnectionState::Boot {
            debug!(state = %self.state(), "gateway already started");
            return Vec::new();
        }
        info!("Gateway booted, requesting configuration");
        self.enter(ConnectionState::WaitConfig, now);
        vec![Token::BootDone.to_frame(), Token::ReqConfig.to_frame()]
    }

    /// Process one frame received from the terminal.
    pub fn handle_frame(&mut self, frame: Frame, now: Instant) -> Vec<Frame> {
        trace!(frame = %frame, "gateway received");
        match frame {
            Frame::Outbound(body) => self.accept_event(body),
            Frame::Inbound(body) => {
                warn!(len = body.len(), "ignoring broker-bound frame from terminal");
                Vec::new()
            }
            Frame::Command(content) => self.handle_command(Command::parse(&content), now),
        }
    }

    /// Report a framing failure back to the terminal.
    pub fn handle_frame_error(&mut self, err: &Error) -> Vec<Frame> {
        warn!(error = %err, "dropped frame from terminal");
        vec![Frame::command(err.diagnostic())]
    }

    /// Advance timers and collaborators.
    pub fn poll(&mut self, now: Instant) -> Vec<Frame> {
        match self.state() {
            ConnectionState::Boot | ConnectionState::WaitConfig => Vec::new(),
            ConnectionState::ConnectNetwork => self.poll_network(now),
            ConnectionState::ConnectBroker => self.poll_broker(now),
            ConnectionState::Ready => self.poll_ready(now),
            ConnectionState::Error => self.poll_error(now),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.current()
    }

    pub fn machine(&self) -> &StateMachine<ConnectionState> {
        &self.machine
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Handshake fields received so far.
    pub fn pending_config(&self) -> &PartialConfig {
        &self.pending
    }

    /// Configuration the current connection cycle runs on.
    pub fn active_config(&self) -> Option<&ConfigSet> {
        self.active.as_ref()
    }

    pub fn outbox(&self) -> &Outbox<String, PUBLISH_QUEUE_CAPACITY> {
        &self.outbox
    }

    /// Whether a broker link repair is in flight.
    pub fn is_reconnecting(&self) -> bool {
        self.reconnect.is_some()
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    pub fn broker_mut(&mut self) -> &mut B {
        &mut self.broker
    }

    // ========================================================================
    // Terminal frames
    // ========================================================================

    fn handle_command(&mut self, command: Command, now: Instant) -> Vec<Frame> {
        match command {
            Command::Config { field, value } => self.accept_field(field, &value),
            Command::Token(Token::Connect) => self.accept_connect(now),
            Command::Token(Token::TermBoot) => self.terminal_restarted(),
            Command::Token(token @ (Token::FrameOverflow | Token::MalformedEvent)) => {
                warn!(diagnostic = %token, "terminal reported a dropped frame");
                Vec::new()
            }
            Command::UnknownCommand(content) => {
                debug!(content = %content, "terminal did not recognise a frame");
                Vec::new()
            }
            Command::Token(token) => {
                debug!(token = %token, "ignoring gateway-bound token from terminal");
                Vec::new()
            }
            Command::BrokerFailure { code } => {
                debug!(code, "ignoring broker diagnostic from terminal");
                Vec::new()
            }
            Command::Other(content) => {
                warn!(content = %content, "unrecognised command");
                vec![Command::UnknownCommand(content).to_frame()]
            }
        }
    }

    fn accept_field(&mut self, field: ConfigField, value: &str) -> Vec<Frame> {
        if !self.state().accepts_config() {
            let err = Error::ConfigLocked {
                state: self.state().to_string(),
            };
            warn!(field = %field, error = %err, "config field refused");
            return vec![Token::ConfigLocked.to_frame()];
        }

        match self.pending.set(field, value) {
            Ok(()) => {
                debug!(field = %field, "config field stored");
                vec![Token::FieldOk(field).to_frame()]
            }
            Err(err) => {
                warn!(field = %field, error = %err, "config field rejected");
                vec![Token::FieldInvalid(field).to_frame()]
            }
        }
    }

    fn accept_connect(&mut self, now: Instant) -> Vec<Frame> {
        match self.state() {
            ConnectionState::WaitConfig => match self.pending.build() {
                Ok(set) => {
                    self.begin_network(set, now);
                    Vec::new()
                }
                Err(err) => {
                    warn!(error = %err, "CONNECT before handshake finished");
                    vec![Token::ConfigIncomplete.to_frame()]
                }
            },
            ConnectionState::Ready => {
                debug!("CONNECT while ready, re-announcing");
                vec![Token::SysReady.to_frame()]
            }
            state if state.is_connecting() => {
                debug!(state = %state, "CONNECT ignored, attempt already in flight");
                Vec::new()
            }
            state => {
                debug!(state = %state, "CONNECT ignored");
                Vec::new()
            }
        }
    }

    fn terminal_restarted(&mut self) -> Vec<Frame> {
        info!(state = %self.state(), "Terminal restarted");
        if self.state().accepts_config() {
            vec![Token::ReqConfig.to_frame()]
        } else {
            Vec::new()
        }
    }

    fn accept_event(&mut self, body: String) -> Vec<Frame> {
        if !body.trim_start().starts_with('{') {
            let err = Error::MalformedFrame("access event is not a JSON object".to_string());
            warn!(len = body.len(), error = %err, "access event discarded");
            return vec![Frame::command(err.diagnostic())];
        }

        if !self.state().accepts_events() {
            warn!(state = %self.state(), "access event refused, link not ready");
            return vec![Token::PubFail.to_frame()];
        }

        if self.outbox.contains(&body) {
            debug!("access event already queued");
            return vec![Token::PubQueued.to_frame()];
        }

        match self.outbox.push(body) {
            Ok(()) => {
                debug!(queued = self.outbox.len(), "access event queued");
                vec![Token::PubQueued.to_frame()]
            }
            Err(err) => {
                warn!(error = %err, "access event dropped");
                vec![Token::PubFail.to_frame()]
            }
        }
    }

    // ========================================================================
    // Connection lifecycle
    // ========================================================================

    fn begin_network(&mut self, set: ConfigSet, now: Instant) {
        info!(ssid = %set.ssid, broker = %set.broker_addr(), "Joining network");
        self.network.begin_join(&set.ssid, &set.password, now);
        self.active = Some(set);
        self.enter(ConnectionState::ConnectNetwork, now);
        self.machine.set_timeout(self.config.join_timeout());
    }

    fn poll_network(&mut self, now: Instant) -> Vec<Frame> {
        match self.network.poll_join(now) {
            JoinStatus::Connected => {
                info!("Network joined");
                match self.begin_broker(now) {
                    Ok(()) => vec![Token::WifiOk.to_frame()],
                    Err(err) => {
                        error!(error = %err, "broker connect impossible");
                        self.network.disconnect();
                        self.enter_error(now);
                        vec![Token::WifiOk.to_frame(), Frame::command(err.diagnostic())]
                    }
                }
            }
            JoinStatus::Failed => self.fail_network("join refused", now),
            JoinStatus::Pending if self.machine.has_timed_out(now) => {
                self.fail_network("join timed out", now)
            }
            JoinStatus::Pending => Vec::new(),
        }
    }

    fn fail_network(&mut self, reason: &str, now: Instant) -> Vec<Frame> {
        let err = Error::TransientLinkFailure {
            stage: LinkStage::NetworkJoin,
            reason: reason.to_string(),
        };
        warn!(error = %err, "network join failed");
        self.network.disconnect();
        self.enter_error(now);
        vec![Token::WifiFail.to_frame()]
    }

    /// Start the broker connect with the configuration the join used.
    ///
    /// Fails with `Error::InvalidStateTransition` when no configuration is
    /// active, leaving the caller to enter `Error`.
    fn begin_broker(&mut self, now: Instant) -> Result<()> {
        let Some(set) = &self.active else {
            return Err(Error::InvalidStateTransition {
                from: self.state().to_string(),
                to: ConnectionState::ConnectBroker.to_string(),
            });
        };
        let options = self.config.connect_options(&set.broker, set.port);
        info!(broker = %set.broker_addr(), client_id = %options.client_id, "Connecting to broker");
        self.broker.begin_connect(&options, now);
        self.enter(ConnectionState::ConnectBroker, now);
        self.machine.set_timeout(self.config.broker_timeout());
        Ok(())
    }

    fn poll_broker(&mut self, now: Instant) -> Vec<Frame> {
        match self.broker.poll_connect(now) {
            ConnectStatus::Connected => self.finish_broker(now),
            ConnectStatus::Failed(err) => self.fail_broker(err, now),
            ConnectStatus::Pending if self.machine.has_timed_out(now) => {
                self.broker.disconnect();
                self.fail_broker(BrokerError::timeout(), now)
            }
            ConnectStatus::Pending => Vec::new(),
        }
    }

    fn finish_broker(&mut self, now: Instant) -> Vec<Frame> {
        if let Err(err) = self.broker.subscribe(&self.config.result_topic) {
            let err = Error::TransientLinkFailure {
                stage: LinkStage::Subscribe,
                reason: err.to_string(),
            };
            warn!(topic = %self.config.result_topic, error = %err, "subscribe failed");
            self.broker.disconnect();
            self.enter_error(now);
            return vec![Token::SubFail.to_frame()];
        }

        info!(topic = %self.config.result_topic, "Broker connected, link ready");
        self.enter(ConnectionState::Ready, now);
        self.reconnect = None;
        self.last_reconnect = None;
        vec![Token::BrkOk.to_frame(), Token::SysReady.to_frame()]
    }

    fn fail_broker(&mut self, err: BrokerError, now: Instant) -> Vec<Frame> {
        let code = err.code;
        let err = Error::TransientLinkFailure {
            stage: LinkStage::BrokerConnect,
            reason: err.to_string(),
        };
        warn!(code, error = %err, "broker connect failed");
        self.enter_error(now);
        vec![Command::BrokerFailure { code }.to_frame()]
    }

    fn enter_error(&mut self, now: Instant) {
        self.enter(ConnectionState::Error, now);
        self.machine.set_timeout(self.config.error_cooldown());
    }

    fn poll_error(&mut self, now: Instant) -> Vec<Frame> {
        if !self.machine.has_timed_out(now) {
            return Vec::new();
        }

        info!("Error cooldown elapsed, requesting configuration again");
        self.pending.clear();
        self.active = None;
        self.outbox.clear();
        self.reconnect = None;
        self.last_reconnect = None;
        self.broker.disconnect();
        self.network.disconnect();
        self.enter(ConnectionState::WaitConfig, now);
        vec![Token::ReqConfig.to_frame()]
    }

    fn enter(&mut self, next: ConnectionState, now: Instant) {
        match self.machine.transition_to(next, now) {
            Ok(transition) => {
                info!(from = %transition.from, to = %transition.to, "Gateway state changed");
            }
            Err(err) => error!(error = %err, "gateway transition rejected"),
        }
    }

    // ========================================================================
    // Ready
    // ========================================================================

    fn poll_ready(&mut self, now: Instant) -> Vec<Frame> {
        let mut frames = Vec::new();

        while let Some(message) = self.broker.poll_inbound() {
            frames.extend(self.forward(message));
        }

        frames.extend(self.check_link(now));

        if self.reconnect.is_none() && self.broker.is_connected() {
            frames.extend(self.publish_head(now));
        }
        frames
    }

    fn forward(&mut self, message: InboundMessage) -> Option<Frame> {
        if message.topic != self.config.result_topic {
            debug!(topic = %message.topic, "ignoring message on foreign topic");
            return None;
        }

        let body = message.payload.replace(['\r', '\n'], " ");
        let body = body.trim();
        if body.is_empty() {
            debug!("ignoring empty broker message");
            return None;
        }
        if body.len() > MAX_FORWARD_BODY {
            warn!(
                len = body.len(),
                max = MAX_FORWARD_BODY,
                "broker message too large for terminal, dropped"
            );
            return None;
        }

        trace!(body = %body, "forwarding broker message");
        Some(Frame::Inbound(body.to_string()))
    }

    fn publish_head(&mut self, now: Instant) -> Vec<Frame> {
        let Some(body) = self.outbox.poll_send(now).cloned() else {
            return Vec::new();
        };

        match self.broker.publish(&self.config.request_topic, &body) {
            Ok(()) => {
                self.outbox.acknowledge();
                info!(topic = %self.config.request_topic, "Access event published");
                vec![Token::PubOk.to_frame()]
            }
            Err(err) => {
                warn!(
                    attempts = self.outbox.attempts(),
                    error = %err,
                    "publish failed, will retry"
                );
                self.outbox.reject(now);
                Vec::new()
            }
        }
    }

    /// Repair a dropped broker link, starting at most one attempt per
    /// reconnect interval.
    fn check_link(&mut self, now: Instant) -> Vec<Frame> {
        match self.reconnect {
            Some(Reconnect::Network { started }) => self.advance_rejoin(started, now),
            Some(Reconnect::Broker { started }) => self.advance_reconnect(started, now),
            None if self.broker.is_connected() => Vec::new(),
            None => {
                let due = self.last_reconnect.is_none_or(|last| {
                    now.saturating_duration_since(last) >= self.config.reconnect_interval()
                });
                if due {
                    self.start_reconnect(now);
                }
                Vec::new()
            }
        }
    }

    fn start_reconnect(&mut self, now: Instant) {
        let Some(set) = &self.active else {
            error!("reconnect without an active configuration");
            return;
        };
        self.last_reconnect = Some(now);

        if self.network.is_connected() {
            info!(broker = %set.broker_addr(), "Broker link lost, reconnecting");
            let options = self.config.connect_options(&set.broker, set.port);
            self.broker.begin_connect(&options, now);
            self.reconnect = Some(Reconnect::Broker { started: now });
        } else {
            info!(ssid = %set.ssid, "Network lost, rejoining");
            self.network.begin_join(&set.ssid, &set.password, now);
            self.reconnect = Some(Reconnect::Network { started: now });
        }
    }

    fn advance_rejoin(&mut self, started: Instant, now: Instant) -> Vec<Frame> {
        match self.network.poll_join(now) {
            JoinStatus::Connected => {
                if let Some(set) = &self.active {
                    info!("Network rejoined, reconnecting broker");
                    let options = self.config.connect_options(&set.broker, set.port);
                    self.broker.begin_connect(&options, now);
                    self.reconnect = Some(Reconnect::Broker { started: now });
                } else {
                    self.reconnect = None;
                }
            }
            JoinStatus::Failed => {
                warn!("network rejoin refused");
                self.reconnect = None;
            }
            JoinStatus::Pending
                if now.saturating_duration_since(started) >= self.config.join_timeout() =>
            {
                warn!("network rejoin timed out");
                self.network.disconnect();
                self.reconnect = None;
            }
            JoinStatus::Pending => {}
        }
        Vec::new()
    }

    fn advance_reconnect(&mut self, started: Instant, now: Instant) -> Vec<Frame> {
        match self.broker.poll_connect(now) {
            ConnectStatus::Connected => {
                self.reconnect = None;
                match self.broker.subscribe(&self.config.result_topic) {
                    Ok(()) => {
                        info!("Broker link restored");
                        vec![Token::BrkReconn.to_frame()]
                    }
                    Err(err) => {
                        warn!(error = %err, "resubscribe failed");
                        self.broker.disconnect();
                        Vec::new()
                    }
                }
            }
            ConnectStatus::Failed(err) => {
                warn!(code = err.code, error = %err, "broker reconnect failed");
                self.reconnect = None;
                Vec::new()
            }
            ConnectStatus::Pending
                if now.saturating_duration_since(started) >= self.config.broker_timeout() =>
            {
                warn!("broker reconnect timed out");
                self.broker.disconnect();
                self.reconnect = None;
                Vec::new()
            }
            ConnectStatus::Pending => Vec::new(),
        }
    }
}

impl<N, B> std::fmt::Debug for Gateway<N, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("state", &self.machine.current())
            .field("pending", &self.pending)
            .field("active", &self.active)
            .field("queued", &self.outbox.len())
            .field("reconnect", &self.reconnect)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBroker, MockNetwork};

    #[test]
    fn test_join_without_active_config_fails_safe() {
        let t0 = Instant::now();
        let mut gateway = Gateway::new(
            GatewayConfig::default(),
            MockNetwork::new(),
            MockBroker::new(),
            t0,
        );
        gateway.start(t0);
        gateway.network.begin_join("lobby", "secret", t0);
        gateway
            .machine
            .transition_to(ConnectionState::ConnectNetwork, t0)
            .unwrap();

        let frames = gateway.poll(t0);
        assert_eq!(
            frames,
            vec![Token::WifiOk.to_frame(), Frame::command("STATE_ERROR")]
        );
        assert_eq!(gateway.state(), ConnectionState::Error);
        assert!(gateway.broker().connects().is_empty());
        assert!(!gateway.network().is_connected());
    }
}
