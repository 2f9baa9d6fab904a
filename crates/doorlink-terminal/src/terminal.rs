//! Terminal context: companion state machine, handshake pacing, card scans
//! and access results.
//!
//! Like the gateway, the terminal is sans-IO. [`Terminal::handle_frame`]
//! consumes one frame from the gateway, [`Terminal::poll`] advances timers,
//! the reader and the outbox, and both return the frames to send.
//!
//! ```text
//! gateway frames ──> handle_frame ──> results ──> ResultVerifier ──> LEDs
//! tick (now)     ──> poll ──> CardReader ──> ScanDebouncer ──> Outbox ──> MQTT_TX
//! ```
//!
//! Event timestamps are milliseconds since the context was created.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace, warn};

use doorlink_core::{
    CardUid, Error, Outbox, StateMachine,
    constants::{ACK_FLASH_MS, NACK_FLASH_MS, PUBLISH_QUEUE_CAPACITY, SCAN_FLASH_MS},
};
use doorlink_protocol::{AccessEvent, AccessResult, Command, Frame, Token, Verdict};

use crate::{
    companion::TerminalState,
    config::TerminalConfig,
    debounce::ScanDebouncer,
    handshake::HandshakeSender,
    indicator::{Indicator, IndicatorPanel, Led},
    reader::CardReader,
    verify::ResultVerifier,
};

/// Terminal node state and peripherals.
pub struct Terminal<R, I> {
    config: TerminalConfig,
    machine: StateMachine<TerminalState>,
    booted_at: Instant,
    handshake: HandshakeSender,
    outbox: Outbox<AccessEvent, PUBLISH_QUEUE_CAPACITY>,
    debouncer: ScanDebouncer,
    last_scan: Option<Instant>,
    verifier: ResultVerifier,
    reader: R,
    panel: IndicatorPanel<I>,
    last_verdict: Option<Verdict>,
}

impl<R: CardReader, I: Indicator> Terminal<R, I> {
    pub fn new(config: TerminalConfig, reader: R, indicator: I, now: Instant) -> Self {
        let timings = &config.timings;
        let handshake = HandshakeSender::new(timings.frame_spacing());
        let outbox = Outbox::new(timings.publish_retry());
        let debouncer = ScanDebouncer::new(timings.debounce());
        let verifier = ResultVerifier::new(
            config.door_id.clone(),
            timings.result_max_age(),
            config.require_verification,
        );
        Self {
            config,
            machine: StateMachine::new(TerminalState::Boot, now),
            booted_at: now,
            handshake,
            outbox,
            debouncer,
            last_scan: None,
            verifier,
            reader,
            panel: IndicatorPanel::new(indicator),
            last_verdict: None,
        }
    }

    /// Announce the terminal and start waiting for the gateway.
    ///
    /// Only meaningful in `Boot`; later calls return nothing.
    pub fn start(&mut self, now: Instant) -> Vec<Frame> {
        if self.state() != TerminalState::Boot {
            debug!(state = %self.state(), "terminal already started");
            return Vec::new();
        }
        info!(door_id = %self.config.door_id, "Terminal booted, waiting for gateway");
        self.enter(TerminalState::WaitPeer, now);
        self.machine.set_timeout(self.config.timings.boot_wait());
        vec![Token::TermBoot.to_frame()]
    }

    /// Process one frame received from the gateway.
    pub fn handle_frame(&mut self, frame: Frame, now: Instant) -> Vec<Frame> {
        trace!(frame = %frame, "terminal received");
        self.panel.update(now);
        match frame {
            Frame::Inbound(body) => self.accept_result(&body, now),
            Frame::Outbound(body) => {
                warn!(len = body.len(), "ignoring gateway-bound frame from gateway");
                Vec::new()
            }
            Frame::Command(content) => {
                self.handle_command(Command::parse(&content), now);
                Vec::new()
            }
        }
    }

    /// Report a framing failure back to the gateway.
    pub fn handle_frame_error(&mut self, err: &Error) -> Vec<Frame> {
        warn!(error = %err, "dropped frame from gateway");
        vec![Frame::command(err.diagnostic())]
    }

    /// Advance timers, the handshake, the reader and the outbox.
    pub fn poll(&mut self, now: Instant) -> Vec<Frame> {
        self.panel.update(now);

        match self.state() {
            TerminalState::Boot => Vec::new(),
            TerminalState::WaitPeer => {
                if self.machine.has_timed_out(now) {
                    info!("No configuration request from gateway, sending anyway");
                    self.restart_handshake(now);
                    self.send_handshake(now)
                } else {
                    Vec::new()
                }
            }
            TerminalState::SendConfig => self.send_handshake(now),
            TerminalState::WaitReady => {
                if self.machine.has_timed_out(now) {
                    warn!(
                        timeout_ms = self.config.timings.handshake_timeout_ms,
                        "gateway never reported ready"
                    );
                    self.enter_error(now);
                }
                Vec::new()
            }
            TerminalState::Operational => {
                self.scan(now);
                self.send_head(now).into_iter().collect()
            }
            TerminalState::Error => {
                if self.machine.has_timed_out(now) {
                    info!("Error cooldown elapsed, resending configuration");
                    self.restart_handshake(now);
                    self.send_handshake(now)
                } else {
                    Vec::new()
                }
            }
        }
    }

    pub fn state(&self) -> TerminalState {
        self.machine.current()
    }

    pub fn machine(&self) -> &StateMachine<TerminalState> {
        &self.machine
    }

    pub fn config(&self) -> &TerminalConfig {
        &self.config
    }

    /// Milliseconds since boot, the clock event timestamps are taken from.
    pub fn uptime_ms(&self, now: Instant) -> u64 {
        let uptime = now.saturating_duration_since(self.booted_at);
        u64::try_from(uptime.as_millis()).unwrap_or(u64::MAX)
    }

    pub fn outbox(&self) -> &Outbox<AccessEvent, PUBLISH_QUEUE_CAPACITY> {
        &self.outbox
    }

    pub fn handshake(&self) -> &HandshakeSender {
        &self.handshake
    }

    pub fn verifier(&self) -> &ResultVerifier {
        &self.verifier
    }

    /// Effective verdict of the last access result.
    pub fn last_verdict(&self) -> Option<Verdict> {
        self.last_verdict
    }

    pub fn panel(&self) -> &IndicatorPanel<I> {
        &self.panel
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    // ========================================================================
    // Gateway frames
    // ========================================================================

    fn handle_command(&mut self, command: Command, now: Instant) {
        match command {
            Command::Token(Token::ReqConfig) => {
                if self.state() == TerminalState::Boot {
                    debug!("configuration requested before start");
                } else {
                    info!(state = %self.state(), "Gateway requested configuration");
                    self.restart_handshake(now);
                }
            }
            Command::Token(Token::ConfigIncomplete) => {
                if self.state().is_handshaking() {
                    warn!("gateway reported an incomplete handshake, resending");
                    self.restart_handshake(now);
                } else {
                    debug!(state = %self.state(), "ignoring CONFIG_INCOMPLETE");
                }
            }
            Command::Token(Token::SysReady) => self.gateway_ready(now),
            Command::Token(Token::PubOk) => self.publish_acknowledged(now),
            Command::Token(Token::PubFail) => self.publish_refused(now),
            ref failure if failure.is_link_failure() => {
                if matches!(self.state(), TerminalState::Boot | TerminalState::WaitPeer) {
                    debug!(report = %failure, "ignoring link failure before handshake");
                } else if self.state() != TerminalState::Error {
                    warn!(report = %failure, "gateway reported a link failure");
                    self.enter_error(now);
                }
            }
            Command::Token(Token::FieldInvalid(field)) => {
                warn!(field = %field, "gateway rejected a config field");
            }
            Command::Token(token @ (Token::FrameOverflow | Token::MalformedEvent)) => {
                warn!(diagnostic = %token, "gateway reported a dropped frame");
            }
            Command::Token(token @ (Token::WifiOk | Token::BrkOk | Token::BrkReconn)) => {
                info!(status = %token, "Gateway link status");
            }
            Command::Token(token) => {
                debug!(token = %token, "gateway status");
            }
            Command::UnknownCommand(content) => {
                debug!(content = %content, "gateway did not recognise a frame");
            }
            Command::Config { field, .. } => {
                debug!(field = %field, "ignoring config field from gateway");
            }
            Command::BrokerFailure { code } => {
                debug!(code, "ignoring broker failure report");
            }
            Command::Other(content) => {
                warn!(content = %content, "unrecognised command from gateway");
            }
        }
    }

    fn gateway_ready(&mut self, now: Instant) {
        match self.state() {
            TerminalState::WaitReady => {
                info!(queued = self.outbox.len(), "Gateway ready, terminal operational");
                self.enter(TerminalState::Operational, now);
            }
            TerminalState::Operational => debug!("gateway re-announced ready"),
            state => debug!(state = %state, "ignoring SYS_READY"),
        }
    }

    fn publish_acknowledged(&mut self, now: Instant) {
        match self.outbox.acknowledge() {
            Some(event) => {
                info!(card_id = %event.card_id, timestamp = event.timestamp, "Access event published");
            }
            None => debug!("PUB_OK with nothing queued"),
        }
        self.flash(Led::Ok, ACK_FLASH_MS, now);
    }

    fn publish_refused(&mut self, now: Instant) {
        warn!(
            attempts = self.outbox.attempts(),
            queued = self.outbox.len(),
            "gateway refused the access event, will retry"
        );
        self.outbox.reject(now);
        self.flash(Led::Deny, NACK_FLASH_MS, now);
    }

    fn accept_result(&mut self, body: &str, now: Instant) -> Vec<Frame> {
        if !self.state().is_operational() {
            warn!(state = %self.state(), "access result outside operation, ignored");
            return Vec::new();
        }

        let result = match AccessResult::parse(body) {
            Ok(result) => result,
            Err(err) => {
                warn!(error = %err, "unreadable access result, denying");
                self.show(Verdict::Deny);
                return vec![Frame::command(err.diagnostic())];
            }
        };

        let uptime = self.uptime_ms(now);
        match self.verifier.check(&result, uptime) {
            Ok(Some(verdict)) => {
                info!(verdict = ?verdict, card_id = ?result.card_id, "Access result");
                self.show(verdict);
            }
            Ok(None) => {
                debug!(
                    card_id = ?result.card_id,
                    timestamp = ?result.timestamp,
                    "duplicate access result dropped"
                );
            }
            Err(err) => {
                warn!(
                    error = %err,
                    backend_verdict = ?result.verdict,
                    "access result failed verification, denying"
                );
                self.show(Verdict::Deny);
            }
        }
        Vec::new()
    }

    fn show(&mut self, verdict: Verdict) {
        self.last_verdict = Some(verdict);
        self.panel.show_verdict(verdict);
    }

    // ========================================================================
    // Handshake and recovery
    // ========================================================================

    fn restart_handshake(&mut self, now: Instant) {
        self.handshake.begin(&self.config.credentials, now);
        if self.state() == TerminalState::SendConfig {
            debug!("handshake restarted");
        } else {
            self.enter(TerminalState::SendConfig, now);
        }
    }

    fn send_handshake(&mut self, now: Instant) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.handshake.poll(now) {
            trace!(frame = %frame, "handshake frame due");
            frames.push(frame);
        }

        if self.handshake.is_done() {
            debug!(frames = self.handshake.sent(), "handshake sent");
            self.enter(TerminalState::WaitReady, now);
            self.machine
                .set_timeout(self.config.timings.handshake_timeout());
        }
        frames
    }

    fn enter_error(&mut self, now: Instant) {
        self.handshake.cancel();
        self.enter(TerminalState::Error, now);
        self.machine.set_timeout(self.config.timings.error_cooldown());
    }

    fn enter(&mut self, next: TerminalState, now: Instant) {
        match self.machine.transition_to(next, now) {
            Ok(transition) => {
                info!(from = %transition.from, to = %transition.to, "Terminal state changed");
                if transition.to == TerminalState::Error {
                    self.panel.set_steady(Led::Deny, true);
                } else if transition.from == TerminalState::Error {
                    self.panel.set_steady(Led::Deny, false);
                }
            }
            Err(err) => error!(error = %err, "terminal transition rejected"),
        }
    }

    // ========================================================================
    // Operational
    // ========================================================================

    fn scan(&mut self, now: Instant) {
        let due = self.last_scan.is_none_or(|last| {
            now.saturating_duration_since(last) >= self.config.timings.scan_interval()
        });
        if !due {
            return;
        }
        self.last_scan = Some(now);

        let Some(uid) = self.reader.poll_card(now) else {
            return;
        };
        if !self.debouncer.accept(&uid, now) {
            trace!(card_id = %uid, "card still in field");
            return;
        }
        self.queue_event(uid, now);
    }

    fn queue_event(&mut self, uid: CardUid, now: Instant) {
        let event = AccessEvent::new(
            uid,
            self.config.door_id.clone(),
            self.uptime_ms(now),
            self.config.auth_token.clone(),
        );
        let card_id = event.card_id.clone();
        let timestamp = event.timestamp;
        let sig = event.sig.to_string();

        match self.outbox.push(event) {
            Ok(()) => {
                info!(card_id = %card_id, timestamp, sig = %sig, "Card scanned");
                self.flash(Led::Ok, SCAN_FLASH_MS, now);
            }
            Err(err) => {
                warn!(card_id = %card_id, error = %err, "access event dropped");
                self.flash(Led::Deny, NACK_FLASH_MS, now);
            }
        }
    }

    fn send_head(&mut self, now: Instant) -> Option<Frame> {
        let event = self.outbox.poll_send(now)?.clone();
        match event.to_body() {
            Ok(body) => {
                debug!(
                    card_id = %event.card_id,
                    attempt = self.outbox.attempts(),
                    "sending access event"
                );
                Some(Frame::Outbound(body))
            }
            Err(err) => {
                error!(error = %err, "access event not encodable, dropped");
                self.outbox.acknowledge();
                None
            }
        }
    }

    fn flash(&mut self, led: Led, millis: u64, now: Instant) {
        self.panel.flash(led, Duration::from_millis(millis), now);
    }
}

impl<R, I> std::fmt::Debug for Terminal<R, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("door_id", &self.config.door_id)
            .field("state", &self.machine.current())
            .field("queued", &self.outbox.len())
            .field("last_verdict", &self.last_verdict)
            .finish_non_exhaustive()
    }
}
