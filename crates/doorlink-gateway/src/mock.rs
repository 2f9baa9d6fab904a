//! Scripted network and broker collaborators for testing and simulation.
//!
//! Both mocks decide the outcome of each attempt from a configurable
//! behaviour and the `now` passed in by the gateway, so tests drive them with
//! synthetic instants and never sleep.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//! use doorlink_gateway::mock::{JoinBehavior, MockNetwork};
//! use doorlink_gateway::network::{JoinStatus, NetworkJoin};
//!
//! let t0 = Instant::now();
//! let mut network = MockNetwork::with_behavior(JoinBehavior::Succeed {
//!     after: Duration::from_millis(500),
//! });
//!
//! network.begin_join("lobby", "secret", t0);
//! assert_eq!(network.poll_join(t0), JoinStatus::Pending);
//! assert_eq!(network.poll_join(t0 + Duration::from_millis(500)), JoinStatus::Connected);
//! assert!(network.is_connected());
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use crate::network::{
    BrokerClient, BrokerError, ConnectOptions, ConnectStatus, InboundMessage, JoinStatus,
    NetworkJoin,
};

/// Return code the mock broker reports for a refused publish.
pub const PUBLISH_REFUSED_RC: i32 = -1;

/// How the mock network answers a join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinBehavior {
    /// Join completes once `after` has elapsed.
    Succeed { after: Duration },
    /// Join is refused on the first poll.
    Refuse,
    /// Join never completes.
    Hang,
}

/// Credentials of one join attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinAttempt {
    pub ssid: String,
    pub password: String,
}

/// Mock wireless network
#[derive(Debug)]
pub struct MockNetwork {
    behavior: JoinBehavior,
    started: Option<Instant>,
    connected: bool,
    attempts: Vec<JoinAttempt>,
}

impl MockNetwork {
    /// Network that accepts every join immediately.
    pub fn new() -> Self {
        Self::with_behavior(JoinBehavior::Succeed {
            after: Duration::ZERO,
        })
    }

    pub fn with_behavior(behavior: JoinBehavior) -> Self {
        Self {
            behavior,
            started: None,
            connected: false,
            attempts: Vec::new(),
        }
    }

    /// Change how subsequent joins are answered.
    pub fn set_behavior(&mut self, behavior: JoinBehavior) {
        self.behavior = behavior;
    }

    /// Simulate losing the access point.
    pub fn drop_link(&mut self) {
        self.connected = false;
    }

    /// Every join attempt so far, oldest first.
    pub fn attempts(&self) -> &[JoinAttempt] {
        &self.attempts
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkJoin for MockNetwork {
    fn begin_join(&mut self, ssid: &str, password: &str, now: Instant) {
        self.connected = false;
        self.started = Some(now);
        self.attempts.push(JoinAttempt {
            ssid: ssid.to_string(),
            password: password.to_string(),
        });
    }

    fn poll_join(&mut self, now: Instant) -> JoinStatus {
        if self.connected {
            return JoinStatus::Connected;
        }
        let Some(started) = self.started else {
            return JoinStatus::Failed;
        };

        match self.behavior {
            JoinBehavior::Succeed { after } if now.saturating_duration_since(started) >= after => {
                self.connected = true;
                self.started = None;
                JoinStatus::Connected
            }
            JoinBehavior::Succeed { .. } | JoinBehavior::Hang => JoinStatus::Pending,
            JoinBehavior::Refuse => {
                self.started = None;
                JoinStatus::Failed
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.started = None;
    }
}

/// How the mock broker answers a connect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehavior {
    /// Connect completes once `after` has elapsed.
    Accept { after: Duration },
    /// Connect is refused with the given return code.
    Refuse { code: i32 },
    /// Connect never completes.
    Hang,
}

/// Backend hook answering a publish with an optional message.
///
/// Called with `(topic, payload)` for every accepted publish.
pub type Responder = Box<dyn FnMut(&str, &str) -> Option<InboundMessage> + Send>;

/// Mock broker client
pub struct MockBroker {
    behavior: ConnectBehavior,
    started: Option<Instant>,
    connected: bool,
    connects: Vec<ConnectOptions>,
    subscriptions: Vec<String>,
    refuse_subscribe: bool,
    refuse_publishes: usize,
    published: Vec<(String, String)>,
    inbound: VecDeque<InboundMessage>,
    responder: Option<Responder>,
}

impl MockBroker {
    /// Broker that accepts every connect immediately.
    pub fn new() -> Self {
        Self::with_behavior(ConnectBehavior::Accept {
            after: Duration::ZERO,
        })
    }

    pub fn with_behavior(behavior: ConnectBehavior) -> Self {
        Self {
            behavior,
            started: None,
            connected: false,
            connects: Vec::new(),
            subscriptions: Vec::new(),
            refuse_subscribe: false,
            refuse_publishes: 0,
            published: Vec::new(),
            inbound: VecDeque::new(),
            responder: None,
        }
    }

    /// Answer publishes through `responder`, queueing whatever it returns as
    /// an inbound message.
    pub fn with_responder(mut self, responder: Responder) -> Self {
        self.responder = Some(responder);
        self
    }

    pub fn set_behavior(&mut self, behavior: ConnectBehavior) {
        self.behavior = behavior;
    }

    /// Make subsequent subscribes fail.
    pub fn set_refuse_subscribe(&mut self, refuse: bool) {
        self.refuse_subscribe = refuse;
    }

    /// Refuse the next `count` publishes.
    pub fn refuse_publishes(&mut self, count: usize) {
        self.refuse_publishes = count;
    }

    /// Simulate the broker dropping the session.
    pub fn drop_link(&mut self) {
        self.connected = false;
    }

    /// Queue a message as if the broker delivered it.
    pub fn deliver(&mut self, topic: &str, payload: &str) {
        self.inbound.push_back(InboundMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
    }

    /// Options of every connect attempt so far, oldest first.
    pub fn connects(&self) -> &[ConnectOptions] {
        &self.connects
    }

    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    /// Accepted publishes as `(topic, payload)`, oldest first.
    pub fn published(&self) -> &[(String, String)] {
        &self.published
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockBroker")
            .field("behavior", &self.behavior)
            .field("connected", &self.connected)
            .field("connects", &self.connects.len())
            .field("subscriptions", &self.subscriptions)
            .field("published", &self.published.len())
            .field("inbound", &self.inbound.len())
            .field("responder", &self.responder.is_some())
            .finish()
    }
}

impl BrokerClient for MockBroker {
    fn begin_connect(&mut self, options: &ConnectOptions, now: Instant) {
        self.connected = false;
        self.started = Some(now);
        self.connects.push(options.clone());
    }

    fn poll_connect(&mut self, now: Instant) -> ConnectStatus {
        if self.connected {
            return ConnectStatus::Connected;
        }
        let Some(started) = self.started else {
            return ConnectStatus::Failed(BrokerError::new(-3, "no connect in progress"));
        };

        match self.behavior {
            ConnectBehavior::Accept { after } if now.saturating_duration_since(started) >= after => {
                self.connected = true;
                self.started = None;
                ConnectStatus::Connected
            }
            ConnectBehavior::Accept { .. } | ConnectBehavior::Hang => ConnectStatus::Pending,
            ConnectBehavior::Refuse { code } => {
                self.started = None;
                ConnectStatus::Failed(BrokerError::new(code, "connection refused"))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::new(-3, "not connected"));
        }
        if self.refuse_subscribe {
            return Err(BrokerError::new(-1, "subscription refused"));
        }
        if !self.subscriptions.iter().any(|t| t == topic) {
            self.subscriptions.push(topic.to_string());
        }
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        if !self.connected {
            return Err(BrokerError::new(-3, "not connected"));
        }
        if self.refuse_publishes > 0 {
            self.refuse_publishes -= 1;
            return Err(BrokerError::new(PUBLISH_REFUSED_RC, "publish refused"));
        }

        self.published.push((topic.to_string(), payload.to_string()));
        if let Some(responder) = self.responder.as_mut()
            && let Some(reply) = responder(topic, payload)
        {
            self.inbound.push_back(reply);
        }
        Ok(())
    }

    fn poll_inbound(&mut self) -> Option<InboundMessage> {
        if !self.connected {
            return None;
        }
        self.inbound.pop_front()
    }

    fn disconnect(&mut self) {
        self.connected = false;
        self.started = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ConnectOptions {
        crate::GatewayConfig::default().connect_options("10.0.0.2", 1883)
    }

    #[test]
    fn test_network_refuse() {
        let t0 = Instant::now();
        let mut network = MockNetwork::with_behavior(JoinBehavior::Refuse);
        network.begin_join("lobby", "pw", t0);
        assert_eq!(network.poll_join(t0), JoinStatus::Failed);
        assert!(!network.is_connected());
        assert_eq!(network.attempts()[0].ssid, "lobby");
    }

    #[test]
    fn test_network_without_attempt_fails() {
        let mut network = MockNetwork::new();
        assert_eq!(network.poll_join(Instant::now()), JoinStatus::Failed);
    }

    #[test]
    fn test_broker_accept_after_delay() {
        let t0 = Instant::now();
        let mut broker = MockBroker::with_behavior(ConnectBehavior::Accept {
            after: Duration::from_secs(1),
        });
        broker.begin_connect(&options(), t0);
        assert_eq!(broker.poll_connect(t0), ConnectStatus::Pending);
        assert_eq!(
            broker.poll_connect(t0 + Duration::from_secs(1)),
            ConnectStatus::Connected
        );
        assert_eq!(broker.connects()[0].last_will.payload, "OFFLINE");
    }

    #[test]
    fn test_broker_refuse_reports_code() {
        let t0 = Instant::now();
        let mut broker = MockBroker::with_behavior(ConnectBehavior::Refuse { code: -2 });
        broker.begin_connect(&options(), t0);
        match broker.poll_connect(t0) {
            ConnectStatus::Failed(err) => assert_eq!(err.code, -2),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn test_publish_refusals_then_success() {
        let t0 = Instant::now();
        let mut broker = MockBroker::new();
        broker.begin_connect(&options(), t0);
        broker.poll_connect(t0);
        broker.refuse_publishes(1);

        assert!(broker.publish("a", "1").is_err());
        assert!(broker.publish("a", "1").is_ok());
        assert_eq!(broker.published(), &[("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn test_responder_queues_reply() {
        let t0 = Instant::now();
        let mut broker = MockBroker::new().with_responder(Box::new(|_, payload| {
            Some(InboundMessage {
                topic: "results".into(),
                payload: format!("echo {payload}"),
            })
        }));
        broker.begin_connect(&options(), t0);
        broker.poll_connect(t0);

        broker.publish("requests", "hi").unwrap();
        let reply = broker.poll_inbound().unwrap();
        assert_eq!(reply.payload, "echo hi");
        assert!(broker.poll_inbound().is_none());
    }

    #[test]
    fn test_inbound_held_while_disconnected() {
        let mut broker = MockBroker::new();
        broker.deliver("results", "x");
        assert!(broker.poll_inbound().is_none());
    }
}
