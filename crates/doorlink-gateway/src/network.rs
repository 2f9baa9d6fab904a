//! Collaborator interfaces for the wireless network and the broker client.
//!
//! Both are polled, never awaited: the lifecycle starts an operation, then
//! asks for its status on every pass of the control loop, so frames from the
//! terminal keep being serviced while a join or connect is pending. Each call
//! receives the loop's `now` so implementations never read the clock.

use std::time::Instant;

use thiserror::Error;

/// Client return code reported when a connect attempt is abandoned locally.
pub const CONNECTION_TIMEOUT_RC: i32 = -4;

/// Progress of a network join
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinStatus {
    Pending,
    Connected,
    Failed,
}

/// Wireless network join primitive
pub trait NetworkJoin {
    /// Start joining with the given credentials. Any previous attempt is
    /// abandoned.
    fn begin_join(&mut self, ssid: &str, password: &str, now: Instant);

    /// Progress of the attempt started by [`begin_join`](Self::begin_join).
    fn poll_join(&mut self, now: Instant) -> JoinStatus;

    /// Whether the network is currently up.
    fn is_connected(&self) -> bool;

    /// Leave the network.
    fn disconnect(&mut self);
}

/// Broker client failure carrying the client's numeric return code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("broker error (rc={code}): {reason}")]
pub struct BrokerError {
    pub code: i32,
    pub reason: String,
}

impl BrokerError {
    pub fn new(code: i32, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Connect attempt that produced no answer in time.
    pub fn timeout() -> Self {
        Self::new(CONNECTION_TIMEOUT_RC, "connection timeout")
    }
}

/// Message the broker publishes on the client's behalf if it drops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastWill {
    pub topic: String,
    pub payload: String,
    pub qos: u8,
    pub retain: bool,
}

/// Parameters of one broker connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub last_will: LastWill,
}

/// Progress of a broker connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectStatus {
    Pending,
    Connected,
    Failed(BrokerError),
}

/// Message delivered by the broker on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: String,
}

/// Publish/subscribe client
pub trait BrokerClient {
    /// Start connecting. Any previous attempt or session is abandoned.
    fn begin_connect(&mut self, options: &ConnectOptions, now: Instant);

    /// Progress of the attempt started by [`begin_connect`](Self::begin_connect).
    fn poll_connect(&mut self, now: Instant) -> ConnectStatus;

    /// Whether a session is currently established.
    fn is_connected(&self) -> bool;

    /// Subscribe to a topic on the current session.
    fn subscribe(&mut self, topic: &str) -> Result<(), BrokerError>;

    /// Publish a payload on the current session.
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BrokerError>;

    /// Next message received on a subscribed topic, if any.
    fn poll_inbound(&mut self) -> Option<InboundMessage>;

    /// Close the session.
    fn disconnect(&mut self);
}
