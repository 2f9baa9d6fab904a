//! Gateway deployment settings.
//!
//! Network credentials and the broker address are *not* part of this: they
//! arrive from the terminal during the handshake and live only as long as one
//! connection cycle.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use doorlink_core::{
    Error, Result,
    constants::{
        DEFAULT_BROKER_TIMEOUT_MS, DEFAULT_CLIENT_ID, DEFAULT_ERROR_COOLDOWN_MS,
        DEFAULT_JOIN_TIMEOUT_MS, DEFAULT_PUBLISH_RETRY_MS, DEFAULT_RECONNECT_INTERVAL_MS,
        DEFAULT_REQUEST_TOPIC, DEFAULT_RESULT_TOPIC, DEFAULT_STATUS_TOPIC, LAST_WILL_PAYLOAD,
    },
};

use crate::network::{ConnectOptions, LastWill};

/// Gateway timings, client identity and topic names.
///
/// Durations are stored in milliseconds so provisioning files stay plain
/// numbers; use the accessor methods to get [`Duration`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Upper bound on one network join attempt.
    pub join_timeout_ms: u64,

    /// Upper bound on one broker connect attempt.
    pub broker_timeout_ms: u64,

    /// Minimum spacing between reconnect attempts while `Ready`.
    pub reconnect_interval_ms: u64,

    /// Time spent in `Error` before asking for the handshake again.
    pub error_cooldown_ms: u64,

    /// Spacing between publish attempts for the head of the queue.
    pub publish_retry_ms: u64,

    /// Broker client identifier.
    pub client_id: String,

    /// Topic access events are published to.
    pub request_topic: String,

    /// Topic access results are received on.
    pub result_topic: String,

    /// Topic carrying the retained last-will message.
    pub status_topic: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
            broker_timeout_ms: DEFAULT_BROKER_TIMEOUT_MS,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            error_cooldown_ms: DEFAULT_ERROR_COOLDOWN_MS,
            publish_retry_ms: DEFAULT_PUBLISH_RETRY_MS,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            request_topic: DEFAULT_REQUEST_TOPIC.to_string(),
            result_topic: DEFAULT_RESULT_TOPIC.to_string(),
            status_topic: DEFAULT_STATUS_TOPIC.to_string(),
        }
    }
}

impl GatewayConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn broker_timeout(&self) -> Duration {
        Duration::from_millis(self.broker_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_millis(self.error_cooldown_ms)
    }

    pub fn publish_retry(&self) -> Duration {
        Duration::from_millis(self.publish_retry_ms)
    }

    /// Last-will registered with every broker connect.
    pub fn last_will(&self) -> LastWill {
        LastWill {
            topic: self.status_topic.clone(),
            payload: LAST_WILL_PAYLOAD.to_string(),
            qos: 1,
            retain: true,
        }
    }

    /// Connect parameters for the given broker address.
    pub fn connect_options(&self, host: &str, port: u16) -> ConnectOptions {
        ConnectOptions {
            host: host.to_string(),
            port,
            client_id: self.client_id.clone(),
            last_will: self.last_will(),
        }
    }

    /// Check that every timing is non-zero and every name is set.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfigValue` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let timings = [
            ("join_timeout_ms", self.join_timeout_ms),
            ("broker_timeout_ms", self.broker_timeout_ms),
            ("reconnect_interval_ms", self.reconnect_interval_ms),
            ("error_cooldown_ms", self.error_cooldown_ms),
            ("publish_retry_ms", self.publish_retry_ms),
        ];
        for (key, value) in timings {
            if value == 0 {
                return Err(invalid(key, "must be greater than zero"));
            }
        }

        let names = [
            ("client_id", &self.client_id),
            ("request_topic", &self.request_topic),
            ("result_topic", &self.result_topic),
            ("status_topic", &self.status_topic),
        ];
        for (key, value) in names {
            if value.trim().is_empty() {
                return Err(invalid(key, "must not be empty"));
            }
        }

        if self.request_topic == self.result_topic {
            return Err(invalid(
                "result_topic",
                "must differ from request_topic",
            ));
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> Error {
    Error::InvalidConfigValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
