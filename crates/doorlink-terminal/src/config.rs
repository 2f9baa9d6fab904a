//! Terminal provisioning.
//!
//! Identity and credentials have no sensible default and must be supplied;
//! the timings default to the reference values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use doorlink_core::{
    AuthToken, ConfigSet, DoorId, Error, Result,
    constants::{
        DEFAULT_BOOT_WAIT_MS, DEFAULT_DEBOUNCE_MS, DEFAULT_ERROR_COOLDOWN_MS,
        DEFAULT_FRAME_SPACING_MS, DEFAULT_HANDSHAKE_TIMEOUT_MS, DEFAULT_PUBLISH_RETRY_MS,
        DEFAULT_RESULT_MAX_AGE_MS, DEFAULT_SCAN_INTERVAL_MS,
    },
};

/// Terminal timings in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalTimings {
    /// How long to wait for `REQ_CONFIG` after boot before sending anyway.
    pub boot_wait_ms: u64,
    /// Minimum spacing between handshake frames.
    pub frame_spacing_ms: u64,
    /// How long to wait for `SYS_READY` after the handshake.
    pub handshake_timeout_ms: u64,
    pub error_cooldown_ms: u64,
    pub publish_retry_ms: u64,
    /// Re-scan interval for the same card.
    pub debounce_ms: u64,
    pub scan_interval_ms: u64,
    /// Oldest echoed timestamp still accepted.
    pub result_max_age_ms: u64,
}

impl Default for TerminalTimings {
    fn default() -> Self {
        Self {
            boot_wait_ms: DEFAULT_BOOT_WAIT_MS,
            frame_spacing_ms: DEFAULT_FRAME_SPACING_MS,
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
            error_cooldown_ms: DEFAULT_ERROR_COOLDOWN_MS,
            publish_retry_ms: DEFAULT_PUBLISH_RETRY_MS,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            scan_interval_ms: DEFAULT_SCAN_INTERVAL_MS,
            result_max_age_ms: DEFAULT_RESULT_MAX_AGE_MS,
        }
    }
}

impl TerminalTimings {
    pub fn boot_wait(&self) -> Duration {
        Duration::from_millis(self.boot_wait_ms)
    }

    pub fn frame_spacing(&self) -> Duration {
        Duration::from_millis(self.frame_spacing_ms)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_millis(self.error_cooldown_ms)
    }

    pub fn publish_retry(&self) -> Duration {
        Duration::from_millis(self.publish_retry_ms)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn result_max_age(&self) -> Duration {
        Duration::from_millis(self.result_max_age_ms)
    }

    /// # Errors
    /// Returns `Error::InvalidConfigValue` for a zero timing other than
    /// `frame_spacing_ms` and `debounce_ms`.
    pub fn validate(&self) -> Result<()> {
        let timings = [
            ("boot_wait_ms", self.boot_wait_ms),
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("error_cooldown_ms", self.error_cooldown_ms),
            ("publish_retry_ms", self.publish_retry_ms),
            ("scan_interval_ms", self.scan_interval_ms),
            ("result_max_age_ms", self.result_max_age_ms),
        ];
        for (key, value) in timings {
            if value == 0 {
                return Err(Error::InvalidConfigValue {
                    key: key.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn default_require_verification() -> bool {
    true
}

/// Everything a terminal is provisioned with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalConfig {
    pub door_id: DoorId,

    /// Sent with every access event.
    pub auth_token: AuthToken,

    /// Network credentials and broker address handed to the gateway.
    pub credentials: ConfigSet,

    /// Deny results that carry no echoed fields.
    #[serde(default = "default_require_verification")]
    pub require_verification: bool,

    #[serde(default)]
    pub timings: TerminalTimings,
}

impl TerminalConfig {
    /// Configuration with reference timings and verification required.
    pub fn new(door_id: DoorId, auth_token: AuthToken, credentials: ConfigSet) -> Self {
        Self {
            door_id,
            auth_token,
            credentials,
            require_verification: true,
            timings: TerminalTimings::default(),
        }
    }

    /// Check credentials against the handshake limits and the timings.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfigValue` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.credentials.validate()?;
        self.timings.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn test_reference_timings() {
        let timings = TerminalTimings::default();
        assert_eq!(timings.boot_wait(), Duration::from_millis(800));
        assert_eq!(timings.frame_spacing(), Duration::from_millis(50));
        assert_eq!(timings.handshake_timeout(), Duration::from_secs(30));
        assert_eq!(timings.debounce(), Duration::from_secs(2));
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_credentials_checked() {
        let mut config = config();
        config.credentials.ssid = "x".repeat(64);
        match config.validate() {
            Err(Error::InvalidConfigValue { key, .. }) => assert_eq!(key, "SSID"),
            other => panic!("expected InvalidConfigValue, got {other:?}"),
        }
    }

    #[test]
    fn test_json_provisioning_file() {
        let json = r#"{
            "door_id": "room1",
            "auth_token": "ABC123DEF456",
            "credentials": {"ssid": "lobby", "password": "secret", "broker": "10.0.0.2", "port": 1883},
            "timings": {"boot_wait_ms": 1500}
        }"#;
        let config: TerminalConfig = serde_json::from_str(json).unwrap();
        assert!(config.require_verification);
        assert_eq!(config.timings.boot_wait_ms, 1500);
        assert_eq!(config.timings.scan_interval_ms, 300);
        assert_eq!(config.auth_token.expose(), "ABC123DEF456");
    }

    #[test]
    fn test_json_rejects_unsafe_door_id() {
        let json = r#"{
            "door_id": "room|1",
            "auth_token": "T",
            "credentials": {"ssid": "a", "password": "b", "broker": "c", "port": 1}
        }"#;
        assert!(serde_json::from_str::<TerminalConfig>(json).is_err());
    }
}
