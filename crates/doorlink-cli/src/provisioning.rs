//! Provisioning file and command-line overrides.
//!
//! ```json
//! {
//!   "terminal": {
//!     "door_id": "room1",
//!     "auth_token": "ABC123DEF456",
//!     "credentials": {"ssid": "lobby", "password": "secret", "broker": "127.0.0.1", "port": 1883}
//!   },
//!   "gateway": {"join_timeout_ms": 15000}
//! }
//! ```
//!
//! Both sections are optional; a missing one falls back to the bench
//! defaults below.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use doorlink_core::{AuthToken, ConfigSet, DoorId, constants::DEFAULT_BROKER_PORT};
use doorlink_gateway::GatewayConfig;
use doorlink_terminal::TerminalConfig;

use crate::Overrides;

const BENCH_DOOR_ID: &str = "room1";
const BENCH_TOKEN: &str = "ABC123DEF456";

/// Contents of a provisioning file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Provisioning {
    #[serde(default)]
    pub terminal: Option<TerminalConfig>,

    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Configuration both nodes run with after overrides
#[derive(Debug, Clone)]
pub struct Setup {
    pub terminal: TerminalConfig,
    pub gateway: GatewayConfig,
}

fn bench_terminal() -> Result<TerminalConfig> {
    Ok(TerminalConfig::new(
        DoorId::new(BENCH_DOOR_ID)?,
        AuthToken::new(BENCH_TOKEN)?,
        ConfigSet {
            ssid: "bench-wifi".to_string(),
            password: "bench-secret".to_string(),
            broker: "127.0.0.1".to_string(),
            port: DEFAULT_BROKER_PORT,
        },
    ))
}

impl Provisioning {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading provisioning file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing provisioning file {}", path.display()))
    }

    /// Fill in bench defaults and apply command-line values. A new door id
    /// also moves the gateway's request and result topics to that door.
    pub fn resolve(self, overrides: &Overrides) -> Result<Setup> {
        let mut terminal = match self.terminal {
            Some(terminal) => terminal,
            None => bench_terminal()?,
        };
        let mut gateway = self.gateway;

        let credentials = &mut terminal.credentials;
        if let Some(ssid) = &overrides.ssid {
            credentials.ssid = ssid.clone();
        }
        if let Some(password) = &overrides.password {
            credentials.password = password.clone();
        }
        if let Some(broker) = &overrides.broker {
            credentials.broker = broker.clone();
        }
        if let Some(port) = overrides.port {
            credentials.port = port;
        }
        if let Some(token) = &overrides.token {
            terminal.auth_token = AuthToken::new(token).context("invalid --token")?;
        }
        if let Some(door_id) = &overrides.door_id {
            let door_id = DoorId::new(door_id).context("invalid --door-id")?;
            gateway.request_topic = format!("doorlink/{door_id}/auth");
            gateway.result_topic = format!("doorlink/{door_id}/result");
            terminal.door_id = door_id;
        }
        Ok(Setup { terminal, gateway })
    }
}

impl Setup {
    pub fn validate(&self) -> Result<()> {
        self.terminal
            .validate()
            .context("invalid terminal configuration")?;
        self.gateway
            .validate()
            .context("invalid gateway configuration")?;
        Ok(())
    }
}
