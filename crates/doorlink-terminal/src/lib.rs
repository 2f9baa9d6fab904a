//! Terminal node of the doorlink bridge.
//!
//! The terminal reads cards, provisions the gateway over the byte link and
//! turns access results into LED signals. It follows the gateway's lifecycle
//! only through the status tokens it receives.
//!
//! # Components
//!
//! - **Terminal**: sans-IO context (companion states, handshake, outbox, results)
//! - **TerminalState**: companion states and their transition table
//! - **HandshakeSender**: paced `SSID`/`PASS`/`BROKER`/`PORT`/`CONNECT` sequence
//! - **ScanDebouncer**: suppresses re-reads of a card held in the field
//! - **ResultVerifier**: integrity and freshness checks on access results
//! - **CardReader / Indicator**: peripheral interfaces with scripted mocks
//! - **TerminalRuntime**: tokio driver over any byte stream
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use doorlink_core::{AuthToken, ConfigSet, DoorId};
//! use doorlink_protocol::Frame;
//! use doorlink_terminal::{Terminal, TerminalConfig, TerminalState};
//! use doorlink_terminal::{indicator::MockIndicator, reader::MockReader};
//!
//! let config = TerminalConfig::new(
//!     DoorId::new("room1").unwrap(),
//!     AuthToken::new("ABC123DEF456").unwrap(),
//!     ConfigSet {
//!         ssid: "lobby".into(),
//!         password: "secret".into(),
//!         broker: "10.0.0.2".into(),
//!         port: 1883,
//!     },
//! );
//! let t0 = Instant::now();
//! let mut terminal = Terminal::new(config, MockReader::new(), MockIndicator::default(), t0);
//!
//! assert_eq!(terminal.start(t0), vec![Frame::command("TERM_BOOT")]);
//!
//! terminal.handle_frame(Frame::command("REQ_CONFIG"), t0);
//! assert_eq!(terminal.poll(t0), vec![Frame::command("SSID=lobby")]);
//! assert_eq!(terminal.state(), TerminalState::SendConfig);
//!
//! let next = terminal.poll(t0 + Duration::from_millis(50));
//! assert_eq!(next, vec![Frame::command("PASS=secret")]);
//! ```

pub mod companion;
pub mod config;
pub mod debounce;
pub mod handshake;
pub mod indicator;
pub mod reader;
pub mod runtime;
pub mod terminal;
pub mod verify;

pub use companion::TerminalState;
pub use config::{TerminalConfig, TerminalTimings};
pub use indicator::{Indicator, Led};
pub use reader::CardReader;
pub use runtime::TerminalRuntime;
pub use terminal::Terminal;
pub use verify::ResultVerifier;
