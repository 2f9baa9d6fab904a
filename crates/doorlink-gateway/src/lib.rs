//! Gateway node of the doorlink bridge.
//!
//! The gateway sits between a terminal on a serial-style byte link and a
//! publish/subscribe broker. It receives network credentials and the broker
//! address from the terminal, walks the connection lifecycle, forwards access
//! events to the broker and access results back to the terminal.
//!
//! # Components
//!
//! - **Gateway**: sans-IO context (handshake, lifecycle, publish queue)
//! - **ConnectionState**: lifecycle states and their transition table
//! - **NetworkJoin / BrokerClient**: polled collaborator interfaces
//! - **MockNetwork / MockBroker**: scripted collaborators
//! - **GatewayRuntime**: tokio driver over any byte stream
//!
//! # Example
//!
//! ```
//! use std::time::Instant;
//! use doorlink_gateway::{ConnectionState, Gateway, GatewayConfig};
//! use doorlink_gateway::mock::{MockBroker, MockNetwork};
//! use doorlink_protocol::Frame;
//!
//! let t0 = Instant::now();
//! let mut gateway = Gateway::new(GatewayConfig::default(), MockNetwork::new(), MockBroker::new(), t0);
//!
//! let boot = gateway.start(t0);
//! assert_eq!(boot, vec![Frame::command("BOOT_DONE"), Frame::command("REQ_CONFIG")]);
//! assert_eq!(gateway.state(), ConnectionState::WaitConfig);
//!
//! let reply = gateway.handle_frame(Frame::command("PORT=1883"), t0);
//! assert_eq!(reply, vec![Frame::command("PORT_OK")]);
//! ```

pub mod config;
pub mod gateway;
pub mod lifecycle;
pub mod mock;
pub mod network;
pub mod runtime;

pub use config::GatewayConfig;
pub use gateway::Gateway;
pub use lifecycle::ConnectionState;
pub use network::{BrokerClient, BrokerError, ConnectOptions, LastWill, NetworkJoin};
pub use runtime::GatewayRuntime;
