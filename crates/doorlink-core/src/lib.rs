pub mod constants;
pub mod error;
pub mod queue;
pub mod state;
pub mod types;

pub use error::{Error, LinkStage, Result};
pub use queue::{Outbox, PublishQueue};
pub use state::{State, StateMachine, StateTransition};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
