pub mod codec;
pub mod command;
pub mod event;
pub mod frame;
pub mod framer;
pub mod integrity;

pub use codec::LinkCodec;
pub use command::{Command, Token};
pub use event::{AccessEvent, AccessResult, Verdict, Verification};
pub use frame::{Dialect, Frame, Passthrough};
pub use framer::{DrainFrames, Framer, FramerState, LinkFramer};
pub use integrity::{IntegrityTag, tag};
