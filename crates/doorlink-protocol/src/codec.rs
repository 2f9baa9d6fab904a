//! Tokio codec for the doorlink link protocol.
//!
//! `LinkCodec` adapts the [`Framer`](crate::Framer) to Tokio's codec traits so
//! a node can drive any `AsyncRead + AsyncWrite` byte stream through
//! `tokio_util::codec::Framed`.
//!
//! # Architecture
//!
//! ```text
//! byte stream -> Decoder -> Result<Frame>   (framing errors are items)
//! Frame -> Encoder -> byte stream           (tag and terminator added)
//! ```
//!
//! A receive-buffer overflow only drops the offending frame, so it is yielded
//! as an `Err` *item* rather than as a decoder error. `Framed` terminates the
//! stream after a decoder error, which would otherwise turn one noisy frame
//! into a dead link. Decoder errors are reserved for the transport itself.
//!
//! # Usage with Tokio Framed
//!
//! ```rust,no_run
//! use doorlink_protocol::{Frame, LinkCodec, Passthrough};
//! use futures::{SinkExt, StreamExt};
//! use tokio_util::codec::Framed;
//!
//! # async fn example(io: tokio::io::DuplexStream) -> doorlink_core::Result<()> {
//! let mut link = Framed::new(io, LinkCodec::new(Passthrough::Inbound));
//!
//! link.send(Frame::command("SSID=hotel")).await?;
//!
//! while let Some(item) = link.next().await {
//!     match item? {
//!         Ok(frame) => println!("received {frame}"),
//!         Err(err) => eprintln!("dropped frame: {err}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{Frame, LinkFramer, Passthrough};
use doorlink_core::{Error, Result};

/// Tokio codec for link frames.
#[derive(Debug)]
pub struct LinkCodec {
    framer: LinkFramer,
}

impl LinkCodec {
    /// Create a codec recognising the given inbound passthrough direction.
    pub fn new(passthrough: Passthrough) -> Self {
        Self {
            framer: LinkFramer::new(passthrough),
        }
    }

    pub fn framer(&self) -> &LinkFramer {
        &self.framer
    }
}

impl Decoder for LinkCodec {
    type Item = Result<Frame>;
    type Error = Error;

    /// Move buffered bytes into the framer and return the next item.
    ///
    /// The source is consumed until the framer's pending queue is full;
    /// partial frames live in the framer's fixed-size buffer.
    fn decode(&mut self, src: &mut BytesMut) -> std::result::Result<Option<Self::Item>, Error> {
        if !src.is_empty() {
            let consumed = self.framer.feed(&src[..]);
            src.advance(consumed);
        }
        Ok(self.framer.next_frame())
    }
}

impl Encoder<Frame> for LinkCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        frame.encode(dst);
        Ok(())
    }
}
