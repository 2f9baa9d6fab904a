//! Async driver for the terminal context.

use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::codec::Framed;
use tracing::{debug, info, trace};

use doorlink_core::{Error, Result, constants::DEFAULT_TICK_MS};
use doorlink_protocol::{Frame, LinkCodec, Passthrough};

use crate::{indicator::Indicator, reader::CardReader, terminal::Terminal};

/// Drives a [`Terminal`] over a byte stream.
///
/// The tick also paces the handshake and expires LED flashes, so it should
/// stay well below the configured frame spacing.
#[derive(Debug)]
pub struct TerminalRuntime<R, I> {
    terminal: Terminal<R, I>,
    tick: Duration,
}

impl<R: CardReader, I: Indicator> TerminalRuntime<R, I> {
    pub fn new(terminal: Terminal<R, I>) -> Self {
        Self {
            terminal,
            tick: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn terminal(&self) -> &Terminal<R, I> {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut Terminal<R, I> {
        &mut self.terminal
    }

    pub fn into_terminal(self) -> Terminal<R, I> {
        self.terminal
    }

    /// Run until the gateway closes the link.
    ///
    /// # Errors
    /// Returns `Error::Io` if reading from or writing to the link fails.
    pub async fn run<T>(&mut self, io: T) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut link = Framed::new(io, LinkCodec::new(Passthrough::Inbound));
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let boot = self.terminal.start(now());
        send_all(&mut link, boot).await?;

        loop {
            let replies = tokio::select! {
                item = link.next() => match item {
                    Some(Ok(Ok(frame))) => self.terminal.handle_frame(frame, now()),
                    Some(Ok(Err(err))) => self.terminal.handle_frame_error(&err),
                    Some(Err(err)) => return Err(err),
                    None => {
                        info!("Gateway link closed");
                        return Ok(());
                    }
                },
                _ = ticker.tick() => self.terminal.poll(now()),
            };
            send_all(&mut link, replies).await?;
        }
    }
}

fn now() -> std::time::Instant {
    Instant::now().into_std()
}

async fn send_all<S>(link: &mut S, frames: Vec<Frame>) -> Result<()>
where
    S: Sink<Frame, Error = Error> + Unpin,
{
    if frames.is_empty() {
        return Ok(());
    }
    debug!(count = frames.len(), "sending to gateway");
    for frame in frames {
        trace!(frame = %frame, "terminal sent");
        link.feed(frame).await?;
    }
    link.flush().await
}
