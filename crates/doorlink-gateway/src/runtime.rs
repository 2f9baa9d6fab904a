//! Async driver for the gateway context.
//!
//! One task owns both the link and the [`Gateway`]: a `tokio::select!` loop
//! alternates between frames arriving from the terminal and a fixed tick that
//! advances timers, so the framer keeps being serviced while a network join
//! or broker connect is pending.

use std::time::Duration;

use futures::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::codec::Framed;
use tracing::{debug, info, trace};

use doorlink_core::{Error, Result, constants::DEFAULT_TICK_MS};
use doorlink_protocol::{Frame, LinkCodec, Passthrough};

use crate::{
    gateway::Gateway,
    network::{BrokerClient, NetworkJoin},
};

/// Drives a [`Gateway`] over a byte stream.
#[derive(Debug)]
pub struct GatewayRuntime<N, B> {
    gateway: Gateway<N, B>,
    tick: Duration,
}

impl<N: NetworkJoin, B: BrokerClient> GatewayRuntime<N, B> {
    pub fn new(gateway: Gateway<N, B>) -> Self {
        Self {
            gateway,
            tick: Duration::from_millis(DEFAULT_TICK_MS),
        }
    }

    /// Override the poll period.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn gateway(&self) -> &Gateway<N, B> {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut Gateway<N, B> {
        &mut self.gateway
    }

    pub fn into_gateway(self) -> Gateway<N, B> {
        self.gateway
    }

    /// Run until the terminal closes the link.
    ///
    /// # Errors
    /// Returns `Error::Io` if reading from or writing to the link fails.
    pub async fn run<T>(&mut self, io: T) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut link = Framed::new(io, LinkCodec::new(Passthrough::Outbound));
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let boot = self.gateway.start(now());
        send_all(&mut link, boot).await?;

        loop {
            let replies = tokio::select! {
                item = link.next() => match item {
                    Some(Ok(Ok(frame))) => self.gateway.handle_frame(frame, now()),
                    Some(Ok(Err(err))) => self.gateway.handle_frame_error(&err),
                    Some(Err(err)) => return Err(err),
                    None => {
                        info!("Terminal link closed");
                        return Ok(());
                    }
                },
                _ = ticker.tick() => self.gateway.poll(now()),
            };
            send_all(&mut link, replies).await?;
        }
    }
}

/// Current time on the runtime clock, which the test-util pause controls.
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
    debug!(count = frames.len(), "sending to terminal");
    for frame in frames {
        trace!(frame = %frame, "gateway sent");
        link.feed(frame).await?;
    }
    link.flush().await
}
