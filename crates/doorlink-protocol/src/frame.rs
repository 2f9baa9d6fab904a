use bytes::{BufMut, BytesMut};
use doorlink_core::constants::{
    COMMAND_TERMINATOR, EVENT_TERMINATOR, INBOUND_EVENT_TAG, OUTBOUND_EVENT_TAG,
};
use std::fmt;

/// Which of the two wire dialects a frame belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// `KEY=VALUE|` or `TOKEN|`
    Command,
    /// Tagged passthrough payload whose body may contain pipes
    Event,
}

/// Direction of a passthrough event, fixing its tag and terminator
///
/// | Direction | Wire form |
/// |-----------|-----------|
/// | `Inbound` | `MQTT_RX\|<body>\n` |
/// | `Outbound` | `MQTT_TX\|<body>\|` |
///
/// Each node listens for exactly one direction: the terminal receives
/// `Inbound` events, the gateway receives `Outbound` ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Passthrough {
    /// Broker message travelling gateway → terminal.
    Inbound,
    /// Access event travelling terminal → gateway.
    Outbound,
}

impl Passthrough {
    /// Tag opening the event, including its trailing pipe.
    #[inline]
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Passthrough::Inbound => INBOUND_EVENT_TAG,
            Passthrough::Outbound => OUTBOUND_EVENT_TAG,
        }
    }

    /// Byte ending the event body.
    #[inline]
    #[must_use]
    pub fn terminator(self) -> u8 {
        match self {
            Passthrough::Inbound => EVENT_TERMINATOR,
            Passthrough::Outbound => COMMAND_TERMINATOR,
        }
    }
}

/// One delimited unit of the link protocol
///
/// Content is stored without tag or terminator. The framer only produces
/// trimmed, null-free content.
///
/// ```
/// use doorlink_protocol::{Dialect, Frame};
///
/// let frame = Frame::command("SYS_READY");
/// assert_eq!(frame.dialect(), Dialect::Command);
/// assert_eq!(frame.to_bytes(), b"SYS_READY|");
///
/// let frame = Frame::Inbound(r#"{"accessResult":"OK"}"#.to_string());
/// assert_eq!(frame.to_bytes(), b"MQTT_RX|{\"accessResult\":\"OK\"}\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Frame {
    /// Command dialect content (`KEY=VALUE` or a bare token).
    Command(String),
    /// Body of an `MQTT_RX|...\n` event.
    Inbound(String),
    /// Body of an `MQTT_TX|...|` event.
    Outbound(String),
}

impl Frame {
    pub fn command(content: impl Into<String>) -> Self {
        Frame::Command(content.into())
    }

    /// Event frame for the given direction.
    pub fn event(direction: Passthrough, body: impl Into<String>) -> Self {
        match direction {
            Passthrough::Inbound => Frame::Inbound(body.into()),
            Passthrough::Outbound => Frame::Outbound(body.into()),
        }
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        match self {
            Frame::Command(_) => Dialect::Command,
            Frame::Inbound(_) | Frame::Outbound(_) => Dialect::Event,
        }
    }

    /// Passthrough direction for event frames.
    #[must_use]
    pub fn passthrough(&self) -> Option<Passthrough> {
        match self {
            Frame::Command(_) => None,
            Frame::Inbound(_) => Some(Passthrough::Inbound),
            Frame::Outbound(_) => Some(Passthrough::Outbound),
        }
    }

    /// Content without tag or terminator.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Frame::Command(content) | Frame::Inbound(content) | Frame::Outbound(content) => {
                content
            }
        }
    }

    /// Number of bytes this frame occupies on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        let tag = self.passthrough().map_or(0, |p| p.tag().len());
        tag + self.content().len() + 1
    }

    /// Append the wire form to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_len());
        match self {
            Frame::Command(content) => {
                dst.put_slice(content.as_bytes());
                dst.put_u8(COMMAND_TERMINATOR);
            }
            Frame::Inbound(body) | Frame::Outbound(body) => {
                if let Some(direction) = self.passthrough() {
                    dst.put_slice(direction.tag().as_bytes());
                    dst.put_slice(body.as_bytes());
                    dst.put_u8(direction.terminator());
                }
            }
        }
    }

    /// Wire form as an owned buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.encode(&mut buf);
        buf.to_vec()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Command(content) => write!(f, "{content}|"),
            Frame::Inbound(body) => write!(f, "{INBOUND_EVENT_TAG}{body}\\n"),
            Frame::Outbound(body) => write!(f, "{OUTBOUND_EVENT_TAG}{body}|"),
        }
    }
}
