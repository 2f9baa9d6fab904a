//! Core constants for the doorlink serial protocol.
//!
//! This module defines the wire delimiters, buffer sizes and reference timings
//! shared by the terminal and gateway nodes. Both ends of a link must agree on
//! the delimiter constants; the timing constants are only defaults and can be
//! overridden per node through its configuration struct.
//!
//! # Wire Structure
//!
//! Two frame dialects share one byte stream:
//!
//! ```text
//! SSID=hotel-wifi|          command frame, KEY=VALUE, pipe terminated
//! SYS_READY|                command frame, bare token
//! MQTT_RX|{"a":"b|c"}\n     event frame, newline terminated
//! ```
//!
//! | Delimiter | Name | Purpose |
//! |-----------|------|---------|
//! | `\|` | COMMAND_TERMINATOR | Ends a command frame |
//! | `\n` | EVENT_TERMINATOR | Ends an inbound event frame |
//! | `=` | KEY_VALUE_SEPARATOR | Splits a command frame into key and value |
//!
//! # Usage
//!
//! ```
//! use doorlink_core::constants::*;
//!
//! assert_eq!(COMMAND_TERMINATOR, b'|');
//! assert!(INBOUND_EVENT_TAG.ends_with('|'));
//! ```

// ============================================================================
// Frame Delimiters
// ============================================================================

/// Terminator of a command frame (`KEY=VALUE|` or `TOKEN|`).
pub const COMMAND_TERMINATOR: u8 = b'|';

/// Terminator of an event frame whose body may itself contain pipes.
pub const EVENT_TERMINATOR: u8 = b'\n';

/// Separator between key and value inside a command frame.
///
/// Only the first occurrence splits; values may contain further `=` bytes.
///
/// ```
/// use doorlink_core::constants::KEY_VALUE_SEPARATOR;
///
/// let (key, value) = "PASS=a=b".split_once(KEY_VALUE_SEPARATOR).unwrap();
/// assert_eq!((key, value), ("PASS", "a=b"));
/// ```
pub const KEY_VALUE_SEPARATOR: char = '=';

/// Tag opening an event frame travelling gateway → terminal.
///
/// The body after the tag runs until [`EVENT_TERMINATOR`], so it may contain
/// pipe characters.
pub const INBOUND_EVENT_TAG: &str = "MQTT_RX|";

/// Tag opening an event frame travelling terminal → gateway.
///
/// The body after the tag runs until the next [`COMMAND_TERMINATOR`]. The
/// terminal only emits bodies that contain no pipe character.
pub const OUTBOUND_EVENT_TAG: &str = "MQTT_TX|";

// ============================================================================
// Buffer Sizing
// ============================================================================

/// Receive buffer size for one frame, in bytes.
///
/// A frame that grows past this size before its terminator arrives is
/// discarded.
pub const RX_BUFFER_SIZE: usize = 256;

/// Completed frames the framer holds before it stops consuming input.
pub const MAX_PENDING_FRAMES: usize = 32;

/// Maximum length of a single configuration value (SSID, password, broker).
pub const MAX_CONFIG_VALUE_LENGTH: usize = 63;

/// Capacity of the outbound publish queue on each node.
pub const PUBLISH_QUEUE_CAPACITY: usize = 3;

// ============================================================================
// Identifier Limits
// ============================================================================

/// Minimum number of hex digits in a card UID (one byte).
pub const MIN_UID_HEX_LENGTH: usize = 2;

/// Maximum number of hex digits in a card UID (ten bytes, ISO 14443 triple size).
pub const MAX_UID_HEX_LENGTH: usize = 20;

/// Maximum length of a door identifier.
pub const MAX_DOOR_ID_LENGTH: usize = 32;

/// Maximum length of the opaque auth token.
pub const MAX_TOKEN_LENGTH: usize = 64;

// ============================================================================
// Gateway Timing Defaults (milliseconds)
// ============================================================================

/// Bound on a network join attempt.
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 20_000;

/// Bound on a broker connect attempt.
pub const DEFAULT_BROKER_TIMEOUT_MS: u64 = 10_000;

/// Minimum spacing between reconnect attempts while `Ready`.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 10_000;

/// Time spent in `Error` before config is cleared and re-requested.
pub const DEFAULT_ERROR_COOLDOWN_MS: u64 = 10_000;

/// Minimum spacing between two transmissions of the same queued event.
pub const DEFAULT_PUBLISH_RETRY_MS: u64 = 3_000;

// ============================================================================
// Terminal Timing Defaults (milliseconds)
// ============================================================================

/// Time the terminal waits for `REQ_CONFIG` before sending config anyway.
pub const DEFAULT_BOOT_WAIT_MS: u64 = 800;

/// Spacing between handshake frames, sized for the peer's receive buffer.
pub const DEFAULT_FRAME_SPACING_MS: u64 = 50;

/// Time the terminal waits for `SYS_READY` after `CONNECT`.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 30_000;

/// Minimum interval before the same card produces a second event.
pub const DEFAULT_DEBOUNCE_MS: u64 = 2_000;

/// Card reader polling interval.
pub const DEFAULT_SCAN_INTERVAL_MS: u64 = 300;

/// Oldest access result (by echoed timestamp) still accepted.
pub const DEFAULT_RESULT_MAX_AGE_MS: u64 = 30_000;

/// Control loop tick of the async drivers.
pub const DEFAULT_TICK_MS: u64 = 10;

// ============================================================================
// Indicator Durations (milliseconds)
// ============================================================================

/// OK flash when a scan is turned into an event.
pub const SCAN_FLASH_MS: u64 = 60;

/// OK flash on `PUB_OK`.
pub const ACK_FLASH_MS: u64 = 80;

/// DENY flash on `PUB_FAIL` or a full queue.
pub const NACK_FLASH_MS: u64 = 300;

// ============================================================================
// Broker Defaults
// ============================================================================

/// Default broker port.
pub const DEFAULT_BROKER_PORT: u16 = 1883;

/// Client identifier presented by the gateway to the broker.
pub const DEFAULT_CLIENT_ID: &str = "doorlink-gateway";

/// Topic the gateway publishes access requests to.
pub const DEFAULT_REQUEST_TOPIC: &str = "doorlink/room1/auth";

/// Topic the gateway subscribes to for access results.
pub const DEFAULT_RESULT_TOPIC: &str = "doorlink/room1/result";

/// Topic carrying the gateway's last-will message.
pub const DEFAULT_STATUS_TOPIC: &str = "doorlink/status/gateway";

/// Payload the broker publishes on the status topic if the gateway drops.
pub const LAST_WILL_PAYLOAD: &str = "OFFLINE";
