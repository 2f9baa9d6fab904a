use crate::{
    Result,
    constants::{
        MAX_CONFIG_VALUE_LENGTH, MAX_DOOR_ID_LENGTH, MAX_TOKEN_LENGTH, MAX_UID_HEX_LENGTH,
        MIN_UID_HEX_LENGTH,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use subtle::ConstantTimeEq;

/// Bytes allowed in door identifiers and auth tokens.
///
/// None of them is a frame delimiter or needs escaping inside a JSON string,
/// so an event body built from these values never splits a frame.
fn is_safe_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-')
}

/// Card UID as reported by the reader (upper-case hex, 1-10 bytes)
///
/// # Security
/// Comparison runs in constant time, so matching a presented card against a
/// stored one does not leak the position of the first differing digit.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CardUid(String);

impl CardUid {
    /// Create a card UID with validation.
    ///
    /// The input is trimmed and upper-cased before validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidIdentifier` if:
    /// - The length is not between 2-20 hex digits
    /// - The length is odd (UIDs are whole bytes)
    /// - Any character is not a hex digit
    pub fn new(uid: &str) -> Result<Self> {
        let uid = uid.trim().to_ascii_uppercase();

        let len = uid.len();
        if !(MIN_UID_HEX_LENGTH..=MAX_UID_HEX_LENGTH).contains(&len) {
            return Err(Error::InvalidIdentifier(format!(
                "UID must be {MIN_UID_HEX_LENGTH}-{MAX_UID_HEX_LENGTH} hex digits, got {len}"
            )));
        }

        if len % 2 != 0 {
            return Err(Error::InvalidIdentifier(format!(
                "UID must have an even number of hex digits, got {len}"
            )));
        }

        if !uid.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidIdentifier(format!("UID is not hex: {uid}")));
        }

        Ok(CardUid(uid))
    }

    /// Build a UID from raw reader bytes.
    ///
    /// # Errors
    /// Returns `Error::InvalidIdentifier` for an empty or over-long UID.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let hex: String = bytes.iter().map(|b| format!("{b:02X}")).collect();
        CardUid::new(&hex)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of UID bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.0.len() / 2
    }
}

impl fmt::Display for CardUid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CardUid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        CardUid::new(s)
    }
}

impl TryFrom<String> for CardUid {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        CardUid::new(&value)
    }
}

impl From<CardUid> for String {
    fn from(uid: CardUid) -> Self {
        uid.0
    }
}

impl PartialEq for CardUid {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl std::hash::Hash for CardUid {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Door identifier (1-32 characters of `[A-Za-z0-9_.-]`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DoorId(String);

impl DoorId {
    /// Create a door identifier with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidDoorId` if the id is empty, longer than 32
    /// characters or contains a character outside `[A-Za-z0-9_.-]`.
    pub fn new(id: &str) -> Result<Self> {
        let len = id.len();
        if !(1..=MAX_DOOR_ID_LENGTH).contains(&len) {
            return Err(Error::InvalidDoorId(format!(
                "Door ID must be 1-{MAX_DOOR_ID_LENGTH} chars, got {len}"
            )));
        }

        if !id.bytes().all(is_safe_ident_byte) {
            return Err(Error::InvalidDoorId(format!(
                "Door ID contains unsupported characters: {id}"
            )));
        }

        Ok(DoorId(id.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DoorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for DoorId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DoorId::new(s)
    }
}

impl TryFrom<String> for DoorId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        DoorId::new(&value)
    }
}

impl From<DoorId> for String {
    fn from(id: DoorId) -> Self {
        id.0
    }
}

/// Opaque auth token attached to every access event.
///
/// The token is never printed by `Debug`; `Display` is deliberately not
/// implemented. Use [`AuthToken::expose`] where the raw value is needed.
#[derive(Clone, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AuthToken(String);

impl AuthToken {
    /// Create a token with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidToken` if the token is empty, longer than 64
    /// characters or contains a character outside `[A-Za-z0-9_.-]`.
    pub fn new(token: &str) -> Result<Self> {
        let len = token.len();
        if !(1..=MAX_TOKEN_LENGTH).contains(&len) {
            return Err(Error::InvalidToken(format!(
                "Token must be 1-{MAX_TOKEN_LENGTH} chars, got {len}"
            )));
        }

        if !token.bytes().all(is_safe_ident_byte) {
            return Err(Error::InvalidToken(
                "Token contains unsupported characters".to_string(),
            ));
        }

        Ok(AuthToken(token.to_string()))
    }

    /// Raw token value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

impl PartialEq for AuthToken {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_bytes().ct_eq(other.0.as_bytes()).into()
    }
}

impl TryFrom<String> for AuthToken {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        AuthToken::new(&value)
    }
}

impl From<AuthToken> for String {
    fn from(token: AuthToken) -> Self {
        token.0
    }
}

/// One of the four handshake fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfigField {
    Ssid,
    Password,
    Broker,
    Port,
}

impl ConfigField {
    /// All fields in handshake order.
    pub const ALL: [ConfigField; 4] = [
        ConfigField::Ssid,
        ConfigField::Password,
        ConfigField::Broker,
        ConfigField::Port,
    ];

    /// Wire key of this field.
    #[inline]
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            ConfigField::Ssid => "SSID",
            ConfigField::Password => "PASS",
            ConfigField::Broker => "BROKER",
            ConfigField::Port => "PORT",
        }
    }

    /// Token acknowledging that the field was stored.
    #[inline]
    #[must_use]
    pub fn ack_token(self) -> &'static str {
        match self {
            ConfigField::Ssid => "SSID_OK",
            ConfigField::Password => "PASS_OK",
            ConfigField::Broker => "BROKER_OK",
            ConfigField::Port => "PORT_OK",
        }
    }

    /// Token rejecting a value for this field.
    #[inline]
    #[must_use]
    pub fn invalid_token(self) -> &'static str {
        match self {
            ConfigField::Ssid => "SSID_INVALID",
            ConfigField::Password => "PASS_INVALID",
            ConfigField::Broker => "BROKER_INVALID",
            ConfigField::Port => "PORT_INVALID",
        }
    }

    /// Look up a field by wire key. Keys are case-sensitive.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        ConfigField::ALL.into_iter().find(|field| field.key() == key)
    }
}

impl fmt::Display for ConfigField {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Complete set of link credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSet {
    pub ssid: String,
    pub password: String,
    pub broker: String,
    pub port: u16,
}

impl ConfigSet {
    /// Value of a field in its wire form.
    #[must_use]
    pub fn value(&self, field: ConfigField) -> String {
        match field {
            ConfigField::Ssid => self.ssid.clone(),
            ConfigField::Password => self.password.clone(),
            ConfigField::Broker => self.broker.clone(),
            ConfigField::Port => self.port.to_string(),
        }
    }

    /// Broker address as `host:port`.
    #[must_use]
    pub fn broker_addr(&self) -> String {
        format!("{}:{}", self.broker, self.port)
    }

    /// Check every field against the handshake limits.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfigValue` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let mut partial = PartialConfig::default();
        for field in ConfigField::ALL {
            partial.set(field, &self.value(field))?;
        }
        Ok(())
    }
}

impl fmt::Debug for ConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ConfigSet")
            .field("ssid", &self.ssid)
            .field("password", &"***")
            .field("broker", &self.broker)
            .field("port", &self.port)
            .finish()
    }
}

/// Handshake fields accumulated so far
///
/// Fields arrive independently and in any order; setting a field again
/// overwrites it.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PartialConfig {
    ssid: Option<String>,
    password: Option<String>,
    broker: Option<String>,
    port: Option<u16>,
}

impl PartialConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store one field.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfigValue` (leaving the field unchanged) if the
    /// value is empty, longer than 63 bytes, or for `PORT` not a port number
    /// in 1-65535.
    pub fn set(&mut self, field: ConfigField, value: &str) -> Result<()> {
        let invalid = |reason: String| Error::InvalidConfigValue {
            key: field.key().to_string(),
            reason,
        };

        if value.is_empty() {
            return Err(invalid("empty value".to_string()));
        }
        if value.len() > MAX_CONFIG_VALUE_LENGTH {
            return Err(invalid(format!(
                "value exceeds {MAX_CONFIG_VALUE_LENGTH} bytes ({})",
                value.len()
            )));
        }

        match field {
            ConfigField::Ssid => self.ssid = Some(value.to_string()),
            ConfigField::Password => self.password = Some(value.to_string()),
            ConfigField::Broker => self.broker = Some(value.to_string()),
            ConfigField::Port => {
                let port: u16 = value
                    .parse()
                    .map_err(|_| invalid(format!("not a port number: {value}")))?;
                if port == 0 {
                    return Err(invalid("port must be non-zero".to_string()));
                }
                self.port = Some(port);
            }
        }
        Ok(())
    }

    /// Whether a field has been stored.
    #[must_use]
    pub fn has(&self, field: ConfigField) -> bool {
        match field {
            ConfigField::Ssid => self.ssid.is_some(),
            ConfigField::Password => self.password.is_some(),
            ConfigField::Broker => self.broker.is_some(),
            ConfigField::Port => self.port.is_some(),
        }
    }

    /// Fields still missing, in handshake order.
    #[must_use]
    pub fn missing(&self) -> Vec<ConfigField> {
        ConfigField::ALL
            .into_iter()
            .filter(|field| !self.has(*field))
            .collect()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Freeze the accumulated fields into a [`ConfigSet`].
    ///
    /// # Errors
    /// Returns `Error::ConfigIncomplete` listing the missing keys.
    pub fn build(&self) -> Result<ConfigSet> {
        match (&self.ssid, &self.password, &self.broker, self.port) {
            (Some(ssid), Some(password), Some(broker), Some(port)) => Ok(ConfigSet {
                ssid: ssid.clone(),
                password: password.clone(),
                broker: broker.clone(),
                port,
            }),
            _ => Err(Error::ConfigIncomplete {
                missing: self
                    .missing()
                    .iter()
                    .map(|field| field.key())
                    .collect::<Vec<_>>()
                    .join(","),
            }),
        }
    }

    /// Forget every field.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Debug for PartialConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PartialConfig")
            .field("ssid", &self.ssid)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("broker", &self.broker)
            .field("port", &self.port)
            .finish()
    }
}
