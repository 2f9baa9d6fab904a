//! Command dialect vocabulary.
//!
//! Command frames are either `KEY=VALUE` pairs or bare tokens. The key/value
//! form splits on the first `=` only, so values may contain further `=`.
//!
//! | Frame | Direction | Meaning |
//! |-------|-----------|---------|
//! | `SSID=..`, `PASS=..`, `BROKER=..`, `PORT=..` | T → G | handshake field |
//! | `CONNECT` | T → G | start connecting once all fields are set |
//! | `BOOT_DONE`, `REQ_CONFIG` | G → T | gateway wants the handshake |
//! | `SSID_OK` .. `PORT_OK`, `PORT_INVALID` .. | G → T | field stored / rejected |
//! | `CONFIG_INCOMPLETE`, `CONFIG_LOCKED` | G → T | handshake refused |
//! | `WIFI_OK`, `WIFI_FAIL` | G → T | network join result |
//! | `BRK_OK`, `BRK_FAIL_RC=<rc>`, `SUB_FAIL` | G → T | broker connect result |
//! | `SYS_READY`, `BRK_RECONN` | G → T | link usable |
//! | `PUB_QUEUED`, `PUB_OK`, `PUB_FAIL` | G → T | publish progress |
//! | `TERM_BOOT` | T → G | terminal restarted |
//! | `UNKNOWN_CMD=<content>`, `FRAME_OVERFLOW`, `MALFORMED_EVENT` | both | diagnostics |

use std::fmt;
use std::str::FromStr;

use doorlink_core::{ConfigField, Error, Result, constants::KEY_VALUE_SEPARATOR};

use crate::frame::Frame;

/// Key of the diagnostic carrying a broker return code.
pub const BROKER_FAILURE_KEY: &str = "BRK_FAIL_RC";

/// Key of the diagnostic echoing an unrecognised command.
pub const UNKNOWN_COMMAND_KEY: &str = "UNKNOWN_CMD";

/// Bare status and control tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Connect,
    BootDone,
    TermBoot,
    ReqConfig,
    ConfigIncomplete,
    ConfigLocked,
    FieldOk(ConfigField),
    FieldInvalid(ConfigField),
    WifiOk,
    WifiFail,
    BrkOk,
    BrkFail,
    BrkReconn,
    SubFail,
    SysReady,
    PubQueued,
    PubOk,
    PubFail,
    FrameOverflow,
    MalformedEvent,
}

impl Token {
    const SIMPLE: [Token; 18] = [
        Token::Connect,
        Token::BootDone,
        Token::TermBoot,
        Token::ReqConfig,
        Token::ConfigIncomplete,
        Token::ConfigLocked,
        Token::WifiOk,
        Token::WifiFail,
        Token::BrkOk,
        Token::BrkFail,
        Token::BrkReconn,
        Token::SubFail,
        Token::SysReady,
        Token::PubQueued,
        Token::PubOk,
        Token::PubFail,
        Token::FrameOverflow,
        Token::MalformedEvent,
    ];

    /// Wire spelling.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Token::Connect => "CONNECT",
            Token::BootDone => "BOOT_DONE",
            Token::TermBoot => "TERM_BOOT",
            Token::ReqConfig => "REQ_CONFIG",
            Token::ConfigIncomplete => "CONFIG_INCOMPLETE",
            Token::ConfigLocked => "CONFIG_LOCKED",
            Token::FieldOk(field) => field.ack_token(),
            Token::FieldInvalid(field) => field.invalid_token(),
            Token::WifiOk => "WIFI_OK",
            Token::WifiFail => "WIFI_FAIL",
            Token::BrkOk => "BRK_OK",
            Token::BrkFail => "BRK_FAIL",
            Token::BrkReconn => "BRK_RECONN",
            Token::SubFail => "SUB_FAIL",
            Token::SysReady => "SYS_READY",
            Token::PubQueued => "PUB_QUEUED",
            Token::PubOk => "PUB_OK",
            Token::PubFail => "PUB_FAIL",
            Token::FrameOverflow => "FRAME_OVERFLOW",
            Token::MalformedEvent => "MALFORMED_EVENT",
        }
    }

    /// Whether the token reports a failed connection attempt.
    #[must_use]
    pub fn is_link_failure(self) -> bool {
        matches!(self, Token::WifiFail | Token::BrkFail | Token::SubFail)
    }

    /// Command frame carrying this token.
    #[must_use]
    pub fn to_frame(self) -> Frame {
        Frame::command(self.as_str())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Token {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(token) = Token::SIMPLE.into_iter().find(|t| t.as_str() == s) {
            return Ok(token);
        }
        for field in ConfigField::ALL {
            if field.ack_token() == s {
                return Ok(Token::FieldOk(field));
            }
            if field.invalid_token() == s {
                return Ok(Token::FieldInvalid(field));
            }
        }
        Err(Error::MalformedFrame(format!("unknown token: {s}")))
    }
}

/// A parsed command frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Handshake field, value kept as received.
    Config { field: ConfigField, value: String },
    /// Bare token.
    Token(Token),
    /// Broker connect failure with the client's return code.
    BrokerFailure { code: i32 },
    /// Peer did not recognise one of our frames.
    UnknownCommand(String),
    /// Anything outside the vocabulary.
    Other(String),
}

impl Command {
    /// Parse command frame content. Never fails; unknown content becomes
    /// [`Command::Other`].
    ///
    /// ```
    /// use doorlink_core::ConfigField;
    /// use doorlink_protocol::{Command, Token};
    ///
    /// assert_eq!(
    ///     Command::parse(" PORT =1883"),
    ///     Command::Config { field: ConfigField::Port, value: "1883".into() }
    /// );
    /// assert_eq!(Command::parse("SYS_READY"), Command::Token(Token::SysReady));
    /// assert_eq!(Command::parse("BRK_FAIL_RC=-2"), Command::BrokerFailure { code: -2 });
    /// ```
    #[must_use]
    pub fn parse(content: &str) -> Self {
        if let Some((key, value)) = content.split_once(KEY_VALUE_SEPARATOR) {
            let key = key.trim();
            if let Some(field) = ConfigField::from_key(key) {
                return Command::Config {
                    field,
                    value: value.to_string(),
                };
            }
            if key == BROKER_FAILURE_KEY
                && let Ok(code) = value.trim().parse()
            {
                return Command::BrokerFailure { code };
            }
            if key == UNKNOWN_COMMAND_KEY {
                return Command::UnknownCommand(value.to_string());
            }
            return Command::Other(content.to_string());
        }

        match content.parse::<Token>() {
            Ok(token) => Command::Token(token),
            Err(_) => Command::Other(content.to_string()),
        }
    }

    /// Handshake field frame.
    pub fn config(field: ConfigField, value: impl Into<String>) -> Self {
        Command::Config {
            field,
            value: value.into(),
        }
    }

    /// Whether this frame reports a failed connection attempt.
    #[must_use]
    pub fn is_link_failure(&self) -> bool {
        match self {
            Command::Token(token) => token.is_link_failure(),
            Command::BrokerFailure { .. } => true,
            _ => false,
        }
    }

    #[must_use]
    pub fn to_frame(&self) -> Frame {
        Frame::command(self.to_string())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Config { field, value } => write!(f, "{}={value}", field.key()),
            Command::Token(token) => f.write_str(token.as_str()),
            Command::BrokerFailure { code } => write!(f, "{BROKER_FAILURE_KEY}={code}"),
            Command::UnknownCommand(content) => write!(f, "{UNKNOWN_COMMAND_KEY}={content}"),
            Command::Other(content) => f.write_str(content),
        }
    }
}

impl From<Token> for Command {
    fn from(token: Token) -> Self {
        Command::Token(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("SSID=hotel wifi", Command::config(ConfigField::Ssid, "hotel wifi"))]
    #[case("PASS=p=q", Command::config(ConfigField::Password, "p=q"))]
    #[case("BROKER=10.0.0.2", Command::config(ConfigField::Broker, "10.0.0.2"))]
    #[case("PORT=1883", Command::config(ConfigField::Port, "1883"))]
    #[case("PASS=", Command::config(ConfigField::Password, ""))]
    #[case("CONNECT", Command::Token(Token::Connect))]
    #[case("PORT_INVALID", Command::Token(Token::FieldInvalid(ConfigField::Port)))]
    #[case("SSID_OK", Command::Token(Token::FieldOk(ConfigField::Ssid)))]
    #[case("BRK_FAIL_RC=-4", Command::BrokerFailure { code: -4 })]
    #[case("BRK_FAIL_RC=abc", Command::Other("BRK_FAIL_RC=abc".into()))]
    #[case("UNKNOWN_CMD=HELLO", Command::UnknownCommand("HELLO".into()))]
    #[case("HELLO", Command::Other("HELLO".into()))]
    #[case("ssid=x", Command::Other("ssid=x".into()))]
    fn test_parse(#[case] content: &str, #[case] expected: Command) {
        assert_eq!(Command::parse(content), expected);
    }

    #[test]
    fn test_every_token_round_trips_through_wire_spelling() {
        let mut tokens = Token::SIMPLE.to_vec();
        for field in ConfigField::ALL {
            tokens.push(Token::FieldOk(field));
            tokens.push(Token::FieldInvalid(field));
        }
        for token in tokens {
            assert_eq!(token.as_str().parse::<Token>().unwrap(), token);
        }
    }

    #[test]
    fn test_display_is_wire_content() {
        assert_eq!(
            Command::config(ConfigField::Port, "1883").to_frame().to_bytes(),
            b"PORT=1883|"
        );
        assert_eq!(Command::BrokerFailure { code: -2 }.to_string(), "BRK_FAIL_RC=-2");
        assert_eq!(
            Command::UnknownCommand("X".into()).to_string(),
            "UNKNOWN_CMD=X"
        );
    }

    #[rstest]
    #[case(Command::Token(Token::WifiFail), true)]
    #[case(Command::Token(Token::SubFail), true)]
    #[case(Command::BrokerFailure { code: -2 }, true)]
    #[case(Command::Token(Token::PubFail), false)]
    #[case(Command::Token(Token::ConfigIncomplete), false)]
    fn test_is_link_failure(#[case] command: Command, #[case] expected: bool) {
        assert_eq!(command.is_link_failure(), expected);
    }
}
