//! Integrity tag binding an access result to the request that produced it.
//!
//! The tag is a 16-bit rolling checksum over `(identifier, door_id,
//! timestamp)`. Each input byte is folded into a 16-bit accumulator by a
//! rotate, an XOR and a multiply by an odd constant; inputs are separated by a
//! unit-separator byte so that moving bytes from one field to the next changes
//! the result.
//!
//! # Security
//!
//! This is tamper evidence against transport corruption and trivial replay
//! (paired with the timestamp). It is **not** a MAC: there is no key, the
//! function is public, and 16 bits can be brute-forced instantly. Anyone who
//! can write to the link can forge a matching tag.
//!
//! ```
//! use doorlink_protocol::{IntegrityTag, tag};
//!
//! let t = tag("04A1B2", "room1", 1000);
//! assert_eq!(t.to_string(), "6E4F");
//! assert_eq!("6e4f".parse::<IntegrityTag>().unwrap(), t);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use doorlink_core::{Error, Result};

const TAG_SEED: u16 = 0xA670;
const ROTATION: u32 = 5;
const DIFFUSION: u16 = 0x9E37;
const FIELD_SEPARATOR: u8 = 0x1F;

/// 16-bit integrity tag, rendered as four upper-case hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IntegrityTag(u16);

impl IntegrityTag {
    #[must_use]
    pub const fn new(value: u16) -> Self {
        IntegrityTag(value)
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Compare two tags in constant time.
    #[must_use]
    pub fn matches(self, other: IntegrityTag) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl fmt::Display for IntegrityTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

impl FromStr for IntegrityTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::MalformedFrame(format!(
                "integrity tag must be 4 hex digits, got {s:?}"
            )));
        }
        u16::from_str_radix(s, 16)
            .map(IntegrityTag)
            .map_err(|e| Error::MalformedFrame(format!("integrity tag {s:?}: {e}")))
    }
}

impl TryFrom<String> for IntegrityTag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<IntegrityTag> for String {
    fn from(tag: IntegrityTag) -> Self {
        tag.to_string()
    }
}

#[inline]
fn mix(acc: u16, byte: u8) -> u16 {
    (acc.rotate_left(ROTATION) ^ u16::from(byte)).wrapping_mul(DIFFUSION)
}

/// Compute the integrity tag of an access request.
///
/// Deterministic and stateless. The timestamp is folded in as 8 big-endian
/// bytes.
#[must_use]
pub fn tag(identifier: &str, door_id: &str, timestamp: u64) -> IntegrityTag {
    let mut acc = TAG_SEED;
    for &byte in identifier.as_bytes() {
        acc = mix(acc, byte);
    }
    acc = mix(acc, FIELD_SEPARATOR);
    for &byte in door_id.as_bytes() {
        acc = mix(acc, byte);
    }
    acc = mix(acc, FIELD_SEPARATOR);
    for byte in timestamp.to_be_bytes() {
        acc = mix(acc, byte);
    }
    IntegrityTag(acc)
}

/// Check an echoed tag against the recomputed one.
///
/// # Errors
/// Returns `Error::IntegrityMismatch` carrying both values.
pub fn verify(identifier: &str, door_id: &str, timestamp: u64, echoed: IntegrityTag) -> Result<()> {
    let expected = tag(identifier, door_id, timestamp);
    if expected.matches(echoed) {
        Ok(())
    } else {
        Err(Error::IntegrityMismatch {
            expected: expected.to_string(),
            actual: echoed.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("04A1B2", "room1", 1000, 0x6E4F)]
    #[case("04A1B2", "room1", 1001, 0xD018)]
    #[case("04A1B2", "room1", 999, 0x93AA)]
    #[case("04A1B3", "room1", 1000, 0x1D4E)]
    #[case("04A1B2", "room2", 1000, 0x1BE6)]
    #[case("", "", 0, 0x048D)]
    fn test_reference_values(
        #[case] identifier: &str,
        #[case] door: &str,
        #[case] timestamp: u64,
        #[case] expected: u16,
    ) {
        assert_eq!(tag(identifier, door, timestamp).value(), expected);
    }

    #[test]
    fn test_field_boundaries_matter() {
        assert_ne!(tag("04A1B2r", "oom1", 1000), tag("04A1B2", "room1", 1000));
        assert_eq!(tag("04A1B2r", "oom1", 1000).value(), 0xD7A9);
    }

    #[test]
    fn test_display_pads_to_four_digits() {
        assert_eq!(IntegrityTag::new(0x48D).to_string(), "048D");
    }

    #[rstest]
    #[case("48D")]
    #[case("6E4F0")]
    #[case("6E4G")]
    #[case("+E4F")]
    fn test_parse_rejects(#[case] input: &str) {
        assert!(input.parse::<IntegrityTag>().is_err());
    }

    #[test]
    fn test_verify() {
        let t = tag("04A1B2", "room1", 1000);
        assert!(verify("04A1B2", "room1", 1000, t).is_ok());

        let off_by_one = IntegrityTag::new(t.value().wrapping_add(1));
        match verify("04A1B2", "room1", 1000, off_by_one) {
            Err(Error::IntegrityMismatch { expected, actual }) => {
                assert_eq!(expected, "6E4F");
                assert_eq!(actual, "6E50");
            }
            other => panic!("expected mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_serde_as_hex_string() {
        let t = IntegrityTag::new(0x6E4F);
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"6E4F\"");
        let back: IntegrityTag = serde_json::from_str("\"6e4f\"").unwrap();
        assert_eq!(back, t);
    }
}
