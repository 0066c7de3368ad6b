//! [`Hash`]: an opaque byte string with a bit width.
//!
//! Only two widths ever appear in MUA2FA: 256-bit public keys / seeds and
//! 512-bit signatures. Text form is always base-85; wire form is the raw
//! bytes with no length prefix, so the width must be known up front.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{Reader, Writer};
use crate::{ProtocolError, base85};

/// Width of an Ed25519 public key or private seed.
pub const KEY_BITS: usize = 256;

/// Width of an Ed25519 signature.
pub const SIGNATURE_BITS: usize = 512;

/// Opaque bytes with an integral bit length.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash(Vec<u8>);

impl Hash {
    /// Wraps raw bytes without any width check.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Wraps raw bytes, requiring exactly `bits` bits.
    ///
    /// # Errors
    /// [`ProtocolError::UnexpectedWidth`] on mismatch.
    pub fn with_width(bytes: impl Into<Vec<u8>>, bits: usize) -> Result<Self, ProtocolError> {
        let hash = Self(bytes.into());
        hash.expect_width(bits)?;
        Ok(hash)
    }

    /// Parses the base-85 text form.
    pub fn from_base85(text: &str) -> Result<Self, ProtocolError> {
        base85::decode(text).map(Self)
    }

    /// Renders the base-85 text form.
    pub fn to_base85(&self) -> Result<String, ProtocolError> {
        base85::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Number of bits.
    pub fn bits(&self) -> usize {
        self.0.len() * 8
    }

    /// Fails unless this hash is exactly `bits` wide.
    pub fn expect_width(&self, bits: usize) -> Result<(), ProtocolError> {
        if self.bits() != bits {
            return Err(ProtocolError::UnexpectedWidth {
                expected: bits,
                actual: self.bits(),
            });
        }
        Ok(())
    }

    /// Writes the raw bytes of a fixed-width field.
    ///
    /// # Errors
    /// [`ProtocolError::UnexpectedWidth`] if this hash is not `bits` wide;
    /// nothing is written in that case.
    pub fn write_fixed(&self, buf: &mut Writer, bits: usize) -> Result<(), ProtocolError> {
        self.expect_width(bits)?;
        buf.write_bytes(&self.0);
        Ok(())
    }

    /// Reads a fixed-width field of `bits` bits.
    pub fn read_fixed(buf: &mut Reader<'_>, bits: usize) -> Result<Self, ProtocolError> {
        Ok(Self(buf.read_bytes(bits / 8)?.to_vec()))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_base85() {
            Ok(text) => f.write_str(&text),
            // unaligned widths never come off the wire; hex is good enough
            Err(_) => self.0.iter().try_for_each(|b| write!(f, "{b:02x}")),
        }
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl FromStr for Hash {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base85(s)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let text = self.to_base85().map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_base85(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_width_matching_bits_succeeds() {
        let hash = Hash::with_width(vec![1u8; 32], KEY_BITS).unwrap();
        assert_eq!(hash.bits(), 256);
    }

    #[test]
    fn test_with_width_mismatch_returns_unexpected_width() {
        let err = Hash::with_width(vec![1u8; 32], SIGNATURE_BITS).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::UnexpectedWidth {
                expected: 512,
                actual: 256
            }
        );
    }

    #[test]
    fn test_display_and_from_str_agree() {
        let hash = Hash::from_bytes([0xde, 0xad, 0xbe, 0xef]);
        let text = hash.to_string();
        assert_eq!(text.parse::<Hash>().unwrap(), hash);
    }

    #[test]
    fn test_write_fixed_wrong_width_writes_nothing() {
        let mut buf = Writer::new();
        let hash = Hash::from_bytes(vec![0u8; 16]);
        assert!(hash.write_fixed(&mut buf, KEY_BITS).is_err());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_read_fixed_short_buffer_returns_eof() {
        let bytes = [0u8; 10];
        let mut reader = Reader::new(&bytes);
        let err = Hash::read_fixed(&mut reader, KEY_BITS).unwrap_err();
        assert_eq!(err, ProtocolError::UnexpectedEof { needed: 22 });
    }

    #[test]
    fn test_serde_uses_base85_string() {
        let hash = Hash::from_bytes([0, 0, 0, 0]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, "\"00000\"");
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn test_serde_rejects_bad_base85() {
        let result: Result<Hash, _> = serde_json::from_str("\"~~~~~\"");
        assert!(result.is_err());
    }
}
