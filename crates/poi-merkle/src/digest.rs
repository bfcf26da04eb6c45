//! Fixed-width 32-byte hash value with `0x`-prefixed hex encoding.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced when parsing hex-encoded byte strings
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HexError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// A 32-byte BLAKE2b-256 output
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const LEN: usize = 32;

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self, HexError> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| HexError::Length {
            expected: Self::LEN,
            actual: slice.len(),
        })?;
        Ok(Self(bytes))
    }

    /// Parse from hex, with or without the `0x` prefix
    pub fn from_hex(s: &str) -> Result<Self, HexError> {
        let bytes = decode_prefixed_hex(s)?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        encode_prefixed_hex(&self.0)
    }
}

/// Decode a hex string that may carry a `0x` prefix
pub fn decode_prefixed_hex(s: &str) -> Result<Vec<u8>, HexError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(s)?)
}

/// Encode bytes as `0x`-prefixed lowercase hex
pub fn encode_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Digest {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Digest {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", hex::encode(&self.0[..8]))
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_prefix_is_optional_on_input() {
        let with_prefix = Digest::from_hex(&format!("0x{}", "ab".repeat(32))).unwrap();
        let without_prefix = Digest::from_hex(&"ab".repeat(32)).unwrap();
        assert_eq!(with_prefix, without_prefix);
        assert_eq!(with_prefix.to_hex(), format!("0x{}", "ab".repeat(32)));
    }

    #[test]
    fn test_wrong_length_is_rejected() {
        assert_eq!(
            Digest::from_hex("0xabcd"),
            Err(HexError::Length {
                expected: 32,
                actual: 2
            })
        );
        assert!(matches!(Digest::from_hex("0xzz"), Err(HexError::Hex(_))));
    }
}
