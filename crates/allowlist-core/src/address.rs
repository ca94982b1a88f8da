//! Address Canonicalization
//!
//! Normalizes account address strings into the exact 20 raw bytes that are
//! hashed into a Merkle leaf.

use crate::error::AllowlistError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of an account address in bytes
pub const ADDRESS_LEN: usize = 20;

/// A 20-byte account identifier.
///
/// Equality is byte-exact, so `0xABCD…` and `0xabcd…` parse to the same
/// value. Rendered as lowercase `0x`-prefixed hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// Wrap raw address bytes
    #[must_use]
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse an address string.
    ///
    /// The input must be exactly `0x` followed by 40 hex digits. Hex digits
    /// are accepted in either case; no checksum validation is performed.
    ///
    /// # Errors
    /// Returns [`AllowlistError::InvalidAddressFormat`] for anything else.
    pub fn parse(input: &str) -> Result<Self, AllowlistError> {
        let invalid = || AllowlistError::InvalidAddressFormat(input.to_string());

        let digits = input.strip_prefix("0x").ok_or_else(invalid)?;
        if digits.len() != ADDRESS_LEN * 2 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| invalid())?;
        Ok(Self(bytes))
    }

    /// Raw bytes, as fed to the leaf hasher
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Consume into raw bytes
    #[must_use]
    pub const fn into_bytes(self) -> [u8; ADDRESS_LEN] {
        self.0
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }
}

impl FromStr for Address {
    type Err = AllowlistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
