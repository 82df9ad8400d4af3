//! Newtype wrappers for protocol byte fields.
//!
//! These types keep destination hashes, identity hashes and message ids from
//! being mixed up even though they share the same underlying representation.

use core::fmt;
use core::str::FromStr;

use crate::error::{HashParseError, InvalidLength};

/// Length of a truncated (128-bit) Reticulum hash.
pub const TRUNCATED_HASH_LEN: usize = 16;

/// Length of a destination name hash (80 bits).
pub const NAME_HASH_LEN: usize = 10;

fn fmt_hex(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

/// A destination hash: `SHA-256(name_hash || identity_hash)[:16]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct DestinationHash([u8; TRUNCATED_HASH_LEN]);

impl DestinationHash {
    pub const fn new(bytes: [u8; TRUNCATED_HASH_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; TRUNCATED_HASH_LEN] {
        self.0
    }
}

impl AsRef<[u8]> for DestinationHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for DestinationHash {
    type Error = InvalidLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; TRUNCATED_HASH_LEN] = bytes.try_into().map_err(|_| InvalidLength {
            expected: TRUNCATED_HASH_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl FromStr for DestinationHash {
    type Err = HashParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_hash(s)
    }
}

impl fmt::Display for DestinationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(&self.0, f)
    }
}

impl fmt::Debug for DestinationHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DestinationHash(")?;
        fmt_hex(&self.0[..4], f)?;
        write!(f, "..)")
    }
}

/// An identity hash (16-byte truncated hash of an identity's public keys).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct IdentityHash([u8; TRUNCATED_HASH_LEN]);

impl IdentityHash {
    pub const fn new(bytes: [u8; TRUNCATED_HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for IdentityHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for IdentityHash {
    type Error = InvalidLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; TRUNCATED_HASH_LEN] = bytes.try_into().map_err(|_| InvalidLength {
            expected: TRUNCATED_HASH_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(&self.0, f)
    }
}

impl fmt::Debug for IdentityHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IdentityHash(")?;
        fmt_hex(&self.0[..4], f)?;
        write!(f, "..)")
    }
}

/// A 10-byte name hash (first 80 bits of SHA-256 over `app.aspect...`).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct NameHash([u8; NAME_HASH_LEN]);

impl NameHash {
    pub const fn new(bytes: [u8; NAME_HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for NameHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(&self.0, f)
    }
}

impl fmt::Debug for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NameHash(")?;
        fmt_hex(&self.0[..4], f)?;
        write!(f, "..)")
    }
}

/// Correlation id carried in every envelope.
///
/// Locally generated ids are 8 random bytes; ids received from a hub are kept
/// verbatim whatever their length.
#[derive(Clone, PartialEq, Eq, Hash)]
#[must_use]
pub struct MessageId(Vec<u8>);

impl MessageId {
    /// Length of locally generated ids.
    pub const GENERATED_LEN: usize = 8;

    /// Generate a fresh random id.
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = vec![0u8; Self::GENERATED_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for MessageId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(&self.0, f)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId(")?;
        fmt_hex(&self.0, f)?;
        write!(f, ")")
    }
}

/// Parse a hub destination hash typed by a user.
///
/// Accepts upper or lower case hex, an optional `0x` prefix and embedded
/// whitespace. The decoded value must be exactly 16 bytes.
pub fn parse_hash(text: &str) -> Result<DestinationHash, HashParseError> {
    let lowered = text.trim().to_lowercase();
    let stripped = lowered.strip_prefix("0x").unwrap_or(&lowered);
    let compact: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();

    let bytes = hex::decode(&compact).map_err(|source| HashParseError::InvalidHex {
        input: text.to_owned(),
        source,
    })?;

    DestinationHash::try_from(bytes.as_slice())
        .map_err(|e| HashParseError::WrongLength(e.actual))
}
