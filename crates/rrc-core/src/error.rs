//! Error types for the rrc-core crate.

/// Error returned when a byte slice has the wrong length for a newtype.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid length: expected {expected} bytes, got {actual}")]
pub struct InvalidLength {
    pub expected: usize,
    pub actual: usize,
}

/// Failure to parse a user-supplied destination hash.
#[derive(Debug, thiserror::Error)]
pub enum HashParseError {
    #[error("invalid hash {input:?}: {source}")]
    InvalidHex {
        input: String,
        #[source]
        source: hex::FromHexError,
    },
    #[error("destination hash must be 16 bytes (got {0})")]
    WrongLength(usize),
}

/// Failure to split a destination name such as `rrc.hub`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DestinationNameError {
    #[error("destination name is empty")]
    Empty,
    #[error("destination name {0:?} contains an empty component")]
    EmptyComponent(String),
}

/// Envelope encode/decode and validation failures.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("msgpack decode failed: {0}")]
    Decode(#[from] rmpv::decode::Error),

    #[error("msgpack encode failed: {0}")]
    Encode(#[from] rmpv::encode::Error),

    #[error("expected a map")]
    NotAMap,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("unknown message type: {0}")]
    UnknownType(u64),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u64),
}

/// Reason a room name was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomNameError {
    #[error("room name is empty")]
    Empty,
    #[error("room name is longer than {max} characters")]
    TooLong { max: usize },
    #[error("room name contains whitespace")]
    Whitespace,
    #[error("room name contains invalid character {0:?}")]
    InvalidChar(char),
    #[error("room name has no alphanumeric character")]
    NoAlphanumeric,
    #[error("room name starts or ends with a dot")]
    DotBoundary,
    #[error("room name has consecutive special characters")]
    ConsecutiveSpecial,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_variants() {
        let len = InvalidLength {
            expected: 16,
            actual: 3,
        };
        assert_eq!(len.to_string(), "invalid length: expected 16 bytes, got 3");

        let missing = EnvelopeError::MissingField("id");
        assert_eq!(missing.to_string(), "missing field: id");

        let invalid = EnvelopeError::InvalidField {
            field: "room",
            reason: "expected string",
        };
        assert!(invalid.to_string().contains("room"));
        assert!(invalid.to_string().contains("expected string"));

        assert_eq!(
            HashParseError::WrongLength(4).to_string(),
            "destination hash must be 16 bytes (got 4)"
        );
        assert_eq!(
            RoomNameError::TooLong { max: 64 }.to_string(),
            "room name is longer than 64 characters"
        );
    }
}
