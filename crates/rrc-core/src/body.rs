//! Typed views over structured envelope bodies.
//!
//! HELLO, WELCOME and RESOURCE_ENVELOPE carry msgpack maps keyed by small
//! integers. Parsing is order-tolerant and ignores unknown keys.

use rmpv::Value;

use crate::constants::{
    B_HELLO_CAPS, B_HELLO_NAME, B_HELLO_VER, B_RES_ENCODING, B_RES_ID, B_RES_KIND, B_RES_SHA256,
    B_RES_SIZE, B_WELCOME_GREETING, B_WELCOME_HUB, B_WELCOME_VER, RES_KIND_MOTD, RES_KIND_NOTICE,
};
use crate::envelope::present;
use crate::error::EnvelopeError;

/// Length of the SHA-256 digest carried in a resource announcement.
pub const DIGEST_LEN: usize = 32;

/// Body of the client's HELLO.
#[derive(Debug, Clone, PartialEq)]
pub struct HelloBody {
    pub name: String,
    pub version: String,
    pub caps: Option<Value>,
}

impl HelloBody {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            caps: None,
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut entries = vec![
            (Value::from(B_HELLO_NAME), Value::from(self.name.as_str())),
            (Value::from(B_HELLO_VER), Value::from(self.version.as_str())),
        ];
        if let Some(caps) = &self.caps {
            entries.push((Value::from(B_HELLO_CAPS), caps.clone()));
        }
        Value::Map(entries)
    }
}

/// Body of the hub's WELCOME. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WelcomeBody {
    pub hub: Option<String>,
    pub version: Option<String>,
    pub greeting: Option<String>,
}

impl WelcomeBody {
    /// Read whatever string fields are present; non-map bodies yield an empty
    /// value rather than an error.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Map(entries)) = value else {
            return Self::default();
        };
        let text = |key| present(entries, key).and_then(Value::as_str).map(str::to_owned);
        Self {
            hub: text(B_WELCOME_HUB),
            version: text(B_WELCOME_VER),
            greeting: text(B_WELCOME_GREETING),
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut entries = Vec::new();
        for (key, field) in [
            (B_WELCOME_HUB, &self.hub),
            (B_WELCOME_VER, &self.version),
            (B_WELCOME_GREETING, &self.greeting),
        ] {
            if let Some(s) = field {
                entries.push((Value::from(key), Value::from(s.as_str())));
            }
        }
        Value::Map(entries)
    }
}

/// What a bulk transfer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// A room notice too large for one frame.
    Notice,
    /// The hub's message of the day.
    Motd,
}

impl ResourceKind {
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            RES_KIND_NOTICE => Some(ResourceKind::Notice),
            RES_KIND_MOTD => Some(ResourceKind::Motd),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Notice => RES_KIND_NOTICE,
            ResourceKind::Motd => RES_KIND_MOTD,
        }
    }
}

/// A RESOURCE_ENVELOPE body: the in-band announcement of a bulk transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAnnouncement {
    /// Key `0`: hub-side transfer id.
    pub id: Vec<u8>,
    /// Key `1`: payload kind.
    pub kind: ResourceKind,
    /// Key `2`: payload size in bytes (> 0).
    pub size: u64,
    /// Key `3`: SHA-256 of the payload.
    pub sha256: Option<[u8; DIGEST_LEN]>,
    /// Key `4`: text encoding label of the payload.
    pub encoding: Option<String>,
}

impl ResourceAnnouncement {
    /// Parse and shape-check an announcement body.
    pub fn from_value(value: Option<&Value>) -> Result<Self, EnvelopeError> {
        let entries = match value {
            Some(Value::Map(entries)) => entries,
            None => return Err(EnvelopeError::MissingField("body")),
            Some(_) => {
                return Err(EnvelopeError::InvalidField {
                    field: "body",
                    reason: "expected map",
                });
            }
        };

        let id = match present(entries, B_RES_ID).ok_or(EnvelopeError::MissingField("res.id"))? {
            Value::Binary(b) => b.clone(),
            _ => {
                return Err(EnvelopeError::InvalidField {
                    field: "res.id",
                    reason: "expected bytes",
                });
            }
        };

        let kind_str = present(entries, B_RES_KIND)
            .ok_or(EnvelopeError::MissingField("res.kind"))?
            .as_str()
            .ok_or(EnvelopeError::InvalidField {
                field: "res.kind",
                reason: "expected string",
            })?;
        let kind = ResourceKind::parse(kind_str).ok_or(EnvelopeError::InvalidField {
            field: "res.kind",
            reason: "unknown resource kind",
        })?;

        let size = present(entries, B_RES_SIZE)
            .ok_or(EnvelopeError::MissingField("res.size"))?
            .as_u64()
            .filter(|&s| s > 0)
            .ok_or(EnvelopeError::InvalidField {
                field: "res.size",
                reason: "expected positive integer",
            })?;

        let sha256 = match present(entries, B_RES_SHA256) {
            None => None,
            Some(Value::Binary(b)) => Some(<[u8; DIGEST_LEN]>::try_from(b.as_slice()).map_err(
                |_| EnvelopeError::InvalidField {
                    field: "res.sha256",
                    reason: "expected 32 bytes",
                },
            )?),
            Some(_) => {
                return Err(EnvelopeError::InvalidField {
                    field: "res.sha256",
                    reason: "expected bytes",
                });
            }
        };

        let encoding = match present(entries, B_RES_ENCODING) {
            None => None,
            Some(v) => Some(
                v.as_str()
                    .ok_or(EnvelopeError::InvalidField {
                        field: "res.encoding",
                        reason: "expected string",
                    })?
                    .to_owned(),
            ),
        };

        Ok(Self {
            id,
            kind,
            size,
            sha256,
            encoding,
        })
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut entries = vec![
            (Value::from(B_RES_ID), Value::Binary(self.id.clone())),
            (Value::from(B_RES_KIND), Value::from(self.kind.as_str())),
            (Value::from(B_RES_SIZE), Value::from(self.size)),
        ];
        if let Some(digest) = &self.sha256 {
            entries.push((Value::from(B_RES_SHA256), Value::Binary(digest.to_vec())));
        }
        if let Some(encoding) = &self.encoding {
            entries.push((Value::from(B_RES_ENCODING), Value::from(encoding.as_str())));
        }
        Value::Map(entries)
    }
}
