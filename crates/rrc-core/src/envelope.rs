//! RRC envelope encoding and validation.
//!
//! Every frame exchanged with a hub is a msgpack map keyed by small integers:
//!
//! ```text
//! { 0: version, 1: type, 2: id(bytes), 3: ts_ms, 4: src(bytes),
//!   5: room?, 6: body?, 7: nick? }
//! ```
//!
//! Decoding validates field types so the dispatcher only ever sees
//! well-formed envelopes; anything else is an [`EnvelopeError`].

use std::time::{SystemTime, UNIX_EPOCH};

use rmpv::Value;

use crate::constants::{
    K_BODY, K_ID, K_NICK, K_ROOM, K_SRC, K_T, K_TS, K_V, MessageType, PROTOCOL_VERSION,
};
use crate::error::EnvelopeError;
use crate::types::{IdentityHash, MessageId};

/// A decoded or about-to-be-sent RRC envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Key `1`: type tag.
    pub msg_type: MessageType,
    /// Key `2`: correlation id.
    pub id: MessageId,
    /// Key `3`: sender clock in unix milliseconds, if present.
    pub timestamp_ms: Option<u64>,
    /// Key `4`: sender identity hash.
    pub src: Vec<u8>,
    /// Key `5`: room name.
    pub room: Option<String>,
    /// Key `6`: polymorphic body (string, map or list). `None` encodes as absent.
    pub body: Option<Value>,
    /// Key `7`: sender nickname.
    pub nick: Option<String>,
}

impl Envelope {
    /// Create an envelope with a fresh random id and the current timestamp.
    pub fn new(msg_type: MessageType, src: &IdentityHash) -> Self {
        Self {
            msg_type,
            id: MessageId::random(),
            timestamp_ms: Some(now_ms()),
            src: src.as_ref().to_vec(),
            room: None,
            body: None,
            nick: None,
        }
    }

    #[must_use]
    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    /// Attach a body. `Value::Nil` clears it.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = match body {
            Value::Nil => None,
            other => Some(other),
        };
        self
    }

    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_body(Value::String(text.into().into()))
    }

    #[must_use]
    pub fn with_nick(mut self, nick: impl Into<String>) -> Self {
        self.nick = Some(nick.into());
        self
    }

    /// The body as text, if it is a string.
    #[must_use]
    pub fn body_text(&self) -> Option<&str> {
        self.body.as_ref().and_then(Value::as_str)
    }

    /// Encode this envelope as msgpack bytes.
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        let mut entries = vec![
            (Value::from(K_V), Value::from(PROTOCOL_VERSION)),
            (Value::from(K_T), Value::from(self.msg_type.to_u64())),
            (Value::from(K_ID), Value::Binary(self.id.as_bytes().to_vec())),
        ];
        if let Some(ts) = self.timestamp_ms {
            entries.push((Value::from(K_TS), Value::from(ts)));
        }
        entries.push((Value::from(K_SRC), Value::Binary(self.src.clone())));
        if let Some(room) = &self.room {
            entries.push((Value::from(K_ROOM), Value::from(room.as_str())));
        }
        if let Some(body) = &self.body {
            entries.push((Value::from(K_BODY), body.clone()));
        }
        if let Some(nick) = &self.nick {
            entries.push((Value::from(K_NICK), Value::from(nick.as_str())));
        }

        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &Value::Map(entries))?;

        tracing::trace!(
            msg_type = %self.msg_type,
            len = buf.len(),
            "envelope encoded"
        );

        Ok(buf)
    }

    /// Decode and validate an envelope from msgpack bytes.
    pub fn decode(data: &[u8]) -> Result<Self, EnvelopeError> {
        let value = rmpv::decode::read_value(&mut &data[..])?;
        let entries = match value {
            Value::Map(entries) => entries,
            _ => return Err(EnvelopeError::NotAMap),
        };

        if let Some(v) = present(&entries, K_V) {
            let version = v.as_u64().ok_or(EnvelopeError::InvalidField {
                field: "version",
                reason: "expected unsigned integer",
            })?;
            if version != PROTOCOL_VERSION {
                return Err(EnvelopeError::UnsupportedVersion(version));
            }
        }

        let tag = present(&entries, K_T)
            .ok_or(EnvelopeError::MissingField("type"))?
            .as_u64()
            .ok_or(EnvelopeError::InvalidField {
                field: "type",
                reason: "expected unsigned integer",
            })?;
        let msg_type = MessageType::from_u64(tag).ok_or(EnvelopeError::UnknownType(tag))?;

        let id = match present(&entries, K_ID).ok_or(EnvelopeError::MissingField("id"))? {
            Value::Binary(b) => MessageId::from_bytes(b.clone()),
            _ => {
                return Err(EnvelopeError::InvalidField {
                    field: "id",
                    reason: "expected bytes",
                });
            }
        };

        let timestamp_ms = match present(&entries, K_TS) {
            None => None,
            Some(v) => Some(v.as_u64().ok_or(EnvelopeError::InvalidField {
                field: "ts",
                reason: "expected unsigned integer",
            })?),
        };

        let src = match present(&entries, K_SRC).ok_or(EnvelopeError::MissingField("src"))? {
            Value::Binary(b) => b.clone(),
            _ => {
                return Err(EnvelopeError::InvalidField {
                    field: "src",
                    reason: "expected bytes",
                });
            }
        };

        let room = optional_string(&entries, K_ROOM, "room")?;
        if room.is_none() && msg_type.requires_room() {
            return Err(EnvelopeError::MissingField("room"));
        }

        let nick = optional_string(&entries, K_NICK, "nick")?;
        let body = present(&entries, K_BODY).cloned();

        tracing::trace!(
            msg_type = %msg_type,
            len = data.len(),
            "envelope decoded"
        );

        Ok(Self {
            msg_type,
            id,
            timestamp_ms,
            src,
            room,
            body,
            nick,
        })
    }
}

/// Look up an integer key in a msgpack map, treating nil as absent.
pub(crate) fn present(entries: &[(Value, Value)], key: u64) -> Option<&Value> {
    entries
        .iter()
        .find(|(k, _)| k.as_u64() == Some(key))
        .map(|(_, v)| v)
        .filter(|v| !v.is_nil())
}

fn optional_string(
    entries: &[(Value, Value)],
    key: u64,
    field: &'static str,
) -> Result<Option<String>, EnvelopeError> {
    match present(entries, key) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_owned()))
            .ok_or(EnvelopeError::InvalidField {
                field,
                reason: "expected string",
            }),
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> IdentityHash {
        IdentityHash::new([0x11; 16])
    }

    fn encode_map(entries: Vec<(Value, Value)>) -> Vec<u8> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &Value::Map(entries)).unwrap();
        buf
    }

    fn base_entries(tag: u64) -> Vec<(Value, Value)> {
        vec![
            (Value::from(K_V), Value::from(1u64)),
            (Value::from(K_T), Value::from(tag)),
            (Value::from(K_ID), Value::Binary(vec![1, 2, 3, 4])),
            (Value::from(K_SRC), Value::Binary(vec![0xaa; 16])),
        ]
    }

    #[test]
    fn msg_envelope_survives_the_wire() {
        let env = Envelope::new(MessageType::Msg, &src())
            .with_room("lobby")
            .with_text("hello there")
            .with_nick("alice");
        let decoded = Envelope::decode(&env.encode().unwrap()).unwrap();
        assert_eq!(decoded, env);
        assert_eq!(decoded.body_text(), Some("hello there"));
    }

    #[test]
    fn encoded_keys_are_small_integers() {
        let env = Envelope::new(MessageType::Ping, &src());
        let bytes = env.encode().unwrap();
        let value = rmpv::decode::read_value(&mut &bytes[..]).unwrap();
        let Value::Map(entries) = value else {
            panic!("expected map");
        };
        let keys: Vec<u64> = entries.iter().map(|(k, _)| k.as_u64().unwrap()).collect();
        assert_eq!(keys, vec![K_V, K_T, K_ID, K_TS, K_SRC]);
    }

    #[test]
    fn nil_body_is_omitted() {
        let env = Envelope::new(MessageType::Join, &src())
            .with_room("r")
            .with_body(Value::Nil);
        assert!(env.body.is_none());
    }

    #[test]
    fn decode_accepts_minimal_hub_frame() {
        let mut entries = base_entries(MessageType::Welcome.to_u64());
        entries.remove(0);
        let env = Envelope::decode(&encode_map(entries)).unwrap();
        assert_eq!(env.msg_type, MessageType::Welcome);
        assert_eq!(env.id.as_bytes(), &[1, 2, 3, 4]);
        assert!(env.timestamp_ms.is_none());
        assert!(env.room.is_none());
    }

    #[test]
    fn decode_rejects_non_map() {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &Value::from("nope")).unwrap();
        assert!(matches!(Envelope::decode(&buf), Err(EnvelopeError::NotAMap)));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Envelope::decode(&[]).is_err());
        assert!(Envelope::decode(&[0xc1]).is_err());
    }

    #[test]
    fn decode_rejects_unknown_type() {
        let entries = base_entries(99);
        assert!(matches!(
            Envelope::decode(&encode_map(entries)),
            Err(EnvelopeError::UnknownType(99))
        ));
    }

    #[test]
    fn decode_rejects_wrong_version() {
        let mut entries = base_entries(MessageType::Ping.to_u64());
        entries[0].1 = Value::from(2u64);
        assert!(matches!(
            Envelope::decode(&encode_map(entries)),
            Err(EnvelopeError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn decode_rejects_string_id() {
        let mut entries = base_entries(MessageType::Ping.to_u64());
        entries[2].1 = Value::from("abcd");
        assert!(matches!(
            Envelope::decode(&encode_map(entries)),
            Err(EnvelopeError::InvalidField { field: "id", .. })
        ));
    }

    #[test]
    fn decode_rejects_missing_src() {
        let mut entries = base_entries(MessageType::Ping.to_u64());
        entries.pop();
        assert!(matches!(
            Envelope::decode(&encode_map(entries)),
            Err(EnvelopeError::MissingField("src"))
        ));
    }

    #[test]
    fn decode_requires_room_for_msg() {
        let entries = base_entries(MessageType::Msg.to_u64());
        assert!(matches!(
            Envelope::decode(&encode_map(entries)),
            Err(EnvelopeError::MissingField("room"))
        ));
    }

    #[test]
    fn decode_rejects_non_string_room() {
        let mut entries = base_entries(MessageType::Notice.to_u64());
        entries.push((Value::from(K_ROOM), Value::from(5u64)));
        assert!(matches!(
            Envelope::decode(&encode_map(entries)),
            Err(EnvelopeError::InvalidField { field: "room", .. })
        ));
    }

    #[test]
    fn decode_keeps_structured_body() {
        let mut entries = base_entries(MessageType::Error.to_u64());
        let body = Value::Map(vec![(Value::from(0u64), Value::from("denied"))]);
        entries.push((Value::from(K_BODY), body.clone()));
        let env = Envelope::decode(&encode_map(entries)).unwrap();
        assert_eq!(env.body, Some(body));
        assert_eq!(env.body_text(), None);
    }
}
