//! RRC wire constants: envelope keys, message types and body keys.

use core::fmt;

/// Protocol version written into every envelope.
pub const PROTOCOL_VERSION: u64 = 1;

// Envelope keys.
pub const K_V: u64 = 0;
pub const K_T: u64 = 1;
pub const K_ID: u64 = 2;
pub const K_TS: u64 = 3;
pub const K_SRC: u64 = 4;
pub const K_ROOM: u64 = 5;
pub const K_BODY: u64 = 6;
pub const K_NICK: u64 = 7;

// HELLO body keys.
pub const B_HELLO_NAME: u64 = 0;
pub const B_HELLO_VER: u64 = 1;
pub const B_HELLO_CAPS: u64 = 2;

// WELCOME body keys.
pub const B_WELCOME_HUB: u64 = 0;
pub const B_WELCOME_VER: u64 = 1;
pub const B_WELCOME_GREETING: u64 = 2;

// RESOURCE_ENVELOPE body keys.
pub const B_RES_ID: u64 = 0;
pub const B_RES_KIND: u64 = 1;
pub const B_RES_SIZE: u64 = 2;
pub const B_RES_SHA256: u64 = 3;
pub const B_RES_ENCODING: u64 = 4;

/// Resource kind string for room notices delivered out of band.
pub const RES_KIND_NOTICE: &str = "notice";
/// Resource kind string for the hub's message of the day.
pub const RES_KIND_MOTD: &str = "motd";

/// Envelope type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Hello,
    Welcome,
    Join,
    Joined,
    Part,
    Parted,
    Msg,
    Notice,
    Ping,
    Pong,
    Error,
    ResourceEnvelope,
}

impl MessageType {
    /// Wire value of this type tag.
    #[must_use]
    pub const fn to_u64(self) -> u64 {
        match self {
            MessageType::Hello => 1,
            MessageType::Welcome => 2,
            MessageType::Join => 10,
            MessageType::Joined => 11,
            MessageType::Part => 12,
            MessageType::Parted => 13,
            MessageType::Msg => 20,
            MessageType::Notice => 21,
            MessageType::Ping => 30,
            MessageType::Pong => 31,
            MessageType::Error => 40,
            MessageType::ResourceEnvelope => 50,
        }
    }

    /// Parse a wire type tag, `None` for unknown values.
    #[must_use]
    pub const fn from_u64(value: u64) -> Option<Self> {
        match value {
            1 => Some(MessageType::Hello),
            2 => Some(MessageType::Welcome),
            10 => Some(MessageType::Join),
            11 => Some(MessageType::Joined),
            12 => Some(MessageType::Part),
            13 => Some(MessageType::Parted),
            20 => Some(MessageType::Msg),
            21 => Some(MessageType::Notice),
            30 => Some(MessageType::Ping),
            31 => Some(MessageType::Pong),
            40 => Some(MessageType::Error),
            50 => Some(MessageType::ResourceEnvelope),
            _ => None,
        }
    }

    /// Whether envelopes of this type must name a room.
    #[must_use]
    pub const fn requires_room(self) -> bool {
        matches!(
            self,
            MessageType::Join | MessageType::Part | MessageType::Msg
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            MessageType::Hello => "HELLO",
            MessageType::Welcome => "WELCOME",
            MessageType::Join => "JOIN",
            MessageType::Joined => "JOINED",
            MessageType::Part => "PART",
            MessageType::Parted => "PARTED",
            MessageType::Msg => "MSG",
            MessageType::Notice => "NOTICE",
            MessageType::Ping => "PING",
            MessageType::Pong => "PONG",
            MessageType::Error => "ERROR",
            MessageType::ResourceEnvelope => "RESOURCE_ENVELOPE",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
