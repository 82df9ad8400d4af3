//! Core types, constants, and wire formats for Reticulum Relay Chat (RRC).
//!
//! This crate defines the identifier newtypes, destination addressing, the
//! msgpack envelope exchanged with a hub, typed envelope bodies, and room-name
//! normalization. It performs no I/O.

pub mod body;
pub mod constants;
pub mod destination;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod room;
pub mod types;

pub use body::{DIGEST_LEN, HelloBody, ResourceAnnouncement, ResourceKind, WelcomeBody};
pub use constants::MessageType;
pub use destination::{app_and_aspects_from_name, destination_hash, hub_destination_hash, name_hash};
pub use envelope::Envelope;
pub use error::{DestinationNameError, EnvelopeError, HashParseError, InvalidLength, RoomNameError};
pub use room::{normalize_room, sanitize_text, validate_room_name};
pub use types::{DestinationHash, IdentityHash, MessageId, NameHash, parse_hash};
