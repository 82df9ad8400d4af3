//! Session client for Reticulum Relay Chat (RRC) hubs.
//!
//! A [`Client`] connects to one hub over a Reticulum session supplied by a
//! [`Transport`], performs the HELLO/WELCOME handshake, sends room commands
//! and routes everything the hub sends to registered [`Callbacks`]. Notices
//! too large for one frame arrive as bulk transfers announced in-band; the
//! client accepts only transfers it was told to expect.

pub mod client;
pub mod config;
mod dispatch;
pub mod error;
pub mod events;
pub mod expectations;
pub mod handshake;
pub mod logging;
pub mod send;
pub mod testing;
pub mod transport;

pub use client::Client;
pub use config::ClientConfig;
pub use error::{ClientError, TransportError};
pub use events::Callbacks;
pub use expectations::{ExpectationTracker, ResourceExpectation};
pub use handshake::HandshakeState;
pub use send::{MESSAGE_TOO_LARGE, NOTICE_TOO_LARGE};
pub use transport::{
    LocalIdentity, RecalledIdentity, Session, SessionHandler, Transfer, TransferHandle,
    TransferStatus, Transport,
};
