//! The seam between the session client and a Reticulum stack.
//!
//! The client never touches sockets or link cryptography. It drives a
//! [`Transport`] for path discovery and session setup, talks to the hub
//! through a [`Session`], and receives everything the hub sends through the
//! [`SessionHandler`] it registers when opening the session.
//!
//! Handler methods may be called from transport-owned threads and may race
//! with [`Client::close`](crate::Client::close). Implementations of these
//! traits must not call back into the client while holding their own locks.

use std::sync::Arc;

use rrc_core::{DestinationHash, IdentityHash};

use crate::error::TransportError;

/// Opaque handle identifying a bulk transfer within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferHandle(pub u64);

/// Final state of a bulk transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Complete,
    Failed,
    Cancelled,
}

/// A remote identity recalled from the transport's announce table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecalledIdentity {
    pub hash: IdentityHash,
}

/// The identity this client authenticates with.
pub trait LocalIdentity: Send + Sync {
    fn hash(&self) -> IdentityHash;
}

/// A bulk transfer offered by the hub.
pub trait Transfer: Send + Sync {
    fn handle(&self) -> TransferHandle;

    /// Advertised payload size in bytes.
    fn size(&self) -> u64;

    /// Outcome once concluded.
    fn status(&self) -> TransferStatus;

    /// The received payload. Only meaningful when [`status`](Self::status)
    /// is [`TransferStatus::Complete`].
    fn read_data(&self) -> Result<Vec<u8>, TransportError>;

    /// Drop any buffered payload.
    fn release(&self);

    /// Abort an in-flight transfer.
    fn cancel(&self);
}

/// An established or establishing link to a hub.
pub trait Session: Send + Sync {
    /// Prove our identity to the remote end.
    fn identify(&self, identity: &dyn LocalIdentity) -> Result<(), TransportError>;

    /// Whether `payload` fits in a single frame on this session.
    fn would_fit(&self, payload: &[u8]) -> bool;

    fn send(&self, payload: &[u8]) -> Result<(), TransportError>;

    fn teardown(&self) -> Result<(), TransportError>;
}

/// Callbacks the transport delivers for one session.
pub trait SessionHandler: Send + Sync {
    fn on_established(&self);

    /// The session ended, for any reason other than a local teardown the
    /// client already accounted for.
    fn on_closed(&self);

    /// One inbound frame.
    fn on_frame(&self, data: &[u8]);

    /// The hub offers a bulk transfer. Return `true` to accept it.
    fn on_transfer_advertised(&self, transfer: Arc<dyn Transfer>) -> bool;

    /// A previously accepted transfer finished, failed or was cancelled.
    fn on_transfer_concluded(&self, transfer: Arc<dyn Transfer>);
}

/// Path discovery and session setup.
pub trait Transport: Send + Sync {
    fn request_path(&self, destination: &DestinationHash) -> Result<(), TransportError>;

    fn has_path(&self, destination: &DestinationHash) -> bool;

    /// Look up the identity that announced `destination`, if known.
    fn recall_identity(&self, destination: &DestinationHash) -> Option<RecalledIdentity>;

    /// Tear down any sessions to `destination` this process already holds.
    /// Returns `true` if something was torn down.
    fn teardown_sessions_to(&self, destination: &DestinationHash) -> bool;

    /// Begin establishing a session. `handler` receives every callback for
    /// the new session, possibly before this call returns.
    fn open_session(
        &self,
        hub: &RecalledIdentity,
        destination: &DestinationHash,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Arc<dyn Session>, TransportError>;
}
