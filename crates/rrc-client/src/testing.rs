//! In-memory [`Transport`] doubles for exercising a [`Client`](crate::Client)
//! without a network.
//!
//! # Usage
//!
//! ```rust,ignore
//! use rrc_client::testing::{MockIdentity, MockTransport};
//!
//! let transport = MockTransport::new();
//! let hub = transport.add_hub("rrc.hub", IdentityHash::new([7; 16]));
//! let client = Client::new(transport.clone(), MockIdentity::new([1; 16]), config)?;
//! client.connect(hub, false, Duration::from_secs(5)).await?;
//! transport.handler().unwrap().on_established();
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rrc_core::{DestinationHash, Envelope, IdentityHash, hub_destination_hash};

use crate::error::TransportError;
use crate::transport::{
    LocalIdentity, RecalledIdentity, Session, SessionHandler, Transfer, TransferHandle,
    TransferStatus, Transport,
};

/// Single-frame payload limit of a default Reticulum link.
pub const DEFAULT_FRAME_LIMIT: usize = 431;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A fixed local identity.
#[derive(Debug)]
pub struct MockIdentity(pub IdentityHash);

impl MockIdentity {
    pub fn new(bytes: [u8; 16]) -> Arc<Self> {
        Arc::new(Self(IdentityHash::new(bytes)))
    }
}

impl LocalIdentity for MockIdentity {
    fn hash(&self) -> IdentityHash {
        self.0
    }
}

#[derive(Default)]
struct TransportState {
    paths: HashSet<DestinationHash>,
    identities: HashMap<DestinationHash, RecalledIdentity>,
    existing_sessions: HashSet<DestinationHash>,
    path_requests: Vec<DestinationHash>,
    teardown_requests: Vec<DestinationHash>,
    opened: Vec<(Arc<MockSession>, Arc<dyn SessionHandler>)>,
    open_error: Option<String>,
    frame_limit: Option<usize>,
}

/// A [`Transport`] whose routing table and sessions are scripted by the test.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<TransportState>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `identity` known with a path, announcing under `dest_name`.
    /// Returns the destination a client should connect to.
    pub fn add_hub(&self, dest_name: &str, identity: IdentityHash) -> DestinationHash {
        let destination = match hub_destination_hash(&identity, dest_name) {
            Ok(d) => d,
            Err(e) => panic!("invalid hub name {dest_name:?}: {e}"),
        };
        let mut state = lock(&self.state);
        state.paths.insert(destination);
        state
            .identities
            .insert(destination, RecalledIdentity { hash: identity });
        destination
    }

    /// Pretend a session to `destination` already exists in this process.
    pub fn add_existing_session(&self, destination: DestinationHash) {
        lock(&self.state).existing_sessions.insert(destination);
    }

    /// Make the next `open_session` calls fail.
    pub fn fail_open(&self, reason: &str) {
        lock(&self.state).open_error = Some(reason.to_string());
    }

    /// Frame limit for sessions opened from now on.
    pub fn set_frame_limit(&self, limit: usize) {
        lock(&self.state).frame_limit = Some(limit);
    }

    pub fn path_requests(&self) -> Vec<DestinationHash> {
        lock(&self.state).path_requests.clone()
    }

    pub fn teardown_requests(&self) -> Vec<DestinationHash> {
        lock(&self.state).teardown_requests.clone()
    }

    pub fn sessions_opened(&self) -> usize {
        lock(&self.state).opened.len()
    }

    /// The most recently opened session.
    pub fn session(&self) -> Option<Arc<MockSession>> {
        lock(&self.state).opened.last().map(|(s, _)| Arc::clone(s))
    }

    /// The handler registered with the most recently opened session.
    pub fn handler(&self) -> Option<Arc<dyn SessionHandler>> {
        lock(&self.state).opened.last().map(|(_, h)| Arc::clone(h))
    }
}

impl Transport for MockTransport {
    fn request_path(&self, destination: &DestinationHash) -> Result<(), TransportError> {
        lock(&self.state).path_requests.push(*destination);
        Ok(())
    }

    fn has_path(&self, destination: &DestinationHash) -> bool {
        lock(&self.state).paths.contains(destination)
    }

    fn recall_identity(&self, destination: &DestinationHash) -> Option<RecalledIdentity> {
        lock(&self.state).identities.get(destination).cloned()
    }

    fn teardown_sessions_to(&self, destination: &DestinationHash) -> bool {
        let mut state = lock(&self.state);
        state.teardown_requests.push(*destination);
        state.existing_sessions.remove(destination)
    }

    fn open_session(
        &self,
        _hub: &RecalledIdentity,
        _destination: &DestinationHash,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Arc<dyn Session>, TransportError> {
        let mut state = lock(&self.state);
        if let Some(reason) = &state.open_error {
            return Err(TransportError::OpenFailed(reason.clone()));
        }
        let session = Arc::new(MockSession::new(
            state.frame_limit.unwrap_or(DEFAULT_FRAME_LIMIT),
        ));
        state.opened.push((Arc::clone(&session), handler));
        Ok(session)
    }
}

/// A session that records what was sent instead of transmitting it.
pub struct MockSession {
    frame_limit: usize,
    sent: Mutex<Vec<Vec<u8>>>,
    identified: AtomicBool,
    torn_down: AtomicBool,
    fail_sends: AtomicBool,
}

impl MockSession {
    pub fn new(frame_limit: usize) -> Self {
        Self {
            frame_limit,
            sent: Mutex::new(Vec::new()),
            identified: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        lock(&self.sent).clone()
    }

    /// Every sent frame, decoded. Panics on a frame that does not decode.
    pub fn sent_envelopes(&self) -> Vec<Envelope> {
        self.sent()
            .iter()
            .map(|frame| match Envelope::decode(frame) {
                Ok(env) => env,
                Err(e) => panic!("client sent an undecodable frame: {e}"),
            })
            .collect()
    }

    pub fn was_identified(&self) -> bool {
        self.identified.load(Ordering::SeqCst)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }
}

impl Session for MockSession {
    fn identify(&self, _identity: &dyn LocalIdentity) -> Result<(), TransportError> {
        self.identified.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn would_fit(&self, payload: &[u8]) -> bool {
        payload.len() <= self.frame_limit
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(TransportError::SendFailed("scripted failure".into()));
        }
        lock(&self.sent).push(payload.to_vec());
        Ok(())
    }

    fn teardown(&self) -> Result<(), TransportError> {
        self.torn_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// A bulk transfer with a scripted payload and outcome.
pub struct MockTransfer {
    handle: TransferHandle,
    data: Vec<u8>,
    status: Mutex<TransferStatus>,
    read_fails: AtomicBool,
    releases: AtomicUsize,
    cancelled: AtomicBool,
}

impl MockTransfer {
    /// A transfer whose advertised size is `data.len()` and which completes.
    pub fn new(handle: u64, data: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            handle: TransferHandle(handle),
            data,
            status: Mutex::new(TransferStatus::Complete),
            read_fails: AtomicBool::new(false),
            releases: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
        })
    }

    pub fn set_status(&self, status: TransferStatus) {
        *lock(&self.status) = status;
    }

    pub fn set_read_fails(&self, fail: bool) {
        self.read_fails.store(fail, Ordering::SeqCst);
    }

    pub fn was_released(&self) -> bool {
        self.releases.load(Ordering::SeqCst) > 0
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Transfer for MockTransfer {
    fn handle(&self) -> TransferHandle {
        self.handle
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn status(&self) -> TransferStatus {
        *lock(&self.status)
    }

    fn read_data(&self) -> Result<Vec<u8>, TransportError> {
        if self.read_fails.load(Ordering::SeqCst) {
            return Err(TransportError::TransferData("scripted failure".into()));
        }
        Ok(self.data.clone())
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        *lock(&self.status) = TransferStatus::Cancelled;
    }
}
