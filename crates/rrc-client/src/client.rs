//! The session client: shared state, lifecycle and transport callbacks.
//!
//! All mutable state lives behind one mutex. The lock is never held while
//! user callbacks run or while the transport is called, so callbacks may
//! re-enter the client freely.
//!
//! Every session is tagged with a generation number. Transport callbacks
//! carry the generation they were registered with and become no-ops once
//! the client has moved on, which makes late callbacks after
//! [`Client::close`] harmless.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use rrc_core::DestinationHash;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::Callbacks;
use crate::expectations::ExpectationTracker;
use crate::handshake::{self, HandshakeState};
use crate::transport::{LocalIdentity, Session, SessionHandler, Transfer, Transport};

/// Stand-in for "no deadline" when `now + timeout` does not fit in an
/// [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + after`, saturating to a far-future instant instead of panicking.
pub(crate) fn deadline_after(now: Instant, after: Duration) -> Instant {
    now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE)
}

/// A client for one RRC hub at a time.
///
/// Cloning is cheap and every clone drives the same session.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) identity: Arc<dyn LocalIdentity>,
    pub(crate) config: ClientConfig,
    pub(crate) ready: watch::Sender<bool>,
    state: Mutex<SharedState>,
}

pub(crate) struct SharedState {
    pub(crate) slot: Option<SessionSlot>,
    next_generation: u64,
    pub(crate) rooms: BTreeSet<String>,
    pub(crate) tracker: ExpectationTracker,
    pub(crate) handshake: HandshakeState,
    pub(crate) callbacks: Arc<Callbacks>,
}

/// The session currently owned by the client. `session` is `None` while
/// the transport is still opening it.
pub(crate) struct SessionSlot {
    pub(crate) generation: u64,
    pub(crate) hub: DestinationHash,
    pub(crate) session: Option<Arc<dyn Session>>,
}

impl SharedState {
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.slot.as_ref().is_some_and(|s| s.generation == generation)
    }

    pub(crate) fn session(&self) -> Option<Arc<dyn Session>> {
        self.slot.as_ref().and_then(|s| s.session.clone())
    }

    pub(crate) fn set_handshake(&mut self, next: HandshakeState) {
        if self.handshake != next {
            tracing::trace!(from = ?self.handshake, to = ?next, "handshake state");
            self.handshake = next;
        }
    }

    /// Reserve a fresh generation for a session about to be opened.
    pub(crate) fn begin_session(&mut self, hub: DestinationHash) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.slot = Some(SessionSlot {
            generation,
            hub,
            session: None,
        });
        self.set_handshake(HandshakeState::SessionPending);
        generation
    }
}

/// What [`Inner::detach`] took out of the shared state.
pub(crate) struct Detached {
    session: Option<Arc<dyn Session>>,
    transfers: Vec<Arc<dyn Transfer>>,
    callbacks: Arc<Callbacks>,
}

impl Client {
    /// Build a client. Fails if `config` does not validate.
    pub fn new(
        transport: Arc<dyn Transport>,
        identity: Arc<dyn LocalIdentity>,
        config: ClientConfig,
    ) -> Result<Self, ClientError> {
        config.validate()?;
        let tracker = ExpectationTracker::new(
            config.max_resource_bytes,
            config.resource_expectation_ttl(),
            config.max_pending_resource_expectations,
        );
        let (ready, _) = watch::channel(false);
        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                identity,
                config,
                ready,
                state: Mutex::new(SharedState {
                    slot: None,
                    next_generation: 0,
                    rooms: BTreeSet::new(),
                    tracker,
                    handshake: HandshakeState::Idle,
                    callbacks: Arc::new(Callbacks::default()),
                }),
            }),
        })
    }

    /// Replace the registered callbacks.
    pub fn set_callbacks(&self, callbacks: Callbacks) {
        self.inner.lock().callbacks = Arc::new(callbacks);
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Whether the client currently holds an opened session.
    pub fn is_connected(&self) -> bool {
        self.inner.lock().session().is_some()
    }

    /// Whether the hub has answered with WELCOME on the current session.
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    pub fn state(&self) -> HandshakeState {
        self.inner.lock().handshake
    }

    /// Destination of the current session, if any.
    pub fn hub(&self) -> Option<DestinationHash> {
        self.inner.lock().slot.as_ref().map(|s| s.hub)
    }

    /// Rooms the hub has confirmed, sorted.
    pub fn rooms(&self) -> Vec<String> {
        self.inner.lock().rooms.iter().cloned().collect()
    }

    /// Number of unclaimed transfer announcements.
    pub fn pending_expectations(&self) -> usize {
        let now = Instant::now();
        let mut state = self.inner.lock();
        state.tracker.evict_expired_at(now);
        state.tracker.pending_len()
    }

    /// Number of accepted transfers that have not concluded.
    pub fn active_transfers(&self) -> usize {
        self.inner.lock().tracker.active_len()
    }

    /// Close the current session.
    ///
    /// Clears joined rooms and transfer bookkeeping, cancels in-flight
    /// transfers, tears the session down and fires `on_close`. Calling it
    /// again, or with no session, does nothing.
    pub fn close(&self) {
        let Some(detached) = self.inner.detach(None) else {
            return;
        };
        tracing::info!("closing session");
        self.inner.finish_detach(detached, true);
    }
}

impl Inner {
    pub(crate) fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn callbacks(&self) -> Arc<Callbacks> {
        Arc::clone(&self.lock().callbacks)
    }

    /// Take the current session out of the shared state. With
    /// `Some(generation)` nothing happens unless that session is current.
    pub(crate) fn detach(&self, generation: Option<u64>) -> Option<Detached> {
        let mut state = self.lock();
        if let Some(generation) = generation
            && !state.is_current(generation)
        {
            return None;
        }
        let slot = state.slot.take()?;
        state.rooms.clear();
        let transfers = state.tracker.clear();
        state.set_handshake(HandshakeState::Closed);
        let callbacks = Arc::clone(&state.callbacks);
        drop(state);

        self.ready.send_replace(false);
        Some(Detached {
            session: slot.session,
            transfers,
            callbacks,
        })
    }

    /// Cancel transfers, optionally tear the session down, then notify.
    pub(crate) fn finish_detach(&self, detached: Detached, teardown: bool) {
        for transfer in &detached.transfers {
            transfer.cancel();
        }
        if teardown
            && let Some(session) = &detached.session
            && let Err(e) = session.teardown()
        {
            tracing::debug!(error = %e, "session teardown failed");
        }
        detached.callbacks.close();
    }

    /// Mark the current session ready if it is still `generation`.
    pub(crate) fn mark_ready(&self, generation: u64) -> bool {
        let mut state = self.lock();
        if !state.is_current(generation) {
            return false;
        }
        state.set_handshake(HandshakeState::Ready);
        drop(state);
        self.ready.send_replace(true);
        true
    }
}

/// The [`SessionHandler`] registered for one session generation.
pub(crate) struct SessionHooks {
    pub(crate) inner: Weak<Inner>,
    pub(crate) generation: u64,
    /// Budget for the HELLO loop, counted from establishment.
    pub(crate) timeout: Duration,
    pub(crate) runtime: Handle,
}

impl SessionHooks {
    /// The client, if it is alive and this session is still current.
    fn current(&self) -> Option<Arc<Inner>> {
        let inner = self.inner.upgrade()?;
        if inner.lock().is_current(self.generation) {
            Some(inner)
        } else {
            tracing::trace!(generation = self.generation, "ignoring stale session callback");
            None
        }
    }
}

impl SessionHandler for SessionHooks {
    fn on_established(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        {
            let mut state = inner.lock();
            if !state.is_current(self.generation) {
                tracing::trace!(generation = self.generation, "ignoring stale session callback");
                return;
            }
            if state.handshake != HandshakeState::SessionPending {
                tracing::debug!(
                    generation = self.generation,
                    state = ?state.handshake,
                    "ignoring repeated establish notification"
                );
                return;
            }
            state.set_handshake(HandshakeState::HelloRetry);
        }
        tracing::info!(generation = self.generation, "session established");
        let deadline = deadline_after(Instant::now(), self.timeout);
        self.runtime.spawn(handshake::hello_loop(
            Arc::downgrade(&inner),
            self.generation,
            deadline,
        ));
    }

    fn on_closed(&self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let Some(detached) = inner.detach(Some(self.generation)) else {
            return;
        };
        tracing::info!(generation = self.generation, "session closed by remote");
        inner.finish_detach(detached, false);
    }

    fn on_frame(&self, data: &[u8]) {
        if let Some(inner) = self.current() {
            inner.dispatch_frame(self.generation, data);
        }
    }

    fn on_transfer_advertised(&self, transfer: Arc<dyn Transfer>) -> bool {
        let Some(inner) = self.inner.upgrade() else {
            return false;
        };
        let now = Instant::now();
        let mut state = inner.lock();
        if !state.is_current(self.generation) {
            return false;
        }
        state.tracker.advertise_at(transfer, now)
    }

    fn on_transfer_concluded(&self, transfer: Arc<dyn Transfer>) {
        let Some(inner) = self.inner.upgrade() else {
            transfer.release();
            return;
        };
        inner.transfer_concluded(self.generation, transfer);
    }
}
