//! Connecting to a hub: path discovery, identity recall, session setup and
//! the HELLO/WELCOME exchange.
//!
//! ```text
//! Idle -> PathWait -> IdentityWait -> SessionPending -> HelloRetry -> Ready
//!                                                                    |
//!   any state -> Failed (timeout, mismatch, open error)       close -> Closed
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use rrc_core::{DestinationHash, Envelope, HelloBody, MessageType, hub_destination_hash, parse_hash};
use tokio::runtime::Handle;
use tokio::time::{Instant, sleep};

use crate::client::{Client, Inner, SessionHooks, deadline_after};
use crate::error::ClientError;
use crate::transport::{RecalledIdentity, SessionHandler};

/// Interval between polls of the transport while waiting.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Upper bound on waiting for a path before trying identity recall anyway.
pub const PATH_WAIT_MAX: Duration = Duration::from_secs(5);

/// Pause after tearing down a pre-existing session so the hub notices.
pub const DUPLICATE_SESSION_BACKOFF: Duration = Duration::from_secs(1);

/// Where a connection attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Idle,
    PathWait,
    IdentityWait,
    SessionPending,
    HelloRetry,
    Ready,
    Closed,
    Failed,
}

impl Client {
    /// Connect to the hub at `hub`.
    ///
    /// Waits up to [`PATH_WAIT_MAX`] for a path, then up to `timeout` to
    /// recall the hub's identity. The recalled identity must derive `hub`
    /// under the configured `dest_name`. Any session this client or the
    /// transport already holds to the hub is torn down first. With
    /// `wait_for_welcome` the call returns only once the hub's WELCOME
    /// arrives, or fails with [`ClientError::Timeout`] after `timeout`.
    ///
    /// # Panics
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn connect(
        &self,
        hub: DestinationHash,
        wait_for_welcome: bool,
        timeout: Duration,
    ) -> Result<(), ClientError> {
        let inner = &self.inner;

        // Drop our own previous session before anything else.
        self.close();
        inner.ready.send_replace(false);
        inner.lock().set_handshake(HandshakeState::PathWait);

        tracing::debug!(%hub, "requesting path");
        if let Err(e) = inner.transport.request_path(&hub) {
            tracing::debug!(%hub, error = %e, "path request failed");
        }
        let path_deadline = Instant::now() + timeout.min(PATH_WAIT_MAX);
        while !inner.transport.has_path(&hub) && Instant::now() < path_deadline {
            sleep(POLL_INTERVAL).await;
        }

        inner.lock().set_handshake(HandshakeState::IdentityWait);
        let Some(hub_identity) = recall_identity(inner, &hub, timeout).await else {
            inner.lock().set_handshake(HandshakeState::Failed);
            return Err(ClientError::Timeout("recalling hub identity"));
        };

        let expected = hub_destination_hash(&hub_identity.hash, &inner.config.dest_name)
            .map_err(|e| ClientError::Config(format!("invalid dest_name: {e}")))?;
        if expected != hub {
            inner.lock().set_handshake(HandshakeState::Failed);
            return Err(ClientError::InvalidInput(format!(
                "hub {hub} is not the '{}' destination of identity {} (expected {expected})",
                inner.config.dest_name, hub_identity.hash
            )));
        }

        if inner.transport.teardown_sessions_to(&hub) {
            tracing::debug!(%hub, "tore down existing session to hub");
            sleep(DUPLICATE_SESSION_BACKOFF).await;
        }

        let generation = inner.lock().begin_session(hub);
        let handler: Arc<dyn SessionHandler> = Arc::new(SessionHooks {
            inner: Arc::downgrade(inner),
            generation,
            timeout,
            runtime: Handle::current(),
        });

        let session = match inner.transport.open_session(&hub_identity, &hub, handler) {
            Ok(session) => session,
            Err(e) => {
                let mut state = inner.lock();
                if state.is_current(generation) {
                    state.slot = None;
                    state.set_handshake(HandshakeState::Failed);
                }
                return Err(e.into());
            }
        };

        let stored = {
            let mut state = inner.lock();
            match state.slot.as_mut() {
                Some(slot) if slot.generation == generation => {
                    slot.session = Some(Arc::clone(&session));
                    true
                }
                _ => false,
            }
        };
        if !stored {
            // Closed while the transport was opening it.
            if let Err(e) = session.teardown() {
                tracing::debug!(error = %e, "teardown of abandoned session failed");
            }
            return Err(ClientError::NotConnected);
        }
        tracing::info!(%hub, generation, "session opening");

        if !wait_for_welcome {
            return Ok(());
        }

        let mut ready = inner.ready.subscribe();
        match tokio::time::timeout(timeout, ready.wait_for(|r| *r)).await {
            Ok(Ok(_)) => Ok(()),
            _ => {
                let mut state = inner.lock();
                if state.is_current(generation) && state.handshake != HandshakeState::Ready {
                    state.set_handshake(HandshakeState::Failed);
                }
                tracing::warn!(%hub, "no WELCOME from hub");
                Err(ClientError::Timeout("waiting for WELCOME"))
            }
        }
    }

    /// [`connect`](Self::connect) to a hub given as hex text.
    pub async fn connect_str(
        &self,
        hub: &str,
        wait_for_welcome: bool,
        timeout: Duration,
    ) -> Result<(), ClientError> {
        let hub = parse_hash(hub).map_err(|e| ClientError::InvalidInput(e.to_string()))?;
        self.connect(hub, wait_for_welcome, timeout).await
    }
}

async fn recall_identity(
    inner: &Inner,
    hub: &DestinationHash,
    timeout: Duration,
) -> Option<RecalledIdentity> {
    let deadline = deadline_after(Instant::now(), timeout);
    loop {
        if let Some(identity) = inner.transport.recall_identity(hub) {
            return Some(identity);
        }
        if Instant::now() >= deadline {
            tracing::warn!(%hub, "hub identity not known");
            return None;
        }
        sleep(POLL_INTERVAL).await;
    }
}

/// Identify, then send HELLO every `hello_interval` until WELCOME arrives,
/// the attempt budget is spent, `deadline` passes, or the session is no
/// longer current.
pub(crate) async fn hello_loop(inner: Weak<Inner>, generation: u64, deadline: Instant) {
    let mut attempts = 0u32;
    let mut identified = false;
    let mut next_send = Instant::now();

    loop {
        let Some(client) = inner.upgrade() else {
            return;
        };
        if *client.ready.borrow() || attempts >= client.config.hello_max_attempts {
            return;
        }

        let session = {
            let state = client.lock();
            if !state.is_current(generation) {
                return;
            }
            state.session()
        };

        // The transport may report establishment before open returns.
        if let Some(session) = session {
            if !identified {
                identified = true;
                if let Err(e) = session.identify(client.identity.as_ref()) {
                    tracing::warn!(error = %e, "identify failed");
                }
            }
            let now = Instant::now();
            if now >= deadline {
                tracing::debug!(attempts, "HELLO deadline reached");
                return;
            }
            if now >= next_send {
                attempts += 1;
                tracing::debug!(attempt = attempts, "sending HELLO");
                if let Err(e) = client.transmit(&session, &hello_envelope(&client)) {
                    tracing::warn!(attempt = attempts, error = %e, "HELLO send failed");
                }
                next_send = deadline_after(now, client.config.hello_interval());
            }
        } else if Instant::now() >= deadline {
            return;
        }

        drop(client);
        sleep(POLL_INTERVAL).await;
    }
}

fn hello_envelope(inner: &Inner) -> Envelope {
    let body = HelloBody::new(
        inner.config.hello_name.as_str(),
        inner.config.hello_version.as_str(),
    );
    let env = Envelope::new(MessageType::Hello, &inner.identity.hash()).with_body(body.to_value());
    match &inner.config.nickname {
        Some(nick) => env.with_nick(nick.as_str()),
        None => env,
    }
}
