//! Routing of inbound frames and concluded transfers to user callbacks.

use std::sync::Arc;

use encoding_rs::{Encoding, UTF_8};
use rmpv::Value;
use rrc_core::hash::sha256;
use rrc_core::{
    Envelope, MessageId, MessageType, ResourceAnnouncement, ResourceKind, WelcomeBody,
    normalize_room,
};
use tokio::time::Instant;

use crate::client::Inner;
use crate::expectations::ResourceExpectation;
use crate::transport::{Transfer, TransferStatus};

impl Inner {
    /// Decode one frame from session `generation` and act on it.
    ///
    /// Undecodable frames are dropped. Nothing here raises to the transport.
    pub(crate) fn dispatch_frame(&self, generation: u64, data: &[u8]) {
        let env = match Envelope::decode(data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(len = data.len(), error = %e, "dropping undecodable frame");
                return;
            }
        };
        tracing::trace!(msg_type = %env.msg_type, id = %env.id, "frame received");

        match env.msg_type {
            MessageType::Ping => self.answer_ping(&env),
            MessageType::Pong => self.callbacks().pong(&env),
            MessageType::Welcome => {
                if self.mark_ready(generation) {
                    let welcome = WelcomeBody::from_value(env.body.as_ref());
                    tracing::info!(
                        hub = welcome.hub.as_deref().unwrap_or("?"),
                        version = welcome.version.as_deref().unwrap_or("?"),
                        "welcome received"
                    );
                    self.callbacks().welcome(&env);
                }
            }
            MessageType::Joined | MessageType::Parted => self.membership(env),
            MessageType::Msg => self.callbacks().message(&env),
            MessageType::Notice => self.callbacks().notice(&env),
            MessageType::Error => self.callbacks().error(&env),
            MessageType::ResourceEnvelope => self.expect_transfer(generation, env),
            MessageType::Hello | MessageType::Join | MessageType::Part => {
                tracing::debug!(msg_type = %env.msg_type, "ignoring client-only frame from hub");
            }
        }
    }

    fn membership(&self, mut env: Envelope) {
        let Some(room) = env.room.as_deref().map(normalize_room).filter(|r| !r.is_empty()) else {
            tracing::debug!(msg_type = %env.msg_type, "ignoring membership frame without room");
            return;
        };
        let joined = env.msg_type == MessageType::Joined;
        let callbacks = {
            let mut state = self.lock();
            if joined {
                state.rooms.insert(room.clone());
            } else {
                state.rooms.remove(&room);
            }
            Arc::clone(&state.callbacks)
        };
        env.room = Some(room);
        if joined {
            callbacks.joined(&env);
        } else {
            callbacks.parted(&env);
        }
    }

    fn answer_ping(&self, ping: &Envelope) {
        let pong = Envelope::new(MessageType::Pong, &self.identity.hash())
            .with_body(ping.body.clone().unwrap_or(Value::Nil));
        if let Err(e) = self.send(&pong) {
            tracing::debug!(error = %e, "failed to answer PING");
        }
    }

    fn expect_transfer(&self, generation: u64, env: Envelope) {
        let announcement = match ResourceAnnouncement::from_value(env.body.as_ref()) {
            Ok(a) => a,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed transfer announcement");
                return;
            }
        };
        let now = Instant::now();
        let mut state = self.lock();
        if state.is_current(generation) {
            state.tracker.announce_at(announcement, env.room, env.src, now);
        }
    }

    /// Handle a finished transfer: verify, decode and deliver its text.
    ///
    /// The transfer's buffer is released on every path.
    pub(crate) fn transfer_concluded(&self, generation: u64, transfer: Arc<dyn Transfer>) {
        let handle = transfer.handle();
        let expectation = {
            let mut state = self.lock();
            if state.is_current(generation) {
                state.tracker.conclude(handle)
            } else {
                None
            }
        };
        let Some(expectation) = expectation else {
            tracing::debug!(?handle, "concluded transfer was not expected");
            transfer.release();
            return;
        };

        let status = transfer.status();
        if status != TransferStatus::Complete {
            tracing::debug!(?handle, ?status, "transfer did not complete");
            transfer.release();
            return;
        }

        let data = transfer.read_data();
        transfer.release();
        let data = match data {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(?handle, error = %e, "could not read transfer payload");
                return;
            }
        };

        if let Some(digest) = &expectation.digest
            && sha256(&data) != *digest
        {
            tracing::warn!(?handle, id = %hex::encode(&expectation.id), "transfer digest mismatch");
            return;
        }

        let Some(text) = decode_text(&data, expectation.encoding.as_deref()) else {
            tracing::warn!(
                ?handle,
                encoding = expectation.encoding.as_deref().unwrap_or("utf-8"),
                "could not decode transfer payload"
            );
            return;
        };

        let env = delivered_notice(expectation, text);
        tracing::debug!(?handle, room = env.room.as_deref(), "delivering transferred notice");
        self.callbacks().notice(&env);
    }
}

/// Decode `data` as text in the labelled encoding (UTF-8 by default).
/// Returns `None` for unknown labels or malformed input.
pub(crate) fn decode_text(data: &[u8], label: Option<&str>) -> Option<String> {
    let encoding = match label {
        None => UTF_8,
        Some(label) => Encoding::for_label(label.trim().as_bytes())?,
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(data)
        .map(|text| text.into_owned())
}

/// The NOTICE envelope reported for a completed transfer. MOTD payloads
/// carry no room.
fn delivered_notice(expectation: ResourceExpectation, text: String) -> Envelope {
    Envelope {
        msg_type: MessageType::Notice,
        id: MessageId::from_bytes(expectation.id),
        timestamp_ms: None,
        src: expectation.src,
        room: match expectation.kind {
            ResourceKind::Notice => expectation.room,
            ResourceKind::Motd => None,
        },
        body: Some(Value::from(text)),
        nick: None,
    }
}
