//! Outbound commands and the frame-size gate every send passes through.

use std::sync::Arc;

use rmpv::Value;
use rrc_core::{Envelope, MessageId, MessageType, normalize_room};

use crate::client::{Client, Inner};
use crate::error::ClientError;
use crate::transport::Session;

/// Warning raised when a chat message does not fit in one frame.
pub const MESSAGE_TOO_LARGE: &str = "Message is too large to send. Please shorten your message.";

/// Warning raised when a notice does not fit in one frame.
pub const NOTICE_TOO_LARGE: &str = "Notice is too large to send. Please shorten the notice.";

impl Inner {
    /// Send on the current session.
    pub(crate) fn send(&self, envelope: &Envelope) -> Result<(), ClientError> {
        let session = self.lock().session().ok_or(ClientError::NotConnected)?;
        self.transmit(&session, envelope)
    }

    /// Encode and send `envelope` on `session`, refusing anything that would
    /// not fit in a single frame.
    pub(crate) fn transmit(
        &self,
        session: &Arc<dyn Session>,
        envelope: &Envelope,
    ) -> Result<(), ClientError> {
        let payload = envelope.encode()?;
        if !session.would_fit(&payload) {
            tracing::warn!(
                msg_type = %envelope.msg_type,
                size = payload.len(),
                "envelope does not fit in one frame; not sending"
            );
            let warning = match envelope.msg_type {
                MessageType::Msg => Some(MESSAGE_TOO_LARGE),
                MessageType::Notice => Some(NOTICE_TOO_LARGE),
                _ => None,
            };
            if let Some(warning) = warning {
                self.callbacks().resource_warning(warning);
            }
            return Err(ClientError::MessageTooLarge {
                size: payload.len(),
            });
        }
        session.send(&payload)?;
        tracing::trace!(msg_type = %envelope.msg_type, len = payload.len(), "envelope sent");
        Ok(())
    }

    fn envelope(&self, msg_type: MessageType) -> Envelope {
        Envelope::new(msg_type, &self.identity.hash())
    }
}

impl Client {
    /// Ask the hub to join `room`, optionally with a room key.
    ///
    /// The room name is trimmed and lowercased. Membership is recorded only
    /// when the hub answers with JOINED.
    pub fn join(&self, room: &str, key: Option<&str>) -> Result<(), ClientError> {
        let room = room_arg(room)?;
        let mut env = self.inner.envelope(MessageType::Join).with_room(room);
        if let Some(key) = key.filter(|k| !k.is_empty()) {
            env = env.with_text(key);
        }
        self.inner.send(&env)
    }

    /// Leave `room`. It is dropped from [`rooms`](Self::rooms) once the
    /// PART has been sent.
    pub fn part(&self, room: &str) -> Result<(), ClientError> {
        let room = room_arg(room)?;
        let env = self.inner.envelope(MessageType::Part).with_room(room.as_str());
        self.inner.send(&env)?;
        self.inner.lock().rooms.remove(&room);
        Ok(())
    }

    /// Send a chat message, returning its id so the hub's echo can be
    /// matched.
    pub fn msg(&self, room: &str, text: &str) -> Result<MessageId, ClientError> {
        let room = room_arg(room)?;
        let env = self
            .inner
            .envelope(MessageType::Msg)
            .with_room(room)
            .with_text(text);
        self.inner.send(&env)?;
        Ok(env.id)
    }

    /// Send a notice to `room`.
    pub fn notice(&self, room: &str, text: &str) -> Result<MessageId, ClientError> {
        let room = room_arg(room)?;
        let env = self
            .inner
            .envelope(MessageType::Notice)
            .with_room(room)
            .with_text(text);
        self.inner.send(&env)?;
        Ok(env.id)
    }

    /// Send a PING with an optional body the hub will echo in its PONG.
    pub fn ping(&self, body: Option<Value>) -> Result<MessageId, ClientError> {
        let env = self
            .inner
            .envelope(MessageType::Ping)
            .with_body(body.unwrap_or(Value::Nil));
        self.inner.send(&env)?;
        Ok(env.id)
    }
}

fn room_arg(room: &str) -> Result<String, ClientError> {
    let room = normalize_room(room);
    if room.is_empty() {
        return Err(ClientError::InvalidInput("room name must not be empty".into()));
    }
    Ok(room)
}
