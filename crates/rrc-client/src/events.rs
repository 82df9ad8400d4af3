//! User callbacks for inbound events.
//!
//! Every slot is optional. Callbacks run on whatever thread delivered the
//! event and never while the client's internal lock is held, so they may
//! call back into the [`Client`](crate::Client). A panicking callback is
//! logged and contained.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use rrc_core::Envelope;

pub type EnvelopeCallback = Arc<dyn Fn(&Envelope) + Send + Sync>;
pub type CloseCallback = Arc<dyn Fn() + Send + Sync>;
pub type WarningCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// The set of event callbacks registered on a client.
#[derive(Clone, Default)]
pub struct Callbacks {
    welcome: Option<EnvelopeCallback>,
    message: Option<EnvelopeCallback>,
    notice: Option<EnvelopeCallback>,
    error: Option<EnvelopeCallback>,
    joined: Option<EnvelopeCallback>,
    parted: Option<EnvelopeCallback>,
    pong: Option<EnvelopeCallback>,
    close: Option<CloseCallback>,
    resource_warning: Option<WarningCallback>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_welcome(mut self, f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.welcome = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_message(mut self, f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.message = Some(Arc::new(f));
        self
    }

    /// Room notices and bulk-delivered notices or MOTD text. MOTD envelopes
    /// carry no room.
    #[must_use]
    pub fn on_notice(mut self, f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.notice = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.error = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_joined(mut self, f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.joined = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_parted(mut self, f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.parted = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_pong(mut self, f: impl Fn(&Envelope) + Send + Sync + 'static) -> Self {
        self.pong = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_close(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.close = Some(Arc::new(f));
        self
    }

    /// Human-readable warnings, such as an outgoing message that is too
    /// large for the link.
    #[must_use]
    pub fn on_resource_warning(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.resource_warning = Some(Arc::new(f));
        self
    }

    pub(crate) fn welcome(&self, env: &Envelope) {
        fire_envelope("welcome", self.welcome.as_ref(), env);
    }

    pub(crate) fn message(&self, env: &Envelope) {
        fire_envelope("message", self.message.as_ref(), env);
    }

    pub(crate) fn notice(&self, env: &Envelope) {
        fire_envelope("notice", self.notice.as_ref(), env);
    }

    pub(crate) fn error(&self, env: &Envelope) {
        fire_envelope("error", self.error.as_ref(), env);
    }

    pub(crate) fn joined(&self, env: &Envelope) {
        fire_envelope("joined", self.joined.as_ref(), env);
    }

    pub(crate) fn parted(&self, env: &Envelope) {
        fire_envelope("parted", self.parted.as_ref(), env);
    }

    pub(crate) fn pong(&self, env: &Envelope) {
        fire_envelope("pong", self.pong.as_ref(), env);
    }

    pub(crate) fn close(&self) {
        if let Some(f) = &self.close {
            guarded("close", || f());
        }
    }

    pub(crate) fn resource_warning(&self, text: &str) {
        if let Some(f) = &self.resource_warning {
            guarded("resource_warning", || f(text));
        }
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("welcome", &self.welcome.is_some())
            .field("message", &self.message.is_some())
            .field("notice", &self.notice.is_some())
            .field("error", &self.error.is_some())
            .field("joined", &self.joined.is_some())
            .field("parted", &self.parted.is_some())
            .field("pong", &self.pong.is_some())
            .field("close", &self.close.is_some())
            .field("resource_warning", &self.resource_warning.is_some())
            .finish()
    }
}

fn fire_envelope(slot: &'static str, callback: Option<&EnvelopeCallback>, env: &Envelope) {
    if let Some(f) = callback {
        guarded(slot, || f(env));
    }
}

fn guarded(slot: &'static str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(callback = slot, "user callback panicked");
    }
}
