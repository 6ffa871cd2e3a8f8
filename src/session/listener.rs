//! Event listeners.
//!
//! Listeners declare their message-payload capability at registration
//! by implementing one of two extension traits: structured listeners
//! receive the parsed JSON value, text listeners receive the payload's
//! text form. A listener registered through the base trait alone
//! receives presence and error callbacks only; there is no way to
//! route a message to a listener without a payload capability, so the
//! original platform client's runtime "listener cannot handle
//! messages" failure is unrepresentable here.
//!
//! Callbacks run on the session's read task, one event at a time, in
//! registration order. They should return quickly; a callback may
//! re-enter the session (`send`, `add_listener`, `remove_listener`)
//! without deadlocking.

use std::sync::Arc;

use serde_json::Value;

use crate::protocol::{MessageEvent, PresenceEvent, StreamError};

/// Handle identifying a registered listener, returned by the
/// `add_*_listener` methods and accepted by `remove_listener`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Base listener capability: presence and error notifications.
pub trait SwarmListener: Send + Sync {
    /// A resource became available or unavailable in a swarm.
    fn on_presence(&self, _event: &PresenceEvent) {}

    /// A stream-level error occurred (parse failure, invalid message,
    /// server error document, or unexpected disconnect).
    fn on_error(&self, _error: &StreamError) {}
}

/// Structured-payload message capability.
pub trait JsonMessageListener: SwarmListener {
    /// A message arrived; `payload` is the parsed JSON value.
    fn on_message(&self, event: &MessageEvent, payload: &Value);
}

/// Text-payload message capability.
pub trait TextMessageListener: SwarmListener {
    /// A message arrived; `payload` is the payload's text form.
    fn on_message(&self, event: &MessageEvent, payload: &str);
}

/// A listener with its payload capability resolved at registration.
#[derive(Clone)]
pub(crate) enum RegisteredListener {
    Base(Arc<dyn SwarmListener>),
    Json(Arc<dyn JsonMessageListener>),
    Text(Arc<dyn TextMessageListener>),
}

impl RegisteredListener {
    pub(crate) fn notify_presence(&self, event: &PresenceEvent) {
        self.base().on_presence(event);
    }

    pub(crate) fn notify_error(&self, error: &StreamError) {
        self.base().on_error(error);
    }

    /// Route a message to the listener's declared representation.
    /// Base-only listeners have no message capability and are skipped.
    pub(crate) fn notify_message(&self, event: &MessageEvent) {
        match self {
            Self::Base(_) => {},
            Self::Json(listener) => listener.on_message(event, &event.payload),
            Self::Text(listener) => listener.on_message(event, &event.payload_text()),
        }
    }

    fn base(&self) -> &dyn SwarmListener {
        match self {
            Self::Base(listener) => listener.as_ref(),
            Self::Json(listener) => listener.as_ref(),
            Self::Text(listener) => listener.as_ref(),
        }
    }
}
