//! Stream read loop.
//!
//! One task per live socket consumes the inbound byte stream as UTF-8
//! newline-delimited lines, classifies each line, and dispatches the
//! resulting events to every registered listener in order. The loop
//! yields between lines so a bursting server cannot starve the
//! runtime, and exits either silently (cooperative shutdown) or by
//! reporting an unexpected disconnect to its session.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;

use crate::codec::classify;
use crate::protocol::{InboundEvent, StreamError, StreamErrorKind};

use super::registry::ListenerRegistry;

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReaderExit {
    /// Cooperative cancellation from `close()`; exit silently.
    Shutdown,
    /// EOF or read error while the session was still open.
    Disconnected,
}

/// Run the read loop until shutdown or stream end.
///
/// Disconnect notification is the caller's job: the session decides
/// whether the exit was expected before telling listeners anything.
pub(crate) async fn run<R>(
    reader: R,
    registry: &ListenerRegistry,
    mut shutdown: watch::Receiver<bool>,
) -> ReaderExit
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                // A dropped sender means the session itself is gone.
                if changed.is_err() || *shutdown.borrow() {
                    return ReaderExit::Shutdown;
                }
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    dispatch_line(&line, registry);
                    // Pace dispatch between lines.
                    tokio::task::yield_now().await;
                },
                Ok(None) => {
                    tracing::debug!("stream reached EOF");
                    return ReaderExit::Disconnected;
                },
                Err(e) => {
                    tracing::debug!(error = %e, "stream read error");
                    return ReaderExit::Disconnected;
                },
            },
        }
    }
}

/// Classify one line and dispatch every resulting event.
pub(crate) fn dispatch_line(line: &str, registry: &ListenerRegistry) {
    for event in classify(line) {
        dispatch_event(&event, registry);
    }
}

/// Dispatch one event to all listeners, in registration order.
pub(crate) fn dispatch_event(event: &InboundEvent, registry: &ListenerRegistry) {
    let listeners = registry.snapshot();

    match event {
        InboundEvent::Presence(presence) => {
            for listener in &listeners {
                listener.notify_presence(presence);
            }
        },
        InboundEvent::Message(message) => {
            for listener in &listeners {
                listener.notify_message(message);
            }
        },
        InboundEvent::ServerError { code, raw } => {
            tracing::warn!(code, "server error document received");
            let error = StreamError::new(StreamErrorKind::ServerError, raw.clone());
            for listener in &listeners {
                listener.notify_error(&error);
            }
        },
        InboundEvent::Malformed { raw } => {
            tracing::warn!(line = %raw, "unparseable stream line");
            let error = StreamError::new(StreamErrorKind::ServerMessageParseError, raw.clone());
            for listener in &listeners {
                listener.notify_error(&error);
            }
        },
        InboundEvent::InvalidMessage { raw } => {
            tracing::warn!(line = %raw, "event missing required fields");
            let error = StreamError::new(StreamErrorKind::InvalidMessage, raw.clone());
            for listener in &listeners {
                listener.notify_error(&error);
            }
        },
    }
}

/// Report an unexpected disconnect to all listeners.
pub(crate) fn dispatch_disconnect(registry: &ListenerRegistry, detail: &str) {
    let error = StreamError::new(StreamErrorKind::ServerUnexpectedDisconnect, detail);
    for listener in registry.snapshot() {
        listener.notify_error(&error);
    }
}
