//! Typed events decoded from the inbound stream.
//!
//! Each line the server sends (once chunk-size lines and HTTP artifacts
//! are filtered out) decodes into one or more [`InboundEvent`]s. Events
//! are created by the read loop, dispatched once, and not retained.

use serde_json::Value;

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A resource became available or unavailable in a swarm.
    Presence(PresenceEvent),
    /// A message payload addressed to us.
    Message(MessageEvent),
    /// The server sent a `code`-bearing error document.
    ServerError {
        /// Error code reported by the server.
        code: i64,
        /// The raw JSON text of the error document.
        raw: String,
    },
    /// A line that was neither JSON nor a recognizable HTTP artifact.
    Malformed {
        /// The offending raw line.
        raw: String,
    },
    /// JSON that parsed but lacked the required fields for its
    /// apparent event kind.
    InvalidMessage {
        /// The raw JSON text.
        raw: String,
    },
}

/// Presence notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceEvent {
    /// Swarm the presence change occurred in, when reported.
    pub swarm_id: Option<String>,
    /// Resource whose presence changed, when reported.
    pub resource_id: Option<String>,
    /// Whether the resource is now available. Absence of an explicit
    /// `type` on the wire means available.
    pub available: bool,
}

/// Message event.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    /// The message payload.
    pub payload: Value,
    /// Originating swarm, when reported.
    pub swarm_id: Option<String>,
    /// Originating resource, when reported.
    pub resource_id: Option<String>,
    /// Whether the message was sent publicly. Defaults to `false`.
    pub public: bool,
}

impl MessageEvent {
    /// The payload's text form, as delivered to text-capability
    /// listeners: a JSON string payload is delivered unquoted, anything
    /// else as its compact JSON rendering.
    pub fn payload_text(&self) -> String {
        match &self.payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Error codes surfaced to listeners.
///
/// These never cross the read-loop boundary as `Err`; they are
/// delivered through [`crate::session::SwarmListener::on_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamErrorKind {
    /// A line looked like neither JSON nor an HTTP artifact.
    ServerMessageParseError,
    /// The socket closed or errored while not explicitly shutting down.
    ServerUnexpectedDisconnect,
    /// JSON parsed but lacked required fields for its apparent kind.
    InvalidMessage,
    /// The server itself sent an error document.
    ServerError,
}

impl StreamErrorKind {
    /// Stable name for logs and diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ServerMessageParseError => "SERVER_MESSAGE_PARSE_ERROR",
            Self::ServerUnexpectedDisconnect => "SERVER_UNEXPECTED_DISCONNECT",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::ServerError => "SERVER_ERROR",
        }
    }
}

impl std::fmt::Display for StreamErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// An error event delivered to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamError {
    /// Error classification.
    pub kind: StreamErrorKind,
    /// Raw wire text or a human-readable detail, depending on the kind.
    pub detail: String,
}

impl StreamError {
    /// Create a new stream error.
    pub fn new(kind: StreamErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

impl std::fmt::Display for StreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_text_unquotes_strings() {
        let event = MessageEvent {
            payload: json!("hello"),
            swarm_id: None,
            resource_id: None,
            public: false,
        };
        assert_eq!(event.payload_text(), "hello");
    }

    #[test]
    fn test_payload_text_renders_objects_compactly() {
        let event = MessageEvent {
            payload: json!({"a": 1}),
            swarm_id: None,
            resource_id: None,
            public: false,
        };
        assert_eq!(event.payload_text(), r#"{"a":1}"#);
    }

    #[test]
    fn test_error_kind_names() {
        assert_eq!(
            StreamErrorKind::ServerUnexpectedDisconnect.name(),
            "SERVER_UNEXPECTED_DISCONNECT"
        );
        assert_eq!(
            StreamErrorKind::ServerMessageParseError.to_string(),
            "SERVER_MESSAGE_PARSE_ERROR"
        );
    }
}
