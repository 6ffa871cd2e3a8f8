//! Inbound line classification.
//!
//! The read loop consumes the stream as a flat line sequence rather
//! than decoding chunk boundaries explicitly, so the server's own
//! chunk-size lines (bare base-16 integers) arrive interleaved with
//! the JSON event lines and must be filtered here. HTTP status and
//! header lines from the response head are filtered the same way.

use serde_json::Value;

use crate::protocol::{InboundEvent, MessageEvent, PresenceEvent};

/// Classify one raw line into zero or more events.
///
/// An empty result means the line carried no event (blank line,
/// chunk-size line, or HTTP artifact). A message whose payload is a
/// JSON array fans out to one event per element, in array order,
/// sharing the same swarm/resource/public metadata.
pub fn classify(raw: &str) -> Vec<InboundEvent> {
    let line = raw.trim();

    if line.is_empty() {
        return Vec::new();
    }

    // Chunk-size line from the server's chunked-transfer framing.
    if u64::from_str_radix(line, 16).is_ok() {
        return Vec::new();
    }

    if !is_json_delimited(line) {
        if line.starts_with("HTTP") || line.contains(':') {
            return Vec::new();
        }
        return vec![InboundEvent::Malformed {
            raw: line.to_string(),
        }];
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(_) => {
            return vec![InboundEvent::Malformed {
                raw: line.to_string(),
            }]
        },
    };

    if let Some(presence) = value.get("presence") {
        return classify_presence(presence, line);
    }

    if let Some(message) = value.get("message") {
        return classify_message(message, &value, line);
    }

    if let Some(code) = value.get("code") {
        return vec![InboundEvent::ServerError {
            code: code.as_i64().unwrap_or(-1),
            raw: line.to_string(),
        }];
    }

    vec![InboundEvent::InvalidMessage {
        raw: line.to_string(),
    }]
}

fn is_json_delimited(line: &str) -> bool {
    (line.starts_with('{') && line.ends_with('}'))
        || (line.starts_with('[') && line.ends_with(']'))
}

fn classify_presence(presence: &Value, raw: &str) -> Vec<InboundEvent> {
    let Some(from) = presence.get("from") else {
        return vec![InboundEvent::InvalidMessage {
            raw: raw.to_string(),
        }];
    };

    // Absence of an explicit type means available; any explicit type
    // other than "available" does not.
    let available = from
        .get("type")
        .and_then(Value::as_str)
        .map_or(true, |t| t == "available");

    vec![InboundEvent::Presence(PresenceEvent {
        swarm_id: string_field(from, "swarm"),
        resource_id: string_field(from, "resource"),
        available,
    })]
}

fn classify_message(message: &Value, envelope: &Value, raw: &str) -> Vec<InboundEvent> {
    let Some(payload) = message.get("payload") else {
        return vec![InboundEvent::InvalidMessage {
            raw: raw.to_string(),
        }];
    };

    let from = envelope.get("from").unwrap_or(&Value::Null);
    let swarm_id = string_field(from, "swarm");
    let resource_id = string_field(from, "resource");
    let public = envelope
        .get("public")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let event = |payload: Value| {
        InboundEvent::Message(MessageEvent {
            payload,
            swarm_id: swarm_id.clone(),
            resource_id: resource_id.clone(),
            public,
        })
    };

    match payload {
        Value::Array(elements) => elements.iter().cloned().map(event).collect(),
        single => vec![event(single.clone())],
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_line_ignored() {
        assert!(classify("").is_empty());
        assert!(classify("   ").is_empty());
    }

    #[test]
    fn test_chunk_size_lines_ignored() {
        for line in ["0", "1a", "ff", "2B", "deadbeef"] {
            assert!(classify(line).is_empty(), "expected ignore for {line:?}");
        }
    }

    #[test]
    fn test_http_artifacts_ignored() {
        assert!(classify("HTTP/1.1 200 OK").is_empty());
        assert!(classify("Content-Type: application/json").is_empty());
        assert!(classify("Transfer-Encoding: chunked").is_empty());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let events = classify("not json at all");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], InboundEvent::Malformed { .. }));
    }

    #[test]
    fn test_presence_defaults_to_available() {
        let events = classify(r#"{"presence":{"from":{"swarm":"s1","resource":"r1"}}}"#);
        assert_eq!(
            events,
            vec![InboundEvent::Presence(PresenceEvent {
                swarm_id: Some("s1".to_string()),
                resource_id: Some("r1".to_string()),
                available: true,
            })]
        );
    }

    #[test]
    fn test_presence_unavailable() {
        let events = classify(
            r#"{"presence":{"from":{"swarm":"s1","resource":"r1","type":"unavailable"}}}"#,
        );
        match &events[0] {
            InboundEvent::Presence(p) => assert!(!p.available),
            other => panic!("expected presence, got {other:?}"),
        }
    }

    #[test]
    fn test_presence_explicit_available() {
        let events =
            classify(r#"{"presence":{"from":{"swarm":"s1","resource":"r1","type":"available"}}}"#);
        match &events[0] {
            InboundEvent::Presence(p) => assert!(p.available),
            other => panic!("expected presence, got {other:?}"),
        }
    }

    #[test]
    fn test_presence_unknown_type_is_unavailable() {
        // Only an explicit "available" (or no type at all) counts as
        // available; anything else means the resource is not reachable.
        let events =
            classify(r#"{"presence":{"from":{"swarm":"s1","resource":"r1","type":"away"}}}"#);
        match &events[0] {
            InboundEvent::Presence(p) => assert!(!p.available),
            other => panic!("expected presence, got {other:?}"),
        }
    }

    #[test]
    fn test_presence_missing_from_is_invalid() {
        let events = classify(r#"{"presence":{"to":["s1"]}}"#);
        assert!(matches!(events[0], InboundEvent::InvalidMessage { .. }));
    }

    #[test]
    fn test_message_with_metadata() {
        let line = r#"{"message":{"payload":{"temp":20}},"from":{"swarm":"s1","resource":"r1"},"public":true}"#;
        let events = classify(line);

        match &events[0] {
            InboundEvent::Message(m) => {
                assert_eq!(m.payload, json!({"temp": 20}));
                assert_eq!(m.swarm_id.as_deref(), Some("s1"));
                assert_eq!(m.resource_id.as_deref(), Some("r1"));
                assert!(m.public);
            },
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_message_metadata_defaults() {
        let events = classify(r#"{"message":{"payload":"hi"}}"#);
        match &events[0] {
            InboundEvent::Message(m) => {
                assert!(m.swarm_id.is_none());
                assert!(m.resource_id.is_none());
                assert!(!m.public);
            },
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[test]
    fn test_array_payload_fans_out_in_order() {
        let line = r#"{"message":{"payload":[{"a":1},{"a":2}]},"from":{"swarm":"s1"}}"#;
        let events = classify(line);

        assert_eq!(events.len(), 2);
        for (i, event) in events.iter().enumerate() {
            match event {
                InboundEvent::Message(m) => {
                    assert_eq!(m.payload, json!({"a": i + 1}));
                    assert_eq!(m.swarm_id.as_deref(), Some("s1"));
                },
                other => panic!("expected message, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_message_missing_payload_is_invalid() {
        let events = classify(r#"{"message":{"body":"hi"}}"#);
        assert!(matches!(events[0], InboundEvent::InvalidMessage { .. }));
    }

    #[test]
    fn test_server_error_document() {
        let events = classify(r#"{"code":404,"description":"no such swarm"}"#);
        match &events[0] {
            InboundEvent::ServerError { code, raw } => {
                assert_eq!(*code, 404);
                assert!(raw.contains("no such swarm"));
            },
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn test_unrecognized_json_is_invalid() {
        let events = classify(r#"{"hello":"world"}"#);
        assert!(matches!(events[0], InboundEvent::InvalidMessage { .. }));
    }
}
