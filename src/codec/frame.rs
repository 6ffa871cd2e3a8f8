//! Outbound frame encoding.
//!
//! Every frame the client sends is a JSON envelope wrapped as one
//! chunked-transfer chunk: `hex(len)\r\n<json-bytes>\r\n`. No trailer
//! chunk is ever sent; the connection is simply closed at session end.

use bytes::Bytes;
use serde_json::{json, Value};

/// An outbound frame, serialized immediately and not retained.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// Presence declaration for one or more swarms.
    Presence {
        /// Swarms the declaration addresses.
        swarm_ids: Vec<String>,
        /// Availability; `false` adds `"type": "unavailable"`.
        available: bool,
    },
    /// Message payload, optionally targeted at specific swarms.
    Message {
        /// The payload to deliver.
        payload: Value,
        /// Resource the message originates from.
        from_resource: String,
        /// Target swarms; `None` broadcasts to all joined swarms.
        to_swarm_ids: Option<Vec<String>>,
    },
}

impl OutboundFrame {
    /// The frame's JSON envelope.
    pub fn envelope(&self) -> Value {
        match self {
            Self::Presence {
                swarm_ids,
                available,
            } => {
                let mut presence = json!({ "to": swarm_ids });
                if !available {
                    presence["type"] = json!("unavailable");
                }
                json!({ "presence": presence })
            },
            Self::Message {
                payload,
                from_resource,
                to_swarm_ids,
            } => {
                let mut envelope = json!({
                    "message": { "payload": payload },
                    "from": { "resource": from_resource },
                });
                if let Some(targets) = to_swarm_ids {
                    envelope["to"] = json!(targets);
                }
                envelope
            },
        }
    }

    /// Serialize the envelope and wrap it as one wire chunk.
    pub fn encode(&self) -> Bytes {
        chunk_wrap(self.envelope().to_string().as_bytes())
    }
}

/// Wrap raw bytes as a single chunked-transfer chunk.
pub fn chunk_wrap(data: &[u8]) -> Bytes {
    let mut out = Vec::with_capacity(data.len() + 16);
    out.extend_from_slice(format!("{:x}\r\n", data.len()).as_bytes());
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    Bytes::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_available_envelope() {
        let frame = OutboundFrame::Presence {
            swarm_ids: vec!["s1".to_string(), "s2".to_string()],
            available: true,
        };
        let envelope = frame.envelope();

        assert_eq!(envelope["presence"]["to"], json!(["s1", "s2"]));
        assert!(envelope["presence"].get("type").is_none());
    }

    #[test]
    fn test_presence_unavailable_envelope() {
        let frame = OutboundFrame::Presence {
            swarm_ids: vec!["s1".to_string()],
            available: false,
        };
        assert_eq!(frame.envelope()["presence"]["type"], json!("unavailable"));
    }

    #[test]
    fn test_message_envelope() {
        let frame = OutboundFrame::Message {
            payload: json!({"temp": 21.5}),
            from_resource: "res-1".to_string(),
            to_swarm_ids: None,
        };
        let envelope = frame.envelope();

        assert_eq!(envelope["message"]["payload"]["temp"], json!(21.5));
        assert_eq!(envelope["from"]["resource"], json!("res-1"));
        assert!(envelope.get("to").is_none());
    }

    #[test]
    fn test_targeted_message_envelope() {
        let frame = OutboundFrame::Message {
            payload: json!("ping"),
            from_resource: "res-1".to_string(),
            to_swarm_ids: Some(vec!["s1".to_string()]),
        };
        assert_eq!(frame.envelope()["to"], json!(["s1"]));
    }

    #[test]
    fn test_chunk_wrap_format() {
        let chunk = chunk_wrap(b"{}");
        assert_eq!(&chunk[..], b"2\r\n{}\r\n");

        // Lengths above 15 must render as hex.
        let payload = vec![b'x'; 26];
        let chunk = chunk_wrap(&payload);
        assert!(chunk.starts_with(b"1a\r\n"));
    }

    #[test]
    fn test_encode_is_one_chunk() {
        let frame = OutboundFrame::Presence {
            swarm_ids: vec!["s1".to_string()],
            available: true,
        };
        let encoded = frame.encode();
        let text = std::str::from_utf8(&encoded).unwrap();

        let (len_line, rest) = text.split_once("\r\n").unwrap();
        let len = usize::from_str_radix(len_line, 16).unwrap();
        let body = &rest[..len];
        assert!(rest[len..].starts_with("\r\n"));

        let parsed: Value = serde_json::from_str(body).unwrap();
        assert_eq!(parsed["presence"]["to"], json!(["s1"]));
    }
}
