//! Participation stream protocol.
//!
//! The stream is HTTP-shaped but custom-terminated: the client opens a
//! chunked-transfer request and both sides then treat the connection as
//! a long-lived bidirectional JSON event channel.
//!
//! # Message Flow
//!
//! ```text
//! Client                             Platform
//!    |                                  |
//!    |--- POST/GET /stream?... ------->|  Handshake (role-keyed method)
//!    |--- placeholder chunk ---------->|  Server starts emitting
//!    |                                  |
//!    |=== presence / message chunks ==>|  Outbound frames
//!    |<== presence / message events ===|  Inbound event lines
//!    |                                  |
//!    |--- presence(unavailable) ------>|  close()
//!    |--- socket close --------------->|
//! ```
//!
//! Inbound lines are classified by [`crate::codec`]; the typed results
//! live in [`event`].

mod event;
mod handshake;

pub use event::{InboundEvent, MessageEvent, PresenceEvent, StreamError, StreamErrorKind};
pub use handshake::{perform as perform_handshake, request_head, stream_path, Role};
