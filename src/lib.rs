//! # Swarm streaming participation client
//!
//! Client library for the swarm device-messaging platform: members
//! join named groups ("swarms") and exchange presence notifications
//! and arbitrary JSON payloads in near-real-time over a persistent
//! streaming connection.
//!
//! ## Protocol Overview
//!
//! The stream is HTTP-shaped but custom-terminated: the client opens a
//! chunked-transfer request (`POST` for producers, `GET` for
//! consumers) and both sides then treat the socket as a long-lived
//! bidirectional JSON event channel. Outbound frames are chunked
//! JSON envelopes; inbound events arrive as JSON lines interleaved
//! with the server's own chunk-size lines, which the codec filters.
//!
//! ```text
//! Caller                     Session                      Platform
//!   |                           |                             |
//!   |-- send(payload) -------->|--- chunked message frame -->|
//!   |-- join(swarm) ---------->|--- chunked presence frame ->|
//!   |                           |                             |
//!   |<- listener callbacks ----|<-- presence/message lines --|
//!   |                           |                             |
//!   |                           |<-- EOF (unexpected) --------|
//!   |<- on_error(disconnect) --|                             |
//!   |                           |--- handshake (backoff) ---->|
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bugswarm::{
//!     JsonMessageListener, MessageEvent, ParticipationSession, PresenceEvent, Role,
//!     SessionConfig, SwarmListener,
//! };
//!
//! struct Printer;
//!
//! impl SwarmListener for Printer {
//!     fn on_presence(&self, event: &PresenceEvent) {
//!         println!("presence: {event:?}");
//!     }
//! }
//!
//! impl JsonMessageListener for Printer {
//!     fn on_message(&self, _event: &MessageEvent, payload: &serde_json::Value) {
//!         println!("message: {payload}");
//!     }
//! }
//!
//! let config = SessionConfig::new("api.bugswarm.net", api_key, "res-1")
//!     .role(Role::Producer)
//!     .swarm("swarm-a");
//!
//! let session = ParticipationSession::connect(config).await?;
//! session.add_json_listener(Arc::new(Printer));
//! session.send(serde_json::json!({"temp": 21.5})).await?;
//! session.close().await;
//! ```
//!
//! ## Modules
//!
//! - [`session`]: the participation session, listeners, read loop
//! - [`codec`]: outbound chunk encoding and inbound line classification
//! - [`protocol`]: handshake, roles, and typed stream events
//! - [`config`]: session configuration and reconnect policy
//! - [`error`]: error types and result alias
//!
//! ## Reconnection
//!
//! An unexpected disconnect is reported to every listener as a
//! [`StreamErrorKind::ServerUnexpectedDisconnect`] error, then the
//! session reconnects with capped exponential backoff (configurable
//! via [`ReconnectPolicy`], including disabling it entirely). A
//! `send` on a disconnected session performs a single lazy reconnect
//! before writing. `close()` ends everything; a closed session never
//! reconnects.

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;

// Re-exports for convenience
pub use codec::{chunk_wrap, OutboundFrame};
pub use config::{ReconnectPolicy, SessionConfig, DEFAULT_PORT};
pub use error::{Result, SwarmError};
pub use protocol::{
    InboundEvent, MessageEvent, PresenceEvent, Role, StreamError, StreamErrorKind,
};
pub use session::{
    JsonMessageListener, ListenerId, ParticipationSession, SessionState, SwarmListener,
    TextMessageListener,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
