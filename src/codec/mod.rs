//! Wire frame codec.
//!
//! Outbound: JSON envelopes wrapped as chunked-transfer chunks
//! ([`frame`]). Inbound: raw stream lines classified into typed events
//! ([`classify`]). Chunked-transfer framing is reused here as an
//! application-level JSON event stream; the chunk boundaries the
//! server inserts are treated as noise lines and filtered out rather
//! than decoded.

mod classify;
mod frame;

pub use classify::classify;
pub use frame::{chunk_wrap, OutboundFrame};
