//! Participation session.
//!
//! [`ParticipationSession`] owns the socket, the read task, outbound
//! writes, join/leave semantics, and the reconnect policy. It is the
//! public-facing object of the crate.
//!
//! # State Machine
//!
//! ```text
//!                 connect()
//!   [Connecting] ───────────> [Connected]
//!                                  │  ▲
//!                  unexpected EOF  │  │ handshake ok
//!                                  ▼  │
//!                  [Disconnected] ⇒ [Reconnecting]
//!                                  │
//!                         close()  ▼
//!                              [Closed]   (terminal)
//! ```
//!
//! # Concurrency
//!
//! One read task per live socket. The writer half and connection state
//! live behind a single async mutex, so `send`, `join`, `close`, and
//! the reconnect path never race on the socket. Reconnection after an
//! unexpected disconnect runs on the task of the reader that observed
//! it, guarded by a connection epoch so a stale reader can never tear
//! down or replace a newer connection.

mod listener;
mod reader;
mod registry;

pub use listener::{JsonMessageListener, ListenerId, SwarmListener, TextMessageListener};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex, MutexGuard};

use crate::codec::OutboundFrame;
use crate::config::SessionConfig;
use crate::error::{Result, SwarmError};
use crate::protocol;

use listener::RegisteredListener;
use reader::ReaderExit;
use registry::ListenerRegistry;

/// Session connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Initial handshake in progress.
    Connecting,
    /// Stream is up; reader running.
    Connected,
    /// Stream dropped unexpectedly; no reconnect attempt in flight.
    Disconnected,
    /// Reconnect attempts in progress.
    Reconnecting,
    /// Explicitly closed. Terminal; no transition leaves it.
    Closed,
}

/// A live connection: the writer half plus the handles needed to
/// shut its reader down. The reader half lives inside the read task.
struct Conn {
    writer: OwnedWriteHalf,
    shutdown_tx: watch::Sender<bool>,
    epoch: u64,
}

struct SessionInner {
    config: SessionConfig,
    /// Swarms joined so far; reconnect handshakes re-subscribe these.
    swarms: RwLock<Vec<String>>,
    listeners: ListenerRegistry,
    conn: Mutex<Option<Conn>>,
    state: RwLock<SessionState>,
    /// Monotonic connection counter; each established connection gets
    /// the next epoch and a reader that only acts if still current.
    epochs: AtomicU64,
}

/// A streaming participation session.
///
/// Cheap to clone; clones share the same connection and listeners.
///
/// # Example
///
/// ```rust,ignore
/// use bugswarm::{ParticipationSession, SessionConfig, Role};
///
/// let config = SessionConfig::new("api.bugswarm.net", api_key, "res-1")
///     .role(Role::Producer)
///     .swarm("swarm-a");
///
/// let session = ParticipationSession::connect(config).await?;
/// session.send(serde_json::json!({"temp": 21.5})).await?;
/// session.close().await;
/// ```
#[derive(Clone)]
pub struct ParticipationSession {
    inner: Arc<SessionInner>,
}

impl ParticipationSession {
    /// Open the stream and start the read task.
    ///
    /// Performs the TCP connect and handshake before returning; any
    /// I/O error propagates and no session is produced.
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        config.validate()?;

        let swarms = config.swarm_ids.clone();
        let inner = Arc::new(SessionInner {
            config,
            swarms: RwLock::new(swarms),
            listeners: ListenerRegistry::new(),
            conn: Mutex::new(None),
            state: RwLock::new(SessionState::Connecting),
            epochs: AtomicU64::new(0),
        });

        let mut guard = inner.conn.lock().await;
        SessionInner::establish(&inner, &mut guard).await?;
        drop(guard);

        Ok(Self { inner })
    }

    /// Declare presence in a swarm and track it for reconnects.
    ///
    /// Does not change connection state: unlike [`send`], `join` on a
    /// disconnected session fails rather than reconnecting.
    ///
    /// [`send`]: Self::send
    pub async fn join(&self, swarm_id: &str) -> Result<()> {
        self.inner.track_swarm(swarm_id);

        let frame = OutboundFrame::Presence {
            swarm_ids: vec![swarm_id.to_string()],
            available: true,
        };

        let mut guard = self.inner.conn.lock().await;
        self.inner.write_frame(&mut guard, &frame).await
    }

    /// Send a payload to all joined swarms.
    ///
    /// If the session is disconnected, one lazy reconnect is attempted
    /// first; a failure of that attempt or of the write itself
    /// propagates to the caller with no further retry.
    pub async fn send(&self, payload: Value) -> Result<()> {
        self.send_frame(payload, None).await
    }

    /// Send a payload to specific swarms.
    pub async fn send_to(&self, payload: Value, swarm_ids: Vec<String>) -> Result<()> {
        self.send_frame(payload, Some(swarm_ids)).await
    }

    async fn send_frame(&self, payload: Value, to_swarm_ids: Option<Vec<String>>) -> Result<()> {
        let frame = OutboundFrame::Message {
            payload,
            from_resource: self.inner.config.resource_id.clone(),
            to_swarm_ids,
        };

        let mut guard = self.inner.conn.lock().await;
        if guard.is_none() {
            SessionInner::establish(&self.inner, &mut guard).await?;
        }
        self.inner.write_frame(&mut guard, &frame).await
    }

    /// Register a listener with presence and error callbacks only.
    pub fn add_listener(&self, listener: Arc<dyn SwarmListener>) -> ListenerId {
        self.inner.listeners.add(RegisteredListener::Base(listener))
    }

    /// Register a listener that receives message payloads as parsed
    /// JSON values.
    pub fn add_json_listener(&self, listener: Arc<dyn JsonMessageListener>) -> ListenerId {
        self.inner.listeners.add(RegisteredListener::Json(listener))
    }

    /// Register a listener that receives message payloads in text form.
    pub fn add_text_listener(&self, listener: Arc<dyn TextMessageListener>) -> ListenerId {
        self.inner.listeners.add(RegisteredListener::Text(listener))
    }

    /// Remove a previously registered listener.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Current connection state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Whether the stream is currently up.
    ///
    /// An approximation: the reader is running and the socket has not
    /// reported an error, which says nothing about server-side
    /// liveness.
    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Swarms joined so far (handshake subscriptions plus `join`s).
    pub fn swarms(&self) -> Vec<String> {
        self.inner.swarms.read().clone()
    }

    /// Close the session.
    ///
    /// Best-effort writes a presence-unavailable frame, cancels the
    /// read task, and closes the socket. Idempotent: a second call is
    /// a no-op and writes nothing. After `close` the session never
    /// reconnects.
    pub async fn close(&self) {
        // The state flip must happen before the socket goes down so
        // the reader cannot mistake our own close for a server fault.
        {
            let mut state = self.inner.state.write();
            if *state == SessionState::Closed {
                return;
            }
            *state = SessionState::Closed;
        }

        let mut guard = self.inner.conn.lock().await;
        if let Some(mut conn) = guard.take() {
            let frame = OutboundFrame::Presence {
                swarm_ids: self.inner.swarms.read().clone(),
                available: false,
            };
            let _ = conn.writer.write_all(&frame.encode()).await;
            let _ = conn.writer.flush().await;

            let _ = conn.shutdown_tx.send(true);
            let _ = conn.writer.shutdown().await;
        }

        tracing::info!(resource = %self.inner.config.resource_id, "session closed");
    }
}

impl SessionInner {
    fn is_closed(&self) -> bool {
        *self.state.read() == SessionState::Closed
    }

    /// Transition state. `Closed` is terminal: once set it is never
    /// overwritten, even by a racing reader task.
    fn set_state(&self, state: SessionState) {
        let mut current = self.state.write();
        if *current != SessionState::Closed {
            *current = state;
        }
    }

    fn track_swarm(&self, swarm_id: &str) {
        let mut swarms = self.swarms.write();
        if !swarms.iter().any(|s| s == swarm_id) {
            swarms.push(swarm_id.to_string());
        }
    }

    /// Establish a connection and install it under the held lock.
    ///
    /// No-op if a connection is already installed (another path won
    /// the race while we waited on the lock).
    // Returns an explicitly boxed `Send` future to break the
    // establish -> spawn(read_task) -> establish auto-trait cycle.
    fn establish<'a>(
        inner: &'a Arc<Self>,
        guard: &'a mut MutexGuard<'_, Option<Conn>>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if inner.is_closed() {
                return Err(SwarmError::Closed);
            }
            if guard.is_some() {
                return Ok(());
            }
    
            let addr = (inner.config.host.as_str(), inner.config.port);
            let stream = TcpStream::connect(addr).await?;
            let (read_half, mut write_half) = stream.into_split();
    
            let swarms = inner.swarms.read().clone();
            protocol::perform_handshake(&mut write_half, &inner.config, &swarms).await?;
    
            let epoch = inner.epochs.fetch_add(1, Ordering::SeqCst) + 1;
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
    
            tokio::spawn(read_task(
                inner.clone(),
                BufReader::new(read_half),
                shutdown_rx,
                epoch,
            ));
    
            **guard = Some(Conn {
                writer: write_half,
                shutdown_tx,
                epoch,
            });
            inner.set_state(SessionState::Connected);
    
            tracing::info!(
                host = %inner.config.host,
                port = inner.config.port,
                epoch,
                "stream connected"
            );
            Ok(())
        })
    }

    /// Write one frame on the installed connection.
    async fn write_frame(
        &self,
        guard: &mut MutexGuard<'_, Option<Conn>>,
        frame: &OutboundFrame,
    ) -> Result<()> {
        if self.is_closed() {
            return Err(SwarmError::Closed);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(SwarmError::NotConnected(
                "no live stream connection".to_string(),
            ));
        };

        conn.writer.write_all(&frame.encode()).await?;
        conn.writer.flush().await?;
        Ok(())
    }

    /// Tear down the connection for `epoch` if it is still current.
    ///
    /// Returns `false` when a newer connection has already replaced
    /// it, in which case the caller must not reconnect.
    async fn retire_connection(&self, epoch: u64) -> bool {
        let mut guard = self.conn.lock().await;
        match guard.as_ref() {
            Some(conn) if conn.epoch == epoch => {
                *guard = None;
                true
            },
            _ => false,
        }
    }
}

/// Read-loop wrapper: runs the reader, then handles its exit.
///
/// An unexpected disconnect is reported to listeners and, policy
/// permitting, followed by capped-exponential-backoff reconnection.
/// This runs on the exiting reader's own task.
async fn read_task(
    inner: Arc<SessionInner>,
    reader: BufReader<OwnedReadHalf>,
    shutdown_rx: watch::Receiver<bool>,
    epoch: u64,
) {
    let exit = reader::run(reader, &inner.listeners, shutdown_rx).await;

    if exit == ReaderExit::Shutdown || inner.is_closed() {
        return;
    }

    if !inner.retire_connection(epoch).await {
        // A newer connection is already live; nothing to report.
        return;
    }

    inner.set_state(SessionState::Disconnected);
    tracing::warn!(epoch, "stream disconnected unexpectedly");
    reader::dispatch_disconnect(&inner.listeners, "stream closed by server");

    if !inner.config.reconnect.enabled {
        return;
    }

    let policy = inner.config.reconnect.clone();
    inner.set_state(SessionState::Reconnecting);

    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.backoff_for(attempt)).await;

        if inner.is_closed() {
            return;
        }

        let mut guard = inner.conn.lock().await;
        match SessionInner::establish(&inner, &mut guard).await {
            Ok(()) => {
                tracing::info!(attempt, "stream reconnected");
                return;
            },
            Err(SwarmError::Closed) => return,
            Err(e) => {
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "reconnect attempt failed"
                );
            },
        }
    }

    tracing::warn!("reconnect attempts exhausted; session stays disconnected");
    inner.set_state(SessionState::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectPolicy;
    use crate::protocol::Role;

    fn config(port: u16) -> SessionConfig {
        SessionConfig::new("127.0.0.1", "test-key", "res-1")
            .port(port)
            .role(Role::Producer)
            .reconnect(ReconnectPolicy::disabled())
    }

    #[tokio::test]
    async fn test_connect_fails_without_server() {
        // Nothing listens on this port; connect must propagate the
        // error and produce no session.
        let result = ParticipationSession::connect(config(1)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let config = SessionConfig::new("", "key", "res");
        let result = ParticipationSession::connect(config).await;
        assert!(matches!(result, Err(SwarmError::Config(_))));
    }

    #[tokio::test]
    async fn test_session_against_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            // Hold the socket so the session stays connected.
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            drop(socket);
        });

        let session = ParticipationSession::connect(config(port)).await.unwrap();
        assert!(session.is_connected());
        assert_eq!(session.state(), SessionState::Connected);

        session.join("swarm-a").await.unwrap();
        assert_eq!(session.swarms(), vec!["swarm-a".to_string()]);

        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);

        // Second close is a no-op.
        session.close().await;
        assert_eq!(session.state(), SessionState::Closed);

        accept.abort();
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move {
            let _socket = listener.accept().await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        });

        let session = ParticipationSession::connect(config(port)).await.unwrap();
        session.close().await;

        let result = session.send(serde_json::json!({"a": 1})).await;
        assert!(matches!(result, Err(SwarmError::Closed)));

        let result = session.join("swarm-a").await;
        assert!(matches!(result, Err(SwarmError::Closed)));

        accept.abort();
    }

    #[test]
    fn test_state_is_copy_and_comparable() {
        let state = SessionState::Connected;
        let copy = state;
        assert_eq!(state, copy);
        assert_ne!(SessionState::Closed, SessionState::Disconnected);
    }
}
