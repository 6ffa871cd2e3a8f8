//! Stream handshake.
//!
//! The participation stream is opened with an HTTP/1.1-shaped request
//! over a raw TCP socket. The request is never completed in the HTTP
//! sense: both sides hold the connection open and exchange chunked
//! bodies until one of them closes the socket.
//!
//! The server does not begin emitting data until it has observed at
//! least one chunk from the client, so the handshake ends by writing a
//! single-byte placeholder chunk.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::SessionConfig;
use crate::error::Result;

/// Placeholder chunk written immediately after the headers: one chunk
/// containing the single byte `\n`.
const PLACEHOLDER_CHUNK: &[u8] = b"1\r\n\n\r\n";

/// Session role.
///
/// Determines the HTTP method of the stream handshake and, by
/// convention, whether the endpoint mainly emits or mainly receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Mainly emits messages; handshakes with `POST`.
    Producer,
    /// Mainly receives messages; handshakes with `GET` (default).
    #[default]
    Consumer,
}

impl Role {
    /// HTTP method used in the handshake request line.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Producer => "POST",
            Self::Consumer => "GET",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Producer => write!(f, "producer"),
            Self::Consumer => write!(f, "consumer"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "producer" => Ok(Self::Producer),
            "consumer" => Ok(Self::Consumer),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}

/// Build the stream request path for a resource and its swarms.
pub fn stream_path(resource_id: &str, swarm_ids: &[String]) -> String {
    let mut path = format!("/stream?resource_id={resource_id}");
    for id in swarm_ids {
        path.push_str("&swarm_id=");
        path.push_str(id);
    }
    path
}

/// Build the complete request head: request line, headers in the order
/// the platform requires, and the terminating blank line.
pub fn request_head(config: &SessionConfig, swarm_ids: &[String]) -> String {
    let host = if config.port == crate::config::DEFAULT_PORT {
        config.host.clone()
    } else {
        format!("{}:{}", config.host, config.port)
    };

    format!(
        "{method} {path} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Accept: application/json\r\n\
         X-BugSwarmApiKey: {key}\r\n\
         Connection: close\r\n\
         User-Agent: {agent}\r\n\
         Transfer-Encoding: chunked\r\n\
         Content-Type: application/json ;charset=UTF-8\r\n\
         \r\n",
        method = config.role.method(),
        path = stream_path(&config.resource_id, swarm_ids),
        key = config.api_key,
        agent = config.user_agent,
    )
}

/// Write the handshake to an open socket and flush it.
///
/// Any I/O error propagates to the caller; the session is not created
/// until this succeeds.
pub async fn perform<W>(writer: &mut W, config: &SessionConfig, swarm_ids: &[String]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let head = request_head(config, swarm_ids);
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(PLACEHOLDER_CHUNK).await?;
    writer.flush().await?;

    tracing::debug!(
        method = config.role.method(),
        resource = %config.resource_id,
        swarms = swarm_ids.len(),
        "stream handshake sent"
    );

    Ok(())
}
