//! Session configuration.
//!
//! Supports configuration from:
//! - Builder-style methods on [`SessionConfig`]
//! - TOML config files
//! - Environment variables (`SWARM_*`)

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SwarmError};
use crate::protocol::Role;

/// Default platform port.
pub const DEFAULT_PORT: u16 = 80;

/// Session configuration.
///
/// Everything a participation session needs to open its stream: where
/// the platform lives, who we are, which swarms to subscribe at
/// handshake time, and how aggressively to reconnect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Platform hostname.
    pub host: String,

    /// Platform port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// API key sent in the `X-BugSwarmApiKey` header.
    pub api_key: String,

    /// Resource id this session participates as.
    pub resource_id: String,

    /// Session role, determines the handshake HTTP method.
    #[serde(default)]
    pub role: Role,

    /// Swarms to subscribe during the handshake.
    #[serde(default)]
    pub swarm_ids: Vec<String>,

    /// Value of the `User-Agent` header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Automatic reconnection policy.
    #[serde(default)]
    pub reconnect: ReconnectPolicy,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_user_agent() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

impl SessionConfig {
    /// Create a configuration with the required fields and defaults for
    /// everything else.
    pub fn new(
        host: impl Into<String>,
        api_key: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            api_key: api_key.into(),
            resource_id: resource_id.into(),
            role: Role::default(),
            swarm_ids: Vec::new(),
            user_agent: default_user_agent(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Set the platform port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the session role.
    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Add a swarm to subscribe at handshake time.
    pub fn swarm(mut self, swarm_id: impl Into<String>) -> Self {
        self.swarm_ids.push(swarm_id.into());
        self
    }

    /// Set the reconnection policy.
    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Set the `User-Agent` header value.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| SwarmError::Config(format!("Failed to read config file: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| SwarmError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from environment variables.
    ///
    /// `SWARM_HOST`, `SWARM_API_KEY` and `SWARM_RESOURCE_ID` are
    /// required; `SWARM_PORT`, `SWARM_ROLE` and `SWARM_IDS`
    /// (comma-separated) are optional.
    pub fn from_env() -> Result<Self> {
        let host = require_env("SWARM_HOST")?;
        let api_key = require_env("SWARM_API_KEY")?;
        let resource_id = require_env("SWARM_RESOURCE_ID")?;

        let mut config = Self::new(host, api_key, resource_id);

        if let Ok(port) = std::env::var("SWARM_PORT") {
            config.port = port
                .parse()
                .map_err(|_| SwarmError::Config(format!("Invalid SWARM_PORT: {port}")))?;
        }
        if let Ok(role) = std::env::var("SWARM_ROLE") {
            config.role = role.parse().map_err(SwarmError::Config)?;
        }
        if let Ok(ids) = std::env::var("SWARM_IDS") {
            config.swarm_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        Ok(config)
    }

    /// Validate required fields before connecting.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(SwarmError::Config("host must not be empty".to_string()));
        }
        if self.api_key.is_empty() {
            return Err(SwarmError::Config("api_key must not be empty".to_string()));
        }
        if self.resource_id.is_empty() {
            return Err(SwarmError::Config(
                "resource_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| SwarmError::Config(format!("{name} is not set")))
}

/// Automatic reconnection policy.
///
/// The platform's original client reconnected instantly and forever on
/// any unexpected disconnect. This policy caps that: exponential
/// backoff between attempts, bounded attempt count, and an off switch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Whether the session reconnects automatically after an
    /// unexpected disconnect. `send` may still lazily reconnect.
    pub enabled: bool,

    /// Delay before the first reconnect attempt.
    #[serde(with = "duration_millis")]
    pub initial_backoff: Duration,

    /// Upper bound on the backoff delay.
    #[serde(with = "duration_millis")]
    pub max_backoff: Duration,

    /// Maximum number of consecutive failed attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Policy that never reconnects automatically.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Backoff delay for a given attempt (1-based), doubling from
    /// `initial_backoff` and saturating at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let delay = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(exp));
        delay.min(self.max_backoff)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::new("api.example.com", "key123", "res-1");
        assert_eq!(config.port, 80);
        assert_eq!(config.role, Role::Consumer);
        assert!(config.swarm_ids.is_empty());
        assert!(config.reconnect.enabled);
    }

    #[test]
    fn test_builder_methods() {
        let config = SessionConfig::new("api.example.com", "key123", "res-1")
            .port(8080)
            .role(Role::Producer)
            .swarm("swarm-a")
            .swarm("swarm-b");

        assert_eq!(config.port, 8080);
        assert_eq!(config.role, Role::Producer);
        assert_eq!(config.swarm_ids, vec!["swarm-a", "swarm-b"]);
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
            host = "api.example.com"
            port = 8080
            api_key = "key123"
            resource_id = "res-1"
            role = "producer"
            swarm_ids = ["swarm-a"]

            [reconnect]
            enabled = true
            initial_backoff = 250
            max_backoff = 10000
            max_attempts = 5
        "#;

        let config: SessionConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.host, "api.example.com");
        assert_eq!(config.port, 8080);
        assert_eq!(config.role, Role::Producer);
        assert_eq!(config.reconnect.initial_backoff, Duration::from_millis(250));
        assert_eq!(config.reconnect.max_attempts, 5);
    }

    #[test]
    fn test_config_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "host = \"api.example.com\"\napi_key = \"k\"\nresource_id = \"r\""
        )
        .unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host, "api.example.com");
        assert_eq!(config.port, 80);
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let config = SessionConfig::new("", "key", "res");
        assert!(config.validate().is_err());

        let config = SessionConfig::new("host", "key", "res");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(20), Duration::from_secs(30));
    }

    #[test]
    fn test_disabled_policy() {
        let policy = ReconnectPolicy::disabled();
        assert!(!policy.enabled);
    }
}
