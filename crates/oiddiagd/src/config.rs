//! Configuration management for oiddiagd.
//!
//! Loads settings from /etc/oiddiag/config.toml or uses defaults.

use anyhow::{Context, Result};
use oiddiag_shared::handshake::DEFAULT_ASSOC_TYPE;
use oiddiag_shared::KeyExchange;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/oiddiag/config.toml";

/// Default config file path for fallback
pub const DEFAULT_CONFIG_PATH: &str = "/var/lib/oiddiag/config.toml";

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the harness listens on
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_bind_addr() -> String {
    // Localhost only: the harness has no operator authentication
    "127.0.0.1:7866".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Handshake run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticConfig {
    /// Bound on each negotiator call
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Bound on a whole `try` action before its attempt is marked timed out
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,

    #[serde(default = "default_assoc_type")]
    pub assoc_type: String,

    /// Unset requests an unencrypted session
    #[serde(default)]
    pub session_type: Option<String>,

    /// Identifier used by `try` when the request carries none
    #[serde(default)]
    pub default_identifier: Option<String>,
}

fn default_step_timeout() -> u64 {
    10
}

fn default_attempt_timeout() -> u64 {
    30
}

fn default_assoc_type() -> String {
    DEFAULT_ASSOC_TYPE.to_string()
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            step_timeout_secs: default_step_timeout(),
            attempt_timeout_secs: default_attempt_timeout(),
            assoc_type: default_assoc_type(),
            session_type: None,
            default_identifier: None,
        }
    }
}

impl DiagnosticConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    pub fn key_exchange(&self) -> KeyExchange {
        KeyExchange::new(self.assoc_type.clone(), self.session_type.clone())
    }
}

/// Which negotiator backs the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NegotiatorMode {
    /// Talk to the real peer over HTTP
    #[default]
    Live,
    /// Canned successful handshake, no network
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiatorConfig {
    #[serde(default)]
    pub mode: NegotiatorMode,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_http_timeout() -> u64 {
    8
}

fn default_user_agent() -> String {
    format!("oiddiag/{}", oiddiag_shared::VERSION)
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            mode: NegotiatorMode::default(),
            http_timeout_secs: default_http_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub diagnostic: DiagnosticConfig,

    #[serde(default)]
    pub negotiator: NegotiatorConfig,
}

impl Config {
    /// Load config from file, or return defaults
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_PATH)
            .or_else(|_| Self::load_from_path(DEFAULT_CONFIG_PATH))
            .unwrap_or_else(|e| {
                warn!("Config not found, using defaults: {}", e);
                Config::default()
            })
    }

    /// Load config from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind_addr, "127.0.0.1:7866");
        assert_eq!(config.diagnostic.step_timeout_secs, 10);
        assert_eq!(config.diagnostic.attempt_timeout_secs, 30);
        assert_eq!(config.diagnostic.assoc_type, "HMAC-SHA1");
        assert_eq!(config.negotiator.mode, NegotiatorMode::Live);
    }

    #[test]
    fn test_parse_toml_partial() {
        let toml_str = r#"
[diagnostic]
step_timeout_secs = 3
default_identifier = "unittest.example/joe"

[negotiator]
mode = "mock"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.diagnostic.step_timeout(), Duration::from_secs(3));
        assert_eq!(
            config.diagnostic.default_identifier.as_deref(),
            Some("unittest.example/joe")
        );
        assert_eq!(config.negotiator.mode, NegotiatorMode::Mock);
        // Defaults for missing fields
        assert_eq!(config.diagnostic.attempt_timeout_secs, 30);
        assert_eq!(config.negotiator.http_timeout_secs, 8);
        assert_eq!(config.server.bind_addr, "127.0.0.1:7866");
    }

    #[test]
    fn test_key_exchange_from_config() {
        let mut config = DiagnosticConfig::default();
        assert_eq!(config.key_exchange(), KeyExchange::plaintext());

        config.session_type = Some("DH-SHA1".to_string());
        assert_eq!(config.key_exchange().session_type.as_deref(), Some("DH-SHA1"));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nbind_addr = \"0.0.0.0:9000\"").unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn test_load_from_path_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nbind_addr = ").unwrap();
        assert!(Config::load_from_path(file.path()).is_err());
    }
}
