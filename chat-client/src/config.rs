//! Configuration loading for chat-client.
//!
//! Configuration is loaded from a TOML file (default: `chatsync.toml`).
//! Every field has a default, so an empty file is a valid configuration.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use chat_core::ReconnectPolicy;

/// Root configuration for chat-client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server endpoints.
    #[serde(default)]
    pub server: ServerConfig,
    /// Reconnection policy.
    #[serde(default)]
    pub reconnect: ReconnectConfig,
    /// Typing indicator debounce.
    #[serde(default)]
    pub typing: TypingConfig,
}

/// Server endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Live event stream URL (default: ws://localhost:3000/ws).
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
    /// REST base URL used for hydration (default: http://localhost:8080/api).
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token for the REST backend (optional).
    pub auth_token: Option<String>,
}

/// Reconnection policy.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    /// Attempts after a loss before giving up (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between attempts in milliseconds (default: 1000).
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

/// Typing indicator debounce.
#[derive(Debug, Clone, Deserialize)]
pub struct TypingConfig {
    /// Quiet period before `typing = false` is sent (default: 2000).
    #[serde(default = "default_quiet_period_ms")]
    pub quiet_period_ms: u64,
}

// Default value functions
fn default_socket_url() -> String {
    "ws://localhost:3000/ws".to_string()
}

fn default_api_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_quiet_period_ms() -> u64 {
    2000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_url: default_socket_url(),
            api_url: default_api_url(),
            auth_token: None,
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            quiet_period_ms: default_quiet_period_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Reconnection policy for the connector.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.reconnect.max_attempts,
            delay: Duration::from_millis(self.reconnect.delay_ms),
        }
    }

    /// Typing quiet period.
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.typing.quiet_period_ms)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.socket_url, "ws://localhost:3000/ws");
        assert_eq!(config.server.api_url, "http://localhost:8080/api");
        assert!(config.server.auth_token.is_none());
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
        assert_eq!(config.quiet_period(), chat_core::DEFAULT_QUIET_PERIOD);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
socket_url = "wss://chat.example.com/ws"
auth_token = "secret"

[reconnect]
max_attempts = 2
delay_ms = 250

[typing]
quiet_period_ms = 500
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.socket_url, "wss://chat.example.com/ws");
        assert_eq!(config.server.api_url, "http://localhost:8080/api");
        assert_eq!(config.server.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.reconnect_policy().max_attempts, 2);
        assert_eq!(config.reconnect_policy().delay, Duration::from_millis(250));
        assert_eq!(config.quiet_period(), Duration::from_millis(500));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.typing.quiet_period_ms, 2000);
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[reconnect]\ndelay_ms = 10").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.reconnect.delay_ms, 10);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/chatsync.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn from_file_reports_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[reconnect\nmax_attempts = ").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}
