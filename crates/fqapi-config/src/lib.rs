#![deny(unsafe_code)]

//! Configuration loading and validation for the fqapi client.
//!
//! Loads TOML configuration files and validates them. [`ClientConfig`]
//! selects the channel used to reach the daemon (a local UNIX socket or a
//! remote HTTPS endpoint), holds logging settings, and carries the
//! operator-facing error message overrides used by the wrapping client.
//!
//! Passwords are never part of the configuration; the CLI reads them from
//! the environment at startup.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Default filesystem path of the daemon's UNIX socket.
pub const DEFAULT_SOCKET_PATH: &str = "/FQ/CNCapi";

/// Default TCP port of the daemon's HTTPS endpoint.
pub const DEFAULT_REMOTE_PORT: u16 = 987;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Which channel the client uses to reach the daemon.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// UNIX domain socket on the same machine.
    #[default]
    Local,
    /// HTTPS over TCP with basic authentication.
    Remote,
}

/// Top-level client configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Channel selection.
    #[serde(default)]
    pub channel: ChannelKind,

    /// Local (UNIX socket) channel configuration.
    #[serde(default)]
    pub local: LocalConfig,

    /// Remote (HTTPS) channel configuration.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Error message overrides for the wrapping client.
    #[serde(default)]
    pub errors: ErrorsConfig,
}

/// Configuration for the local UNIX socket channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Filesystem path of the daemon socket.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// Per-exchange timeout in seconds. Unset blocks indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            timeout_secs: None,
        }
    }
}

fn default_socket_path() -> String {
    DEFAULT_SOCKET_PATH.to_string()
}

/// Configuration for the remote HTTPS channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Daemon host name or address.
    #[serde(default)]
    pub host: Option<String>,

    /// Daemon TCP port.
    #[serde(default = "default_remote_port")]
    pub port: u16,

    /// Shell user name used for basic authentication.
    #[serde(default)]
    pub username: Option<String>,

    /// Accept certificates that fail verification (self-signed daemons).
    /// The connection is still encrypted.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// TCP connect + TLS handshake timeout in seconds. Unset blocks indefinitely.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,

    /// Whole-request timeout in seconds. Unset blocks indefinitely.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_remote_port(),
            username: None,
            accept_invalid_certs: false,
            connect_timeout_secs: None,
            request_timeout_secs: None,
        }
    }
}

fn default_remote_port() -> u16 {
    DEFAULT_REMOTE_PORT
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Error message overrides for the wrapping client.
///
/// ## TOML Example
///
/// ```toml
/// [errors]
/// suppress = [404]
///
/// [errors.messages]
/// "409" = "account already exists"
/// "500" = "the daemon failed: {message}"
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ErrorsConfig {
    /// Status codes treated as success.
    #[serde(default)]
    pub suppress: Vec<u16>,

    /// Status code (as a string key) to message template.
    /// Templates may use `{code}` and `{message}`.
    #[serde(default)]
    pub messages: BTreeMap<String, String>,
}

impl ErrorsConfig {
    /// Message overrides with their keys parsed as status codes.
    pub fn parsed_messages(&self) -> Result<Vec<(u16, String)>, ConfigError> {
        self.messages
            .iter()
            .map(|(key, template)| {
                let code = key.trim().parse::<u16>().map_err(|_| {
                    ConfigError::Validation(format!(
                        "errors.messages key {key:?} is not a status code"
                    ))
                })?;
                Ok((code, template.clone()))
            })
            .collect()
    }
}

fn valid_status_code(code: u16) -> bool {
    (100..=599).contains(&code)
}

impl ClientConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local.socket_path.is_empty() {
            return Err(ConfigError::Validation(
                "local.socket_path must not be empty".to_string(),
            ));
        }
        if self.remote.port == 0 {
            return Err(ConfigError::Validation(
                "remote.port must be non-zero".to_string(),
            ));
        }
        if let Some(host) = &self.remote.host {
            if host.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "remote.host must not be empty".to_string(),
                ));
            }
        }
        if self.channel == ChannelKind::Remote {
            if self.remote.host.is_none() {
                return Err(ConfigError::Validation(
                    "remote.host is required when channel is \"remote\"".to_string(),
                ));
            }
            if self.remote.username.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::Validation(
                    "remote.username is required when channel is \"remote\"".to_string(),
                ));
            }
        }
        if self.local.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "local.timeout_secs must be non-zero when set".to_string(),
            ));
        }
        if self.remote.connect_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "remote.connect_timeout_secs must be non-zero when set".to_string(),
            ));
        }
        if self.remote.request_timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "remote.request_timeout_secs must be non-zero when set".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        // Validate error overrides
        for (i, code) in self.errors.suppress.iter().enumerate() {
            if !valid_status_code(*code) {
                return Err(ConfigError::Validation(format!(
                    "errors.suppress[{i}] must be a status code in 100..=599, got {code}"
                )));
            }
        }
        for (code, _) in self.errors.parsed_messages()? {
            if !valid_status_code(code) {
                return Err(ConfigError::Validation(format!(
                    "errors.messages key must be a status code in 100..=599, got {code}"
                )));
            }
            if self.errors.suppress.contains(&code) {
                return Err(ConfigError::Validation(format!(
                    "status {code} is both suppressed and given a message"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.channel, ChannelKind::Local);
        assert_eq!(config.local.socket_path, "/FQ/CNCapi");
        assert_eq!(config.remote.port, 987);
        assert!(config.remote.host.is_none());
        assert!(!config.remote.accept_invalid_certs);
        assert_eq!(config.logging.level, "warn");
        assert!(config.errors.messages.is_empty());
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config = ClientConfig::parse("").unwrap();
        assert_eq!(config.channel, ChannelKind::Local);
        assert_eq!(config.remote.port, DEFAULT_REMOTE_PORT);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
            channel = "remote"

            [local]
            socket_path = "/run/fq.sock"
            timeout_secs = 15

            [remote]
            host = "cnc.example.com"
            port = 8987
            username = "admin"
            accept_invalid_certs = true
            connect_timeout_secs = 5
            request_timeout_secs = 30

            [logging]
            level = "debug"

            [errors]
            suppress = [404]

            [errors.messages]
            "409" = "account already exists"
        "#;
        let config = ClientConfig::parse(toml).unwrap();
        assert_eq!(config.channel, ChannelKind::Remote);
        assert_eq!(config.local.socket_path, "/run/fq.sock");
        assert_eq!(config.local.timeout_secs, Some(15));
        assert_eq!(config.remote.host.as_deref(), Some("cnc.example.com"));
        assert_eq!(config.remote.port, 8987);
        assert_eq!(config.remote.username.as_deref(), Some("admin"));
        assert!(config.remote.accept_invalid_certs);
        assert_eq!(config.remote.connect_timeout_secs, Some(5));
        assert_eq!(config.remote.request_timeout_secs, Some(30));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.errors.suppress, vec![404]);
        assert_eq!(
            config.errors.parsed_messages().unwrap(),
            vec![(409, "account already exists".to_string())]
        );
    }

    #[test]
    fn test_validation_rejects_zero_port() {
        let toml = r#"
            [remote]
            port = 0
        "#;
        assert!(ClientConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_empty_socket_path() {
        let toml = r#"
            [local]
            socket_path = ""
        "#;
        assert!(ClientConfig::parse(toml).is_err());
    }

    #[test]
    fn test_remote_channel_requires_host() {
        let toml = r#"
            channel = "remote"

            [remote]
            username = "admin"
        "#;
        let err = ClientConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("remote.host"));
    }

    #[test]
    fn test_remote_channel_requires_username() {
        let toml = r#"
            channel = "remote"

            [remote]
            host = "cnc.example.com"
        "#;
        let err = ClientConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("remote.username"));
    }

    #[test]
    fn test_validation_rejects_unknown_channel() {
        let toml = r#"channel = "carrier-pigeon""#;
        assert!(matches!(
            ClientConfig::parse(toml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let toml = r#"
            [remote]
            request_timeout_secs = 0
        "#;
        assert!(ClientConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_log_level() {
        let toml = r#"
            [logging]
            level = "loud"
        "#;
        assert!(ClientConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_non_numeric_message_key() {
        let toml = r#"
            [errors.messages]
            "not-found" = "nothing here"
        "#;
        assert!(ClientConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_range_codes() {
        let toml = r#"
            [errors]
            suppress = [42]
        "#;
        assert!(ClientConfig::parse(toml).is_err());

        let toml = r#"
            [errors.messages]
            "700" = "nope"
        "#;
        assert!(ClientConfig::parse(toml).is_err());
    }

    #[test]
    fn test_validation_rejects_suppressed_code_with_message() {
        let toml = r#"
            [errors]
            suppress = [404]

            [errors.messages]
            "404" = "missing"
        "#;
        let err = ClientConfig::parse(toml).unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    // ── Async file-based loading ──────────────────────────────────────

    #[tokio::test]
    async fn test_load_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("fqapi.toml");
        tokio::fs::write(&path, b"[local]\nsocket_path = \"/tmp/fq.sock\"\n")
            .await
            .unwrap();

        let config = ClientConfig::load(&path).await.unwrap();
        assert_eq!(config.local.socket_path, "/tmp/fq.sock");
    }

    #[tokio::test]
    async fn test_load_nonexistent_file() {
        let result = ClientConfig::load(Path::new("/nonexistent/fqapi.toml")).await;
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[tokio::test]
    async fn test_load_invalid_toml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        tokio::fs::write(&path, b"not valid toml [[[").await.unwrap();

        let result = ClientConfig::load(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::Validation("bad value".to_string());
        assert_eq!(err.to_string(), "validation error: bad value");
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = ClientConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = ClientConfig::parse(&text).unwrap();
        assert_eq!(parsed.local.socket_path, config.local.socket_path);
        assert_eq!(parsed.remote.port, config.remote.port);
    }
}
