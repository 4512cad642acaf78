//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`ClientConfig`] values
//! without repeating boilerplate across crate boundaries.

use std::path::Path;

use fqapi_config::{ChannelKind, ClientConfig};

/// Fluent builder for [`ClientConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .socket_path(daemon.socket_path())
///     .suppress(404)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: ClientConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn socket_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.channel = ChannelKind::Local;
        self.config.local.socket_path = path.as_ref().display().to_string();
        self
    }

    pub fn local_timeout_secs(mut self, secs: u64) -> Self {
        self.config.local.timeout_secs = Some(secs);
        self
    }

    /// Select the remote channel for `host`, authenticating as `username`.
    pub fn remote(mut self, host: &str, username: &str) -> Self {
        self.config.channel = ChannelKind::Remote;
        self.config.remote.host = Some(host.to_string());
        self.config.remote.username = Some(username.to_string());
        self
    }

    pub fn remote_port(mut self, port: u16) -> Self {
        self.config.remote.port = port;
        self
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn suppress(mut self, code: u16) -> Self {
        self.config.errors.suppress.push(code);
        self
    }

    pub fn message(mut self, code: u16, template: &str) -> Self {
        self.config
            .errors
            .messages
            .insert(code.to_string(), template.to_string());
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
