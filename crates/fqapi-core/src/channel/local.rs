//! Local channel: HTTP/1.1 over the daemon's UNIX domain socket.
//!
//! No credentials are sent: the daemon authenticates the peer from the
//! socket's OS-level credentials. Every exchange uses a fresh connection,
//! closed when the exchange ends, whether it succeeded or not.

use std::path::{Path, PathBuf};
use std::time::Duration;

use fqapi_config::LocalConfig;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tracing::debug;

use super::Channel;
use crate::BoxFuture;
use crate::codec::{self, Request, Response};
use crate::error::{ClientError, TransportError};

/// Channel to a daemon on the same machine.
#[derive(Debug, Clone)]
pub struct LocalChannel {
    socket_path: PathBuf,
    timeout: Option<Duration>,
}

impl LocalChannel {
    /// Create a channel targeting the given socket path.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: None,
        }
    }

    pub fn from_config(config: &LocalConfig) -> Self {
        let channel = Self::new(&config.socket_path);
        match config.timeout_secs {
            Some(secs) => channel.with_timeout(Duration::from_secs(secs)),
            None => channel,
        }
    }

    /// Bound each exchange (connect, write, and read) by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Check if the daemon socket exists (daemon is likely running).
    pub fn daemon_available(&self) -> bool {
        self.socket_path.exists()
    }

    async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        if !self.daemon_available() {
            return Err(TransportError::NotRunning(self.socket_path.clone()).into());
        }

        let mut stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|e| TransportError::Connect {
                    target: self.socket_path.display().to_string(),
                    source: e,
                })?;

        let raw = request.to_raw();
        debug!(
            method = %request.method,
            path = %request.path,
            bytes = raw.len(),
            "local request"
        );

        stream
            .write_all(raw.as_bytes())
            .await
            .map_err(TransportError::Write)?;
        stream.flush().await.map_err(TransportError::Write)?;

        Ok(codec::decode(&mut stream).await?)
    }
}

impl Channel for LocalChannel {
    fn name(&self) -> &'static str {
        "local"
    }

    fn exchange<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, ClientError>> {
        Box::pin(async move {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, self.send(request))
                    .await
                    .map_err(|_| {
                        TransportError::Timeout(format!(
                            "no response from {} within {limit:?}",
                            self.socket_path.display()
                        ))
                    })?,
                None => self.send(request).await,
            }
        })
    }
}
