//! Channels: how a [`Request`] reaches the daemon and a [`Response`] comes back.
//!
//! ```text
//! ┌──────────┐   HTTP/1.1 over UNIX socket   ┌──────────┐
//! │  Client  │──────── LocalChannel ────────▶│          │
//! │          │                               │  daemon  │
//! │          │──────── RemoteChannel ───────▶│          │
//! └──────────┘   HTTPS + basic auth (:987)   └──────────┘
//! ```
//!
//! Channels never classify status codes and never retry. They surface
//! [`TransportError`] and [`DecodeError`](crate::error::DecodeError)
//! unchanged.

pub mod local;
pub mod remote;

use fqapi_config::{ChannelKind, ClientConfig};

use crate::BoxFuture;
use crate::codec::{Request, Response};
use crate::error::{ClientError, TransportError};

pub use local::LocalChannel;
pub use remote::{Credentials, RemoteChannel, RemoteSettings};

/// A transport strategy exchanging one request for one response.
pub trait Channel: Send + Sync {
    /// Short name used in log events.
    fn name(&self) -> &'static str;

    /// Send `request` and read the complete response.
    fn exchange<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, ClientError>>;
}

/// A channel chosen at runtime, typically from configuration.
#[derive(Debug)]
pub enum DaemonChannel {
    Local(LocalChannel),
    Remote(RemoteChannel),
}

impl DaemonChannel {
    /// Build the channel selected by `config.channel`.
    ///
    /// The remote channel needs `credentials`; the local channel ignores them.
    pub fn from_config(
        config: &ClientConfig,
        credentials: Option<Credentials>,
    ) -> Result<Self, TransportError> {
        match config.channel {
            ChannelKind::Local => Ok(Self::Local(LocalChannel::from_config(&config.local))),
            ChannelKind::Remote => {
                let credentials = credentials.ok_or(TransportError::MissingCredentials)?;
                let settings = RemoteSettings::from_config(&config.remote)?;
                Ok(Self::Remote(RemoteChannel::new(settings, credentials)?))
            }
        }
    }
}

impl Channel for DaemonChannel {
    fn name(&self) -> &'static str {
        match self {
            DaemonChannel::Local(c) => c.name(),
            DaemonChannel::Remote(c) => c.name(),
        }
    }

    fn exchange<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, ClientError>> {
        match self {
            DaemonChannel::Local(c) => c.exchange(request),
            DaemonChannel::Remote(c) => c.exchange(request),
        }
    }
}
