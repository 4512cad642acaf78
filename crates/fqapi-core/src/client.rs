//! Generic client: the four verbs over any [`Channel`].
//!
//! The request body is serialized exactly once, here, before it reaches a
//! channel. Status classification also happens only here: anything outside
//! `200..300` becomes an [`ApiError`] carrying the code and reason text.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::channel::{Channel, Credentials, DaemonChannel, LocalChannel, RemoteChannel, RemoteSettings};
use crate::codec::{JsonBody, Method, Request, Response};
use crate::error::{ApiError, ClientError, TransportError};

/// A client over the local UNIX socket channel.
pub type LocalClient = Client<LocalChannel>;

/// A client over the remote HTTPS channel.
pub type RemoteClient = Client<RemoteChannel>;

/// Decide success or failure from a status code alone.
///
/// `200..300` is success; every other code is an [`ApiError`].
pub fn classify(status: u16, reason: &str) -> Result<(), ApiError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(ApiError::new(status, reason))
    }
}

/// Check that `path` is an absolute resource path fit for a request line.
///
/// Rejects relative and scheme-relative (`//host`) paths, backslashes,
/// whitespace, and control bytes.
pub fn check_path(path: &str) -> Result<(), ClientError> {
    let well_formed = path.starts_with('/')
        && !path.starts_with("//")
        && !path
            .chars()
            .any(|c| c == '\\' || c.is_whitespace() || c.is_control());
    if well_formed {
        Ok(())
    } else {
        Err(ClientError::InvalidPath(path.to_string()))
    }
}

/// Client for the FQ management API.
///
/// Returns the decoded JSON payload of successful calls (`None` when the
/// daemon sent no body) and an error for everything else.
///
/// # Example
///
/// ```ignore
/// let client = Client::local("/FQ/CNCapi");
/// let accounts = client.get("/1/ftp").await?;
/// ```
#[derive(Debug)]
pub struct Client<C> {
    channel: C,
}

impl Client<LocalChannel> {
    /// Client for a daemon listening on `socket_path`.
    pub fn local(socket_path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(LocalChannel::new(socket_path))
    }
}

impl Client<RemoteChannel> {
    /// Client for a remote daemon over HTTPS.
    pub fn remote(settings: RemoteSettings, credentials: Credentials) -> Result<Self, TransportError> {
        RemoteChannel::new(settings, credentials).map(Self::new)
    }
}

impl Client<DaemonChannel> {
    /// Client for whichever channel `config` selects.
    pub fn from_config(
        config: &fqapi_config::ClientConfig,
        credentials: Option<Credentials>,
    ) -> Result<Self, TransportError> {
        DaemonChannel::from_config(config, credentials).map(Self::new)
    }
}

impl<C: Channel> Client<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Issue a GET request.
    pub async fn get(&self, path: &str) -> Result<Option<Value>, ClientError> {
        self.request(Method::Get, path, None::<&Value>).await
    }

    /// Issue a PUT request.
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<Value>, ClientError> {
        self.request(Method::Put, path, Some(body)).await
    }

    /// Issue a POST request.
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<Value>, ClientError> {
        self.request(Method::Post, path, Some(body)).await
    }

    /// Issue a DELETE request.
    pub async fn delete(&self, path: &str) -> Result<Option<Value>, ClientError> {
        self.request(Method::Delete, path, None::<&Value>).await
    }

    /// Make a request and classify the response.
    ///
    /// Typically called through the verb wrappers above.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<Value>, ClientError> {
        let response = self.send(method, path, body).await?;
        classify(response.status, &response.reason)?;
        Ok(response.body)
    }

    /// Make a request and return the response unclassified.
    pub async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, ClientError> {
        check_path(path)?;
        let mut request = Request::new(method, path);
        if let Some(body) = body {
            request = request.with_body(JsonBody::encode(body).map_err(ClientError::Encode)?);
        }

        let response = self.channel.exchange(&request).await?;
        debug!(
            channel = self.channel.name(),
            %method,
            path,
            status = response.status,
            "daemon response"
        );
        Ok(response)
    }
}
