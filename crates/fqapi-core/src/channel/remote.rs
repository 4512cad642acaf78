//! Remote channel: HTTPS to the daemon's TCP endpoint.
//!
//! Framing is left to `reqwest`; this channel only injects the
//! `Authorization: basic ...` and `Content-Type: application/json` headers.
//! The connection is always TLS (`https_only`, TLS 1.2 minimum); there is
//! no plaintext fallback. The underlying `reqwest::Client` keeps the TLS
//! session alive between calls.

use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use fqapi_config::{DEFAULT_REMOTE_PORT, RemoteConfig};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{StatusCode, Url};
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::Channel;
use crate::BoxFuture;
use crate::codec::{self, Method, Request, Response};
use crate::error::{ClientError, DecodeError, TransportError};

/// Shell user name and password for basic authentication.
///
/// Zeroized on drop and redacted in `Debug` output. Consumed when the
/// remote channel is built; only the encoded header survives.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `basic <base64(username:password)>`
    fn authorization(&self) -> Zeroizing<String> {
        let pair = Zeroizing::new(format!("{}:{}", self.username, self.password));
        Zeroizing::new(format!("basic {}", STANDARD.encode(pair.as_bytes())))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Where and how to reach a remote daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub host: String,
    pub port: u16,
    /// Skip certificate verification. Encryption is kept.
    pub accept_invalid_certs: bool,
    pub connect_timeout: Option<Duration>,
    pub request_timeout: Option<Duration>,
}

impl RemoteSettings {
    /// Settings for `host` on the default port, verifying certificates,
    /// without timeouts.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_REMOTE_PORT,
            accept_invalid_certs: false,
            connect_timeout: None,
            request_timeout: None,
        }
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self, TransportError> {
        let host = config.host.clone().ok_or_else(|| {
            TransportError::InvalidEndpoint("no remote host configured".to_string())
        })?;
        Ok(Self {
            host,
            port: config.port,
            accept_invalid_certs: config.accept_invalid_certs,
            connect_timeout: config.connect_timeout_secs.map(Duration::from_secs),
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
        })
    }

    fn base_url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("https://[{}]:{}", self.host, self.port)
        } else {
            format!("https://{}:{}", self.host, self.port)
        }
    }
}

/// Channel to a daemon over HTTPS with basic authentication.
#[derive(Debug)]
pub struct RemoteChannel {
    base_url: String,
    origin: Url,
    http: reqwest::Client,
    authorization: HeaderValue,
}

impl RemoteChannel {
    /// Build the HTTPS client and the authorization header.
    ///
    /// No connection is made until the first exchange.
    pub fn new(settings: RemoteSettings, credentials: Credentials) -> Result<Self, TransportError> {
        let base_url = settings.base_url();
        let origin = Url::parse(&base_url)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{base_url}: {e}")))?;

        let mut builder = reqwest::Client::builder()
            .https_only(true)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .user_agent(crate::build_info::user_agent());
        if settings.accept_invalid_certs {
            warn!(host = %settings.host, "TLS certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = settings.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| TransportError::Tls(e.to_string()))?;

        let mut authorization = HeaderValue::from_str(&credentials.authorization())
            .map_err(|_| TransportError::MissingCredentials)?;
        authorization.set_sensitive(true);

        debug!(url = %base_url, user = credentials.username(), "remote channel ready");
        Ok(Self {
            base_url,
            origin,
            http,
            authorization,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolve `path` against the daemon origin.
    ///
    /// Fails if the result would leave the configured scheme, host, or port,
    /// so the authorization header only ever goes to the configured daemon.
    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        let url = self
            .origin
            .join(path)
            .map_err(|e| TransportError::InvalidEndpoint(format!("{path:?}: {e}")))?;
        let same_origin = url.scheme() == self.origin.scheme()
            && url.host_str() == self.origin.host_str()
            && url.port_or_known_default() == self.origin.port_or_known_default()
            && url.username().is_empty()
            && url.password().is_none();
        if !same_origin {
            return Err(TransportError::InvalidEndpoint(format!(
                "{path:?} leaves {}",
                self.base_url
            )));
        }
        Ok(url)
    }

    /// The HTTP request for `request`, with authorization and JSON headers.
    fn build(&self, request: &Request) -> Result<reqwest::Request, TransportError> {
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self
            .http
            .request(method, self.endpoint(&request.path)?)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(CONTENT_TYPE, "application/json");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.as_bytes().to_vec());
        }
        builder
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))
    }

    async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let http_request = self.build(request)?;

        debug!(method = %request.method, path = %request.path, "remote request");
        let resp = self
            .http
            .execute(http_request)
            .await
            .map_err(|e| transport_error(&self.base_url, e))?;

        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| transport_error(&self.base_url, e))?;

        Ok(to_response(status, &bytes)?)
    }
}

/// Map a status and body to a [`Response`]; the reason is the canonical phrase.
fn to_response(status: StatusCode, body: &[u8]) -> Result<Response, DecodeError> {
    Ok(Response {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
        body: codec::decode_body(body)?,
    })
}

impl Channel for RemoteChannel {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn exchange<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<Response, ClientError>> {
        Box::pin(self.send(request))
    }
}

fn transport_error(target: &str, e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect {
            target: target.to_string(),
            source: std::io::Error::other(e),
        }
    } else {
        TransportError::Request(e.to_string())
    }
}
