//! Error taxonomy shared by the codec, channels, and clients.
//!
//! Channels only ever produce [`TransportError`] and [`DecodeError`].
//! [`ApiError`] is raised in exactly one place: status classification in
//! the generic client.

use std::path::PathBuf;

/// Failure to move bytes to or from the daemon.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("daemon is not running (socket not found at {0})")]
    NotRunning(PathBuf),

    #[error("failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write request: {0}")]
    Write(#[source] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("the remote channel requires a username and password")]
    MissingCredentials,
}

/// Failure to make sense of the daemon's reply.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed response head: {0}")]
    MalformedHead(#[from] httparse::Error),

    #[error("connection closed before the response head was complete")]
    IncompleteHead,

    #[error("response head exceeds {limit} bytes")]
    HeadTooLarge { limit: usize },

    #[error("connection closed after {received} of {expected} bytes")]
    Truncated { expected: usize, received: usize },

    #[error("invalid Content-Length header")]
    InvalidContentLength,

    #[error("invalid chunked transfer encoding")]
    BadChunk,

    #[error("failed to read response: {0}")]
    Io(#[from] std::io::Error),

    #[error("response body is not UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("response body is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
}

/// A response whose status code falls outside `200..300`.
///
/// Carries the status code and the reason text from the status line, never
/// the response body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code} {message}")]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

impl ApiError {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}


/// Everything a client call can fail with.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("failed to serialize request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// The resource path is not absolute or contains whitespace or control bytes.
    #[error("invalid resource path {0:?}")]
    InvalidPath(String),
}

impl ClientError {
    /// The status code, when the daemon answered with a non-2xx status.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api(e) => Some(e.code),
            _ => None,
        }
    }
}
