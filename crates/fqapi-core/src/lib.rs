#![deny(unsafe_code)]

//! Client access layer for the FQ management API daemon.
//!
//! The daemon speaks HTTP/1.1 with JSON bodies, either over a local UNIX
//! domain socket or over HTTPS with basic authentication. This crate builds
//! wire-correct requests, moves them over either channel, decodes replies,
//! and turns status codes into a structured error model.
//!
//! ```text
//! caller ─▶ Client::get/put/post/delete
//!              │ serialize body once
//!              ▼
//!           Channel::exchange ── LocalChannel (codec::encode / codec::decode)
//!              │              └─ RemoteChannel (reqwest over TLS)
//!              ▼
//!           classify(status) ─▶ Ok(body) | Err(ApiError)
//!
//! WrappingClient: same exchange, but ErrorMessages decide, and failures go
//! to a TerminalSink (print + exit) instead of being returned.
//! ```

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future. The return type of
/// [`Channel::exchange`](channel::Channel::exchange), which must stay
/// object-safe so channels can be used behind `dyn Channel`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Local and remote transport strategies.
pub mod channel;
/// Generic client: the four verbs and status classification.
pub mod client;
/// HTTP/1.1 request framing and response parsing.
pub mod codec;
/// Transport, decode, and API error types.
pub mod error;
/// Decorator that turns API errors into a printed diagnostic and process exit.
pub mod wrapping;

pub use channel::{Channel, Credentials, DaemonChannel, LocalChannel, RemoteChannel, RemoteSettings};
pub use client::{Client, LocalClient, RemoteClient, check_path, classify};
pub use codec::{Method, Request, Response};
pub use error::{ApiError, ClientError, DecodeError, TransportError};
pub use wrapping::{
    Disposition, ErrorAction, ErrorMessages, Failure, ProcessExit, TerminalSink, WrappingClient,
};
