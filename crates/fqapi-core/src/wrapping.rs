//! Wrapping client: "fail loudly and exit" for command-line entry points.
//!
//! Instead of returning [`ApiError`](crate::ApiError), a [`WrappingClient`]
//! looks the status code up in an [`ErrorMessages`] table and hands the
//! formatted message to a [`TerminalSink`], which prints it and ends the
//! process. Codes marked [`ErrorAction::Suppress`] are returned as success.
//!
//! Only use this from top-level commands: a library caller cannot recover
//! from a sink that exits.

use std::collections::BTreeMap;

use fqapi_config::{ConfigError, ErrorsConfig};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::channel::Channel;
use crate::client::Client;
use crate::codec::Method;
use crate::error::ClientError;

/// Template used for non-2xx codes without an entry in the table.
pub const GENERIC_TEMPLATE: &str = "API error: {code} {message}";

/// What to do when a given status code comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorAction {
    /// Treat the code as success and return the payload.
    Suppress,
    /// Fail with this template (`{code}` and `{message}` are substituted).
    Message(String),
}

/// Outcome of looking a response up in an [`ErrorMessages`] table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Success,
    Failure(String),
}

/// Status code → [`ErrorAction`] table, seeded with `500 → "Internal API error"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessages {
    table: BTreeMap<u16, ErrorAction>,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        let mut table = BTreeMap::new();
        table.insert(500, ErrorAction::Message("Internal API error".to_string()));
        Self { table }
    }
}

impl ErrorMessages {
    /// The default table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default table merged with `overrides`; overrides win.
    pub fn with_overrides(overrides: impl IntoIterator<Item = (u16, ErrorAction)>) -> Self {
        let mut messages = Self::default();
        messages.table.extend(overrides);
        messages
    }

    /// The default table merged with the `[errors]` config section.
    pub fn from_config(config: &ErrorsConfig) -> Result<Self, ConfigError> {
        let suppressed = config
            .suppress
            .iter()
            .map(|code| (*code, ErrorAction::Suppress));
        let messages = config
            .parsed_messages()?
            .into_iter()
            .map(|(code, template)| (code, ErrorAction::Message(template)));
        Ok(Self::with_overrides(suppressed.chain(messages)))
    }

    /// Treat `code` as success.
    pub fn suppress(mut self, code: u16) -> Self {
        self.table.insert(code, ErrorAction::Suppress);
        self
    }

    /// Fail on `code` with `template`, even if `code` is 2xx.
    pub fn message(mut self, code: u16, template: impl Into<String>) -> Self {
        self.table.insert(code, ErrorAction::Message(template.into()));
        self
    }

    pub fn get(&self, code: u16) -> Option<&ErrorAction> {
        self.table.get(&code)
    }

    /// Decide what a response with `code` and `reason` means.
    ///
    /// An explicit entry always wins over the 2xx range check.
    pub fn resolve(&self, code: u16, reason: &str) -> Disposition {
        match self.table.get(&code) {
            Some(ErrorAction::Suppress) => Disposition::Success,
            Some(ErrorAction::Message(template)) => {
                Disposition::Failure(format_template(template, code, reason))
            }
            None if !(200..300).contains(&code) => {
                Disposition::Failure(format_template(GENERIC_TEMPLATE, code, reason))
            }
            None => Disposition::Success,
        }
    }
}

/// Substitute `{code}` and `{message}` in `template`.
pub fn format_template(template: &str, code: u16, message: &str) -> String {
    template
        .replace("{code}", &code.to_string())
        .replace("{message}", message)
}

/// Where unrecoverable API failures go.
pub trait TerminalSink {
    /// Report `message` and end the process. Never returns.
    fn terminate(&self, message: &str) -> !;
}

/// Prints `"<program>: <message>"` to stderr and exits with status 1.
#[derive(Debug, Clone)]
pub struct ProcessExit {
    program: String,
}

impl ProcessExit {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Named after the running executable (`fqapi` if it cannot be determined).
    pub fn current() -> Self {
        let program = std::env::args_os()
            .next()
            .as_deref()
            .map(std::path::Path::new)
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "fqapi".to_string());
        Self::new(program)
    }

    /// The diagnostic line written before exiting.
    pub fn line(&self, message: &str) -> String {
        format!("{}: {}", self.program, message)
    }
}

impl TerminalSink for ProcessExit {
    fn terminate(&self, message: &str) -> ! {
        eprintln!("{}", self.line(message));
        std::process::exit(1)
    }
}

/// Why a wrapped request did not produce a payload.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    /// The error table turned the status into this message.
    #[error("{0}")]
    Api(String),

    /// Transport, decode, or encode failure, unchanged.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// A [`Client`] that terminates through a [`TerminalSink`] on API errors.
#[derive(Debug)]
pub struct WrappingClient<C, S = ProcessExit> {
    client: Client<C>,
    messages: ErrorMessages,
    sink: S,
}

impl<C: Channel> WrappingClient<C, ProcessExit> {
    /// Wrap `client` with the process-exiting sink named after this executable.
    pub fn exiting(client: Client<C>, messages: ErrorMessages) -> Self {
        Self::new(client, messages, ProcessExit::current())
    }
}

impl<C: Channel, S: TerminalSink> WrappingClient<C, S> {
    pub fn new(client: Client<C>, messages: ErrorMessages, sink: S) -> Self {
        Self {
            client,
            messages,
            sink,
        }
    }

    pub fn client(&self) -> &Client<C> {
        &self.client
    }

    pub fn messages(&self) -> &ErrorMessages {
        &self.messages
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

    /// Make a request; API failures terminate through the sink.
    ///
    /// Transport, decode, and encode errors are still returned so the entry
    /// point can report them.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<Value>, ClientError> {
        match self.try_request(method, path, body).await {
            Ok(body) => Ok(body),
            Err(Failure::Api(message)) => self.sink.terminate(&message),
            Err(Failure::Client(e)) => Err(e),
        }
    }

    /// Make a request and report the decision without terminating.
    pub async fn try_request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Option<Value>, Failure> {
        let response = self.client.send(method, path, body).await?;
        match self.messages.resolve(response.status, &response.reason) {
            Disposition::Success => Ok(response.body),
            Disposition::Failure(message) => {
                debug!(status = response.status, %message, "API request failed");
                Err(Failure::Api(message))
            }
        }
    }
}
