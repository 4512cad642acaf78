//! Wire codec: HTTP/1.1 request framing and response parsing.
//!
//! The local channel speaks HTTP/1.1 directly over the UNIX socket, so the
//! request bytes are produced here verbatim. Response heads are parsed with
//! `httparse`; bodies are framed by `Content-Length`, chunked transfer
//! coding, or connection close, in that order of preference.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

use crate::error::DecodeError;

/// Largest response head (status line + headers) accepted.
pub const MAX_HEAD_BYTES: usize = 64 * 1024;

/// Largest number of response headers accepted.
pub const MAX_HEADERS: usize = 64;

const READ_CHUNK: usize = 8 * 1024;

/// The request methods the daemon understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request body, already serialized to UTF-8 JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonBody(Vec<u8>);

impl JsonBody {
    /// Serialize `value` as JSON. `null` is a valid, present body.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_vec(value).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A logical request to the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Absolute resource path, e.g. `/1/ftp`.
    pub path: String,
    pub body: Option<JsonBody>,
    /// Extra headers, emitted in insertion order.
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: JsonBody) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Frame this request for the wire.
    pub fn to_raw(&self) -> RawMessage {
        encode(self.method, &self.path, self.body.as_ref(), &self.headers)
    }
}

/// A fully framed request, ready to be written to a socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage(Vec<u8>);

impl RawMessage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A decoded daemon response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    /// Reason phrase from the status line (may be empty).
    pub reason: String,
    /// `None` when the payload was empty.
    pub body: Option<Value>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Frame a request: request line, headers in order, JSON entity headers when
/// a body is present, blank line, body bytes.
pub fn encode(
    method: Method,
    path: &str,
    body: Option<&JsonBody>,
    headers: &[(String, String)],
) -> RawMessage {
    let mut head = format!("{method} {path} HTTP/1.1\r\n");
    for (name, value) in headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }
    if let Some(body) = body {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
        head.push_str("Content-Type: application/json\r\n");
    }
    head.push_str("\r\n");

    let mut bytes = head.into_bytes();
    if let Some(body) = body {
        bytes.extend_from_slice(body.as_bytes());
    }
    trace!(len = bytes.len(), "encoded request");
    RawMessage(bytes)
}

/// Decode a response body: empty means absent, anything else must be JSON.
pub fn decode_body(bytes: &[u8]) -> Result<Option<Value>, DecodeError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let text = std::str::from_utf8(bytes)?;
    serde_json::from_str(text)
        .map(Some)
        .map_err(DecodeError::Json)
}

/// Read one response from `reader` and decode it.
///
/// Reads exactly the framed body and nothing more, so the reader may be a
/// kept-alive connection.
pub async fn decode<R: AsyncRead + Unpin>(reader: R) -> Result<Response, DecodeError> {
    let mut incoming = Incoming::new(reader);
    let head = incoming.read_head().await?;

    let body = match head.framing {
        Framing::Length(n) => incoming.take(n).await?,
        Framing::Chunked => incoming.dechunk().await?,
        Framing::UntilClose => incoming.to_end().await?,
    };
    trace!(status = head.status, body_len = body.len(), "decoded response");

    Ok(Response {
        status: head.status,
        reason: head.reason,
        body: decode_body(&body)?,
    })
}

#[derive(Debug, PartialEq, Eq)]
enum Framing {
    Length(usize),
    Chunked,
    UntilClose,
}

struct Head {
    status: u16,
    reason: String,
    framing: Framing,
    len: usize,
}

fn parse_head(buf: &[u8]) -> Result<Option<Head>, DecodeError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Response::new(&mut headers);
    let len = match parsed.parse(buf)? {
        httparse::Status::Complete(len) => len,
        httparse::Status::Partial => return Ok(None),
    };

    let status = parsed.code.unwrap_or_default();
    let reason = parsed.reason.unwrap_or_default().to_string();

    let mut framing = Framing::UntilClose;
    for header in parsed.headers.iter() {
        if header.name.eq_ignore_ascii_case("transfer-encoding") {
            let value = String::from_utf8_lossy(header.value);
            let last = value.rsplit(',').next().unwrap_or_default().trim();
            if last.eq_ignore_ascii_case("chunked") {
                framing = Framing::Chunked;
                break;
            }
        } else if header.name.eq_ignore_ascii_case("content-length") {
            let n = std::str::from_utf8(header.value)
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .ok_or(DecodeError::InvalidContentLength)?;
            framing = Framing::Length(n);
        }
    }
    // No body, whatever the headers say
    if status == 204 || status == 304 || (100..200).contains(&status) {
        framing = Framing::Length(0);
    }

    Ok(Some(Head {
        status,
        reason,
        framing,
        len,
    }))
}

/// Buffered view over the response stream.
struct Incoming<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> Incoming<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(READ_CHUNK),
        }
    }

    /// Pull more bytes into the buffer; returns 0 at end of stream.
    async fn fill(&mut self) -> Result<usize, DecodeError> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.reader.read(&mut chunk).await?;
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Read the final response head, skipping interim `1xx` heads.
    ///
    /// `101 Switching Protocols` is final and returned as is.
    async fn read_head(&mut self) -> Result<Head, DecodeError> {
        loop {
            if let Some(head) = parse_head(&self.buf)? {
                self.buf.drain(..head.len);
                if (100..200).contains(&head.status) && head.status != 101 {
                    trace!(status = head.status, "skipped interim response");
                    continue;
                }
                return Ok(head);
            }
            if self.buf.len() > MAX_HEAD_BYTES {
                return Err(DecodeError::HeadTooLarge {
                    limit: MAX_HEAD_BYTES,
                });
            }
            if self.fill().await? == 0 {
                return Err(DecodeError::IncompleteHead);
            }
        }
    }

    async fn take(&mut self, n: usize) -> Result<Vec<u8>, DecodeError> {
        while self.buf.len() < n {
            if self.fill().await? == 0 {
                return Err(DecodeError::Truncated {
                    expected: n,
                    received: self.buf.len(),
                });
            }
        }
        Ok(self.buf.drain(..n).collect())
    }

    async fn to_end(&mut self) -> Result<Vec<u8>, DecodeError> {
        while self.fill().await? > 0 {}
        Ok(std::mem::take(&mut self.buf))
    }

    async fn read_line(&mut self) -> Result<Vec<u8>, DecodeError> {
        loop {
            if let Some(i) = self.buf.windows(2).position(|w| w == b"\r\n") {
                let mut line: Vec<u8> = self.buf.drain(..i + 2).collect();
                line.truncate(i);
                return Ok(line);
            }
            if self.buf.len() > MAX_HEAD_BYTES || self.fill().await? == 0 {
                return Err(DecodeError::BadChunk);
            }
        }
    }

    /// Consume one chunk-size line and return the size.
    async fn chunk_size(&mut self) -> Result<usize, DecodeError> {
        loop {
            match httparse::parse_chunk_size(&self.buf) {
                Ok(httparse::Status::Complete((used, size))) => {
                    self.buf.drain(..used);
                    return usize::try_from(size).map_err(|_| DecodeError::BadChunk);
                }
                Ok(httparse::Status::Partial) => {
                    if self.buf.len() > MAX_HEAD_BYTES || self.fill().await? == 0 {
                        return Err(DecodeError::BadChunk);
                    }
                }
                Err(_) => return Err(DecodeError::BadChunk),
            }
        }
    }

    async fn dechunk(&mut self) -> Result<Vec<u8>, DecodeError> {
        let mut body = Vec::new();
        loop {
            let size = self.chunk_size().await?;
            if size == 0 {
                // Trailer section ends with an empty line
                while !self.read_line().await?.is_empty() {}
                return Ok(body);
            }
            body.extend(self.take(size).await?);
            if !self.read_line().await?.is_empty() {
                return Err(DecodeError::BadChunk);
            }
        }
    }
}
