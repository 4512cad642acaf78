//! Mock daemons on temporary UNIX sockets.
//!
//! - [`RawDaemon`] answers every connection with the same raw bytes and
//!   records the raw request bytes, for byte-exact framing checks.
//! - [`MockDaemon`] is an `axum` router with scripted per-route replies that
//!   records every request it sees.
//!
//! Both own a temp directory holding the socket; it is deleted on drop,
//! guaranteeing cleanup even on panic.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

fn bind_temp_socket() -> (TempDir, PathBuf, UnixListener) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let socket_path = temp_dir.path().join("daemon.sock");
    let listener = UnixListener::bind(&socket_path).expect("failed to bind test socket");
    (temp_dir, socket_path, listener)
}

// ── RawDaemon ────────────────────────────────────────────────────────────

/// A daemon that replies to every request with fixed raw bytes, then closes
/// the connection.
pub struct RawDaemon {
    socket_path: PathBuf,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
    connections: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
    _temp_dir: TempDir,
}

impl RawDaemon {
    /// Start a daemon replying with `response` verbatim.
    pub async fn start(response: impl Into<Vec<u8>>) -> Self {
        Self::spawn(Some(response.into()))
    }

    /// Start a daemon that reads requests but never answers.
    pub async fn silent() -> Self {
        Self::spawn(None)
    }

    fn spawn(response: Option<Vec<u8>>) -> Self {
        let (temp_dir, socket_path, listener) = bind_temp_socket();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&requests);
        let count = Arc::clone(&connections);
        let handle = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((mut stream, _)) = listener.accept().await {
                count.fetch_add(1, Ordering::SeqCst);
                let request = read_request(&mut stream).await;
                seen.lock().expect("request log poisoned").push(request);
                match &response {
                    Some(bytes) => {
                        let _ = stream.write_all(bytes).await;
                        let _ = stream.shutdown().await;
                    }
                    None => held.push(stream),
                }
            }
        });

        Self {
            socket_path,
            requests,
            connections,
            handle,
            _temp_dir: temp_dir,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Raw bytes of every request received, in arrival order.
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.requests.lock().expect("request log poisoned").clone()
    }

    /// Number of connections accepted.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

impl Drop for RawDaemon {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Read one request: the head, then `Content-Length` body bytes.
async fn read_request(stream: &mut UnixStream) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(total) = request_len(&buf) {
            if buf.len() >= total {
                buf.truncate(total);
                return buf;
            }
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return buf,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

fn request_len(buf: &[u8]) -> Option<usize> {
    let mut headers = [httparse::EMPTY_HEADER; 64];
    let mut req = httparse::Request::new(&mut headers);
    let head = match req.parse(buf) {
        Ok(httparse::Status::Complete(head)) => head,
        _ => return None,
    };
    let body = req
        .headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case("content-length"))
        .and_then(|h| std::str::from_utf8(h.value).ok()?.trim().parse::<usize>().ok())
        .unwrap_or(0);
    Some(head + body)
}

// ── MockDaemon ───────────────────────────────────────────────────────────

/// A request as seen by [`MockDaemon`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// The body decoded as JSON, if there was one.
    pub fn json(&self) -> Option<Value> {
        if self.body.is_empty() {
            None
        } else {
            serde_json::from_slice(&self.body).ok()
        }
    }

    /// First header with this (case-insensitive) name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct MockState {
    replies: Mutex<HashMap<(String, String), (u16, Option<Value>)>>,
    recorded: Mutex<Vec<RecordedRequest>>,
}

/// An HTTP daemon on a temporary UNIX socket with scripted replies.
///
/// Unscripted routes answer `404` with `{"error": "not found"}`.
pub struct MockDaemon {
    socket_path: PathBuf,
    state: Arc<MockState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
    _temp_dir: TempDir,
}

impl MockDaemon {
    pub async fn start() -> Self {
        let (temp_dir, socket_path, listener) = bind_temp_socket();
        let state = Arc::new(MockState::default());
        let app = router(Arc::clone(&state));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });
        debug!(path = %socket_path.display(), "mock daemon listening");

        Self {
            socket_path,
            state,
            shutdown_tx: Some(shutdown_tx),
            handle,
            _temp_dir: temp_dir,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Answer `method path` with `status` and an optional JSON body.
    pub fn reply(&self, method: &str, path: &str, status: u16, body: Option<Value>) -> &Self {
        self.state
            .replies
            .lock()
            .expect("reply table poisoned")
            .insert((method.to_uppercase(), path.to_string()), (status, body));
        self
    }

    /// Every request received, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .recorded
            .lock()
            .expect("request log poisoned")
            .clone()
    }
}

impl Drop for MockDaemon {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.handle.abort();
    }
}

fn router(state: Arc<MockState>) -> axum::Router {
    axum::Router::new().fallback(handle).with_state(state)
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let recorded = RecordedRequest {
        method: method.as_str().to_string(),
        path: uri.path().to_string(),
        headers: headers
            .iter()
            .map(|(n, v)| (n.as_str().to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect(),
        body: body.to_vec(),
    };
    let key = (recorded.method.clone(), recorded.path.clone());
    state
        .recorded
        .lock()
        .expect("request log poisoned")
        .push(recorded);

    let (status, body) = state
        .replies
        .lock()
        .expect("reply table poisoned")
        .get(&key)
        .cloned()
        .unwrap_or_else(|| (404, Some(json!({"error": "not found"}))));
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    match body {
        Some(value) => (status, Json(value)).into_response(),
        None => status.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_scripted_reply_and_recording() {
        let state = Arc::new(MockState::default());
        state.replies.lock().unwrap().insert(
            ("POST".to_string(), "/1/ftp".to_string()),
            (201, Some(json!({"name": "x"}))),
        );
        let app = router(Arc::clone(&state));

        let req = Request::post("/1/ftp")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"x"}"#))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(serde_json::from_slice::<Value>(&body).unwrap(), json!({"name": "x"}));

        let recorded = state.recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].method, "POST");
        assert_eq!(recorded[0].json(), Some(json!({"name": "x"})));
        assert_eq!(recorded[0].header("Content-Type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_unscripted_route_is_not_found() {
        let app = router(Arc::new(MockState::default()));
        let req = Request::get("/1/nothing").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_reply_body() {
        let state = Arc::new(MockState::default());
        state
            .replies
            .lock()
            .unwrap()
            .insert(("DELETE".to_string(), "/1/ftp/bob".to_string()), (204, None));
        let app = router(state);
        let req = Request::delete("/1/ftp/bob").body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn test_request_len() {
        assert_eq!(request_len(b"GET / HTTP/1.1\r\n"), None);
        assert_eq!(request_len(b"GET / HTTP/1.1\r\n\r\n"), Some(18));
        assert_eq!(
            request_len(b"PUT / HTTP/1.1\r\nContent-Length: 4\r\n\r\nnull"),
            Some(41)
        );
    }
}
