//! Remote-debugging session over WebSocket.
//!
//! One session drives one page target: a writer half guarded by an async
//! mutex, a reader task that routes command replies through a pending table
//! and fans network events out to registered observers. Response bodies are
//! fetched lazily (`Network.getResponseBody`) and only when someone listens.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use modium_core::{Error, Result};

use crate::endpoint::DebugTarget;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Metadata of an outgoing request observed at the transport level.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub request_id: String,
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
}

/// Metadata of an incoming response observed at the transport level.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub request_id: String,
    pub url: String,
    pub status: i64,
    pub mime_type: String,
    pub headers: HashMap<String, String>,
}

type RequestHandler = Arc<dyn Fn(&RequestMeta) + Send + Sync>;
type ResponseHandler = Arc<dyn Fn(&ResponseMeta) + Send + Sync>;
type BodyHandler = Arc<dyn Fn(&str) + Send + Sync>;

struct SessionInner {
    sink: tokio::sync::Mutex<WsSink>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    next_id: AtomicU64,
    request_handlers: RwLock<Vec<RequestHandler>>,
    response_handlers: RwLock<Vec<ResponseHandler>>,
    body_handlers: RwLock<Vec<BodyHandler>>,
}

/// A live debugging session against one page target.
#[derive(Clone)]
pub struct DevtoolsSession {
    inner: Arc<SessionInner>,
}

impl DevtoolsSession {
    /// Connect to the target's debugger socket and enable the domains this
    /// tool needs (runtime evaluation, page lifecycle, network events).
    pub async fn connect(host: &str, port: u16, target: &DebugTarget) -> Result<Self> {
        let ws_url = target
            .web_socket_debugger_url
            .clone()
            .unwrap_or_else(|| format!("ws://{host}:{port}/devtools/page/{}", target.id));

        info!("Attaching to target: {} {}", target.title, target.url);

        let (ws, _) = connect_async(&ws_url)
            .await
            .map_err(|e| Error::Transport(format!("websocket connect: {e}")))?;
        let (sink, stream) = ws.split();

        let inner = Arc::new(SessionInner {
            sink: tokio::sync::Mutex::new(sink),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            request_handlers: RwLock::new(Vec::new()),
            response_handlers: RwLock::new(Vec::new()),
            body_handlers: RwLock::new(Vec::new()),
        });

        tokio::spawn(read_loop(inner.clone(), stream));

        let session = Self { inner };
        session.send_command("Runtime.enable", json!({})).await?;
        session.send_command("Page.enable", json!({})).await?;
        session.send_command("Network.enable", json!({})).await?;
        Ok(session)
    }

    /// Send a raw protocol command and await its reply.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        command(&self.inner, method, params).await
    }

    /// Evaluate an expression in the page, awaiting any returned promise.
    /// Exceptions raised in the remote context map to `EvaluationFailed`.
    pub async fn evaluate(&self, expression: &str) -> Result<Value> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .and_then(|d| d.as_str())
                .or_else(|| details.get("text").and_then(|t| t.as_str()))
                .unwrap_or("unknown exception");
            return Err(Error::EvaluationFailed(text.to_string()));
        }

        Ok(result.pointer("/result/value").cloned().unwrap_or(Value::Null))
    }

    /// Observe outgoing request metadata. Registered once per concern.
    pub fn on_outgoing_request(&self, handler: impl Fn(&RequestMeta) + Send + Sync + 'static) {
        self.inner.request_handlers.write().push(Arc::new(handler));
    }

    /// Observe incoming response metadata.
    pub fn on_response(&self, handler: impl Fn(&ResponseMeta) + Send + Sync + 'static) {
        self.inner.response_handlers.write().push(Arc::new(handler));
    }

    /// Observe response body text. Body retrieval only happens while at least
    /// one handler is registered.
    pub fn on_response_body(&self, handler: impl Fn(&str) + Send + Sync + 'static) {
        self.inner.body_handlers.write().push(Arc::new(handler));
    }

    /// Close the socket. Best-effort; the reader task ends with the stream.
    pub async fn close(&self) {
        let mut sink = self.inner.sink.lock().await;
        let _ = sink.send(Message::Close(None)).await;
    }
}

async fn command(inner: &Arc<SessionInner>, method: &str, params: Value) -> Result<Value> {
    let id = inner.next_id.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = oneshot::channel();
    inner.pending.lock().insert(id, tx);

    let frame = json!({"id": id, "method": method, "params": params}).to_string();
    {
        let mut sink = inner.sink.lock().await;
        if let Err(e) = sink.send(Message::Text(frame.into())).await {
            inner.pending.lock().remove(&id);
            return Err(Error::Transport(format!("{method}: send failed: {e}")));
        }
    }

    let reply = rx
        .await
        .map_err(|_| Error::Transport("session closed".to_string()))?;

    if let Some(err) = reply.get("error") {
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown protocol error");
        return Err(Error::Transport(format!("{method}: {msg}")));
    }

    Ok(reply.get("result").cloned().unwrap_or(Value::Null))
}

async fn read_loop(inner: Arc<SessionInner>, mut stream: WsStream) {
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let frame: Value = match serde_json::from_str(&text) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                if let Some(id) = frame.get("id").and_then(|i| i.as_u64()) {
                    if let Some(tx) = inner.pending.lock().remove(&id) {
                        let _ = tx.send(frame);
                    }
                } else if let Some(method) = frame.get("method").and_then(|m| m.as_str()) {
                    let params = frame.get("params").cloned().unwrap_or(Value::Null);
                    dispatch_event(&inner, method, &params);
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    // Fail anything still awaiting a reply.
    inner.pending.lock().clear();
    debug!("devtools reader stopped");
}

fn dispatch_event(inner: &Arc<SessionInner>, method: &str, params: &Value) {
    match method {
        "Network.requestWillBeSent" => {
            if let Some(meta) = parse_request_meta(params) {
                let handlers: Vec<RequestHandler> = inner.request_handlers.read().clone();
                for h in handlers {
                    h(&meta);
                }
            }
        }
        "Network.responseReceived" => {
            if let Some(meta) = parse_response_meta(params) {
                let handlers: Vec<ResponseHandler> = inner.response_handlers.read().clone();
                for h in handlers {
                    h(&meta);
                }
            }
        }
        "Network.loadingFinished" => {
            if inner.body_handlers.read().is_empty() {
                return;
            }
            if let Some(request_id) = params.get("requestId").and_then(|r| r.as_str()) {
                tokio::spawn(fetch_body(inner.clone(), request_id.to_string()));
            }
        }
        _ => {}
    }
}

async fn fetch_body(inner: Arc<SessionInner>, request_id: String) {
    match command(
        &inner,
        "Network.getResponseBody",
        json!({"requestId": request_id}),
    )
    .await
    {
        Ok(result) => {
            if result
                .get("base64Encoded")
                .and_then(|b| b.as_bool())
                .unwrap_or(false)
            {
                return;
            }
            if let Some(body) = result.get("body").and_then(|b| b.as_str()) {
                let handlers: Vec<BodyHandler> = inner.body_handlers.read().clone();
                for h in handlers {
                    h(body);
                }
            }
        }
        // Bodies are routinely evicted before we ask; expected.
        Err(e) => debug!("getResponseBody unavailable for {request_id}: {e}"),
    }
}

fn parse_request_meta(params: &Value) -> Option<RequestMeta> {
    let request = params.get("request")?;
    Some(RequestMeta {
        request_id: params
            .get("requestId")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .to_string(),
        method: request
            .get("method")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string(),
        url: request
            .get("url")
            .and_then(|u| u.as_str())
            .unwrap_or_default()
            .to_string(),
        headers: headers_map(request.get("headers")),
    })
}

fn parse_response_meta(params: &Value) -> Option<ResponseMeta> {
    let response = params.get("response")?;
    Some(ResponseMeta {
        request_id: params
            .get("requestId")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .to_string(),
        url: response
            .get("url")
            .and_then(|u| u.as_str())
            .unwrap_or_default()
            .to_string(),
        status: response.get("status").and_then(|s| s.as_i64()).unwrap_or(0),
        mime_type: response
            .get("mimeType")
            .and_then(|m| m.as_str())
            .unwrap_or_default()
            .to_string(),
        headers: headers_map(response.get("headers")),
    })
}

fn headers_map(value: Option<&Value>) -> HashMap<String, String> {
    value
        .and_then(|v| v.as_object())
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_meta() {
        let params = json!({
            "requestId": "R1",
            "request": {
                "method": "POST",
                "url": "http://ipc.localhost/post_msg_to_backend",
                "headers": {
                    "Tauri-Invoke-Key": "k-123",
                    "content-type": "application/json"
                }
            }
        });
        let meta = parse_request_meta(&params).unwrap();
        assert_eq!(meta.request_id, "R1");
        assert_eq!(meta.method, "POST");
        assert_eq!(meta.headers.get("Tauri-Invoke-Key").unwrap(), "k-123");
    }

    #[test]
    fn test_parse_response_meta() {
        let params = json!({
            "requestId": "R2",
            "response": {
                "url": "https://api.example.com/mods",
                "status": 200,
                "mimeType": "application/json",
                "headers": {"server": "nginx"}
            }
        });
        let meta = parse_response_meta(&params).unwrap();
        assert_eq!(meta.status, 200);
        assert_eq!(meta.mime_type, "application/json");
    }

    #[test]
    fn test_parse_request_meta_missing_request() {
        assert!(parse_request_meta(&json!({"requestId": "R3"})).is_none());
    }

    #[test]
    fn test_headers_map_ignores_non_strings() {
        let headers = headers_map(Some(&json!({"a": "1", "b": 2})));
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("a").unwrap(), "1");
    }
}
