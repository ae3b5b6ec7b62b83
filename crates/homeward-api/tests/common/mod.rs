// In-process websocket server speaking just enough of the protocol for
// integration tests. Each accepted TCP connection is handed to the test's
// script together with its zero-based index.
#![allow(dead_code, clippy::unwrap_used)]

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use homeward_api::{Backoff, ClientConfig, ReconnectConfig, StatusNotice};

pub const TOKEN: &str = "tok";

// ── FakeServer ──────────────────────────────────────────────────────

pub struct FakeServer {
    pub url: String,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeServer {
    /// Start listening on an ephemeral port and run `script` per connection.
    pub async fn start<F, Fut>(script: F) -> Self
    where
        F: Fn(Incoming) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        let script = Arc::new(script);

        let task = tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                let index = counter.fetch_add(1, Ordering::SeqCst);
                let script = Arc::clone(&script);
                tokio::spawn(async move { script(Incoming { index, tcp }).await });
            }
        });

        Self {
            url: format!("ws://{addr}/api/websocket"),
            accepted,
            task,
        }
    }

    /// TCP connections accepted so far.
    pub fn connections(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ── Incoming / FakeConn ─────────────────────────────────────────────

pub struct Incoming {
    pub index: usize,
    tcp: TcpStream,
}

impl Incoming {
    /// Complete the websocket upgrade.
    pub async fn upgrade(self) -> FakeConn {
        let ws = tokio_tungstenite::accept_async(self.tcp).await.unwrap();
        FakeConn { ws }
    }

    /// Hang up before the websocket upgrade.
    pub fn reject(self) {
        drop(self.tcp);
    }
}

pub struct FakeConn {
    ws: WebSocketStream<TcpStream>,
}

impl FakeConn {
    pub async fn send_json(&mut self, value: Value) {
        let _ = self.ws.send(Message::text(value.to_string())).await;
    }

    /// Next JSON text frame, or `None` once the client has gone away.
    pub async fn recv_json(&mut self) -> Option<Value> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return serde_json::from_str(text.as_str()).ok(),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    /// Challenge, read the credential, accept it only if it equals `token`.
    pub async fn handshake(&mut self, token: &str) -> bool {
        self.send_json(json!({ "type": "auth_required", "ha_version": "test" }))
            .await;
        let Some(auth) = self.recv_json().await else {
            return false;
        };

        if auth["type"] == "auth" && auth["access_token"] == token {
            self.send_json(json!({ "type": "auth_ok", "ha_version": "test" }))
                .await;
            true
        } else {
            self.send_json(json!({ "type": "auth_invalid", "message": "Invalid access token" }))
                .await;
            false
        }
    }

    /// Answer request `id` successfully.
    pub async fn reply(&mut self, id: &Value, result: Value) {
        self.send_json(json!({ "id": id, "type": "result", "success": true, "result": result }))
            .await;
    }

    pub async fn push_event(&mut self, subscription: &Value, event_type: &str, data: Value) {
        self.send_json(json!({
            "id": subscription,
            "type": "event",
            "event": {
                "event_type": event_type,
                "data": data,
                "origin": "LOCAL",
                "time_fired": "2026-02-10T12:00:00+00:00"
            }
        }))
        .await;
    }

    /// Answer pings, acknowledge everything else with a `null` result,
    /// until the client leaves.
    pub async fn serve_acks(mut self) {
        while let Some(frame) = self.recv_json().await {
            if frame["type"] == "ping" {
                self.send_json(json!({ "id": frame["id"], "type": "pong" }))
                    .await;
            } else {
                self.reply(&frame["id"], Value::Null).await;
            }
        }
    }

    /// Read and discard frames until the client leaves.
    pub async fn idle(mut self) {
        while self.recv_json().await.is_some() {}
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}

// ── Client helpers ──────────────────────────────────────────────────

pub fn config(url: &str) -> ClientConfig {
    ClientConfig::new(url, SecretString::from(TOKEN.to_string()))
        .unwrap()
        .with_request_timeout(Duration::from_millis(500))
        .with_handshake_timeout(Duration::from_secs(2))
        .with_reconnect(ReconnectConfig {
            delay: Duration::from_millis(50),
            max_attempts: 3,
            backoff: Backoff::Fixed,
        })
}

pub async fn next_notice(rx: &mut tokio::sync::broadcast::Receiver<StatusNotice>) -> StatusNotice {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a status notice")
        .unwrap()
}
