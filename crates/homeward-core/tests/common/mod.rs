// Minimal in-process hub for facade tests: authenticates with `tok`, then
// hands each connection to the test's script.
#![allow(dead_code, clippy::unwrap_used)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

use homeward_core::HubConfig;

pub const TOKEN: &str = "tok";

pub struct FakeHub {
    pub url: String,
    task: JoinHandle<()>,
}

impl FakeHub {
    /// Run `script(index, conn)` for every authenticated connection.
    pub async fn start<F, Fut>(script: F) -> Self
    where
        F: Fn(usize, Conn) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let script = Arc::new(script);

        let task = tokio::spawn(async move {
            let mut index = 0;
            while let Ok((tcp, _)) = listener.accept().await {
                let script = Arc::clone(&script);
                let this = index;
                index += 1;
                tokio::spawn(async move {
                    let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                    let mut conn = Conn { ws };
                    if conn.handshake().await {
                        script(this, conn).await;
                    }
                });
            }
        });

        Self {
            url: format!("ws://{addr}"),
            task,
        }
    }

    pub fn config(&self) -> HubConfig {
        let mut cfg = HubConfig::new(
            self.url.parse().unwrap(),
            SecretString::from(TOKEN.to_string()),
        );
        cfg.request_timeout = Duration::from_secs(2);
        cfg.handshake_timeout = Duration::from_secs(2);
        cfg.reconnect_delay = Duration::from_millis(50);
        cfg.max_reconnect_attempts = 3;
        cfg
    }
}

impl Drop for FakeHub {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct Conn {
    ws: WebSocketStream<TcpStream>,
}

impl Conn {
    async fn handshake(&mut self) -> bool {
        self.send(json!({ "type": "auth_required", "ha_version": "2026.2.0" }))
            .await;
        let Some(auth) = self.recv().await else {
            return false;
        };
        if auth["access_token"] == TOKEN {
            self.send(json!({ "type": "auth_ok", "ha_version": "2026.2.0" }))
                .await;
            true
        } else {
            self.send(json!({ "type": "auth_invalid", "message": "Invalid access token" }))
                .await;
            false
        }
    }

    pub async fn send(&mut self, value: Value) {
        let _ = self.ws.send(Message::text(value.to_string())).await;
    }

    pub async fn recv(&mut self) -> Option<Value> {
        loop {
            match self.ws.next().await? {
                Ok(Message::Text(text)) => return serde_json::from_str(text.as_str()).ok(),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    pub async fn ack(&mut self, request: &Value, result: Value) {
        self.send(json!({ "id": request["id"], "type": "result", "success": true, "result": result }))
            .await;
    }

    pub async fn state_changed(&mut self, subscription: &Value, entity: &str, old: &str, new: &str) {
        self.send(json!({
            "id": subscription,
            "type": "event",
            "event": {
                "event_type": "state_changed",
                "data": {
                    "entity_id": entity,
                    "old_state": { "entity_id": entity, "state": old, "attributes": {} },
                    "new_state": { "entity_id": entity, "state": new,
                                   "attributes": { "friendly_name": "Kitchen" } }
                },
                "origin": "LOCAL",
                "time_fired": "2026-02-10T12:00:00+00:00"
            }
        }))
        .await;
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
