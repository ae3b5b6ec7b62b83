// ── Single connection lifecycle ──
//
// `establish` dials and authenticates; `Session::run` owns the socket
// afterwards, serializing writes from the outbound queue and feeding every
// inbound frame to the router in arrival order.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::ConnectionState;
use crate::error::Error;
use crate::protocol::{self, ServerFrame};
use crate::router::Router;
use crate::transport::{self, ClientConfig, WsStream};

/// Why a session stopped.
#[derive(Debug)]
pub(crate) enum SessionEnd {
    /// `disconnect()` was called.
    Cancelled,
    /// The transport dropped or the server misbehaved.
    Closed { reason: String },
}

// ── Handshake ────────────────────────────────────────────────────────

/// Dial the endpoint and run the challenge/credential exchange.
///
/// Publishes `Authenticating` once the challenge arrives. The whole
/// exchange is bounded by `handshake_timeout`.
pub(crate) async fn establish(
    config: &ClientConfig,
    state: &watch::Sender<ConnectionState>,
) -> Result<WsStream, Error> {
    let handshake = async {
        let mut ws = transport::open(&config.url).await?;

        match next_frame(&mut ws).await? {
            ServerFrame::AuthRequired { server_version } => {
                tracing::debug!(?server_version, "received auth challenge");
            }
            other => {
                return Err(Error::ProtocolViolation {
                    detail: format!("expected auth_required, got {}", other.kind()),
                });
            }
        }

        state.send_replace(ConnectionState::Authenticating);
        ws.send(Message::text(protocol::encode_auth(&config.token)?))
            .await?;

        match next_frame(&mut ws).await? {
            ServerFrame::AuthOk { server_version } => {
                tracing::info!(url = %config.url, ?server_version, "authenticated");
                Ok(ws)
            }
            ServerFrame::AuthInvalid { message } => Err(Error::AuthenticationRejected {
                message: message.unwrap_or_else(|| "invalid access token".into()),
            }),
            other => Err(Error::ProtocolViolation {
                detail: format!("expected auth_ok or auth_invalid, got {}", other.kind()),
            }),
        }
    };

    tokio::time::timeout(config.handshake_timeout, handshake)
        .await
        .map_err(|_| Error::HandshakeTimeout {
            timeout_secs: config.handshake_timeout.as_secs(),
        })?
}

/// Read the next protocol frame during the handshake.
async fn next_frame(ws: &mut WsStream) -> Result<ServerFrame, Error> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let mut frames = protocol::decode(text.as_str())?.into_iter();
                return match (frames.next(), frames.next()) {
                    (Some(frame), None) => Ok(frame),
                    _ => Err(Error::ProtocolViolation {
                        detail: "expected exactly one handshake frame".into(),
                    }),
                };
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(Error::WebSocket("connection closed during handshake".into()));
            }
            Some(Ok(_)) => {
                // Ping, Pong, Binary -- not part of the handshake
            }
            Some(Err(e)) => return Err(e.into()),
        }
    }
}

// ── Session ──────────────────────────────────────────────────────────

/// An authenticated connection plus the queue its writers feed.
pub(crate) struct Session {
    ws: WsStream,
    outbound: mpsc::UnboundedReceiver<Message>,
}

impl Session {
    pub(crate) fn new(ws: WsStream, outbound: mpsc::UnboundedReceiver<Message>) -> Self {
        Self { ws, outbound }
    }

    /// Pump the connection until it drops or `cancel` fires.
    ///
    /// Consumes the session: the outbound receiver is dropped on return,
    /// so writers still holding the sender observe a closed queue.
    pub(crate) async fn run(self, router: &Router, cancel: &CancellationToken) -> SessionEnd {
        let Self { ws, mut outbound } = self;
        let (mut sink, mut stream) = ws.split();

        loop {
            // Unbiased: neither a burst of writes nor a burst of events may
            // starve the other direction.
            tokio::select! {
                () = cancel.cancelled() => {
                    if let Err(e) = sink.send(Message::Close(None)).await {
                        tracing::debug!(error = %e, "close frame not delivered");
                    }
                    return SessionEnd::Cancelled;
                }
                Some(message) = outbound.recv() => {
                    if let Err(e) = sink.send(message).await {
                        tracing::warn!(error = %e, "websocket write failed");
                        return SessionEnd::Closed { reason: e.to_string() };
                    }
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = route_text(router, text.as_str()) {
                                tracing::warn!(protocol_violation = %e, "closing session");
                                return SessionEnd::Closed { reason: e.to_string() };
                            }
                        }
                        Some(Ok(Message::Ping(_))) => {
                            // tungstenite queues the pong reply automatically
                            tracing::trace!("websocket ping");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame.map_or_else(
                                || "close frame (no payload)".to_string(),
                                |cf| format!("close frame {}: {}", cf.code, cf.reason),
                            );
                            tracing::info!(%reason, "server closed websocket");
                            return SessionEnd::Closed { reason };
                        }
                        Some(Ok(_)) => {
                            // Binary, Pong, Frame -- ignore
                        }
                        Some(Err(e)) => {
                            tracing::warn!(error = %e, "websocket read failed");
                            return SessionEnd::Closed { reason: e.to_string() };
                        }
                        None => {
                            tracing::info!("websocket stream ended");
                            return SessionEnd::Closed { reason: "stream ended".into() };
                        }
                    }
                }
            }
        }
    }
}

fn route_text(router: &Router, text: &str) -> Result<(), Error> {
    for frame in protocol::decode(text)? {
        router.route(frame)?;
    }
    Ok(())
}
