//! Persistent, authenticated connection to the automation server.
//!
//! A [`Client`] owns one websocket at a time. Concurrent callers multiplex
//! correlated requests over it; pushed events fan out to registered
//! handlers. When the transport drops, a background supervisor fails every
//! outstanding request, forgets all subscriptions and reconnects on its own
//! until it succeeds or the attempt budget runs out.
//!
//! # Example
//!
//! ```rust,ignore
//! use homeward_api::{Client, ClientConfig, Command};
//! use secrecy::SecretString;
//!
//! let config = ClientConfig::new("ws://hub.local:8123", SecretString::from(token))?;
//! let client = Client::new(config);
//! client.connect().await?;
//!
//! let states = client.request(Command::GetStates).await?;
//! client.disconnect().await;
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use secrecy::SecretString;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::error::Error;
use crate::protocol::{self, Command, ServerEvent, SubscriptionId};
use crate::router::{EventHandler, Router};
use crate::session::{self, Session, SessionEnd};
use crate::transport::{ClientConfig, WsStream, calculate_backoff};

const STATUS_CHANNEL_CAPACITY: usize = 32;

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers. Exactly one holds at a time.
#[derive(Debug, Clone, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Connected,
    Reconnecting { attempt: u32 },
    PermanentlyFailed,
}

// ── StatusNotice ─────────────────────────────────────────────────────

/// Why the client gave up for good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    AuthenticationRejected { message: String },
    ReconnectExhausted { attempts: u32 },
}

impl From<FailureReason> for Error {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::AuthenticationRejected { message } => {
                Self::AuthenticationRejected { message }
            }
            FailureReason::ReconnectExhausted { attempts } => Self::ReconnectExhausted { attempts },
        }
    }
}

/// Lifecycle notifications for collaborators that keep their own
/// projection of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusNotice {
    /// Handshake completed; requests and events flow. Subscriptions from
    /// any earlier connection are gone and must be re-established.
    Connected,
    /// The transport dropped or `disconnect()` was called.
    Disconnected { reason: String },
    /// Terminal. Sent exactly once.
    PermanentlyFailed(FailureReason),
}

// ── Client ───────────────────────────────────────────────────────────

/// Handle to the connection core.
///
/// Cheaply cloneable via `Arc<ClientInner>`; every clone talks to the same
/// connection. Call [`disconnect`](Self::disconnect) to tear down the
/// background supervisor.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    state: watch::Sender<ConnectionState>,
    status_tx: broadcast::Sender<StatusNotice>,
    router: Router,
    next_id: AtomicU64,
    /// Writer queue of the live session. `None` whenever not connected.
    writer: ArcSwapOption<mpsc::UnboundedSender<Message>>,
    cancel: CancellationToken,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    connect_lock: Mutex<()>,
}

impl Client {
    /// Build a client. Performs no I/O -- call [`connect`](Self::connect).
    pub fn new(config: ClientConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);

        Self {
            inner: Arc::new(ClientInner {
                config,
                state,
                status_tx,
                router: Router::new(),
                next_id: AtomicU64::new(1),
                writer: ArcSwapOption::empty(),
                cancel: CancellationToken::new(),
                supervisor: Mutex::new(None),
                connect_lock: Mutex::new(()),
            }),
        }
    }

    /// Build a client for `endpoint` with default timings.
    pub fn with_endpoint(endpoint: &str, token: SecretString) -> Result<Self, Error> {
        Ok(Self::new(ClientConfig::new(endpoint, token)?))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Open the transport and authenticate.
    ///
    /// Resolves once the server accepts the token. A rejected token moves
    /// the client to `PermanentlyFailed` and is never retried. Any other
    /// failure is returned *and* handed to the background reconnect loop.
    /// If a reconnect cycle is already running, waits for its outcome.
    pub async fn connect(&self) -> Result<(), Error> {
        let _guard = self.inner.connect_lock.lock().await;

        if self.inner.cancel.is_cancelled() {
            return Err(Error::Disconnected);
        }

        match self.current_state() {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::PermanentlyFailed => return Err(Error::PermanentlyFailed),
            _ => {}
        }

        if self.supervisor_running().await {
            return self.await_outcome().await;
        }

        self.inner.state.send_replace(ConnectionState::Connecting);
        info!(url = %self.inner.config.url, "connecting");

        let established = tokio::select! {
            biased;
            () = self.inner.cancel.cancelled() => return Err(Error::Disconnected),
            result = session::establish(&self.inner.config, &self.inner.state) => result,
        };

        match established {
            Ok(ws) => {
                let session = self.inner.activate(ws);
                self.spawn_supervisor(Some(session)).await;
                Ok(())
            }
            Err(Error::AuthenticationRejected { message }) => {
                error!(%message, "server rejected access token");
                self.inner
                    .fail_permanently(FailureReason::AuthenticationRejected {
                        message: message.clone(),
                    });
                Err(Error::AuthenticationRejected { message })
            }
            Err(e) => {
                log_connect_failure(&e, 0);
                self.inner
                    .state
                    .send_replace(ConnectionState::Reconnecting { attempt: 0 });
                self.spawn_supervisor(None).await;
                Err(e)
            }
        }
    }

    /// Close the transport for good and reject every outstanding request
    /// with [`Error::ConnectionClosed`]. Idempotent.
    pub async fn disconnect(&self) {
        self.inner.cancel.cancel();

        let handle = self.inner.supervisor.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "supervisor task ended abnormally");
            }
        }

        // Covers the paths where no supervisor ever ran.
        self.inner.teardown();

        let changed = self.inner.state.send_if_modified(|state| match state {
            ConnectionState::Disconnected | ConnectionState::PermanentlyFailed => false,
            _ => {
                *state = ConnectionState::Disconnected;
                true
            }
        });
        if changed {
            self.inner.notify(StatusNotice::Disconnected {
                reason: "disconnect requested".into(),
            });
            info!("disconnected");
        }
    }

    // ── Requests ─────────────────────────────────────────────────

    /// Send a correlated request and wait for its response.
    ///
    /// Resolves with the server's `result` payload, [`Error::Server`] for a
    /// server-reported failure, [`Error::RequestTimeout`] once the request
    /// deadline passes, or [`Error::ConnectionClosed`] if the transport is
    /// or goes down first. Safe to call from many tasks at once.
    pub async fn request(&self, command: Command) -> Result<Value, Error> {
        let id = self.next_id();
        self.roundtrip(id, &command).await
    }

    /// Send a subscribe request and start routing its events.
    ///
    /// The handle is routed *before* the request is written, so events
    /// pushed right after the acknowledgement are never lost. The routing
    /// is rolled back if the request fails.
    pub async fn subscribe(&self, command: Command) -> Result<SubscriptionId, Error> {
        let id = self.next_id();
        self.inner.router.add_subscription(id);

        match self.roundtrip(id, &command).await {
            Ok(_) => {
                debug!(subscription = id, "subscription active");
                Ok(SubscriptionId(id))
            }
            Err(e) => {
                self.inner.router.remove_subscription(id);
                Err(e)
            }
        }
    }

    /// Stop routing events for `subscription`. Returns `true` if it was live.
    pub fn release_subscription(&self, subscription: SubscriptionId) -> bool {
        self.inner.router.remove_subscription(subscription.0)
    }

    /// Whether events for `subscription` are still being routed. Always
    /// `false` after a reconnect.
    pub fn is_subscription_active(&self, subscription: SubscriptionId) -> bool {
        self.inner.router.has_subscription(subscription.0)
    }

    /// Round-trip a `ping` and report the latency.
    pub async fn ping(&self) -> Result<Duration, Error> {
        let started = Instant::now();
        self.request(Command::Ping).await?;
        Ok(started.elapsed())
    }

    fn next_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn roundtrip(&self, id: u64, command: &Command) -> Result<Value, Error> {
        let Some(writer) = self.inner.writer.load_full() else {
            return Err(Error::ConnectionClosed);
        };

        let frame = protocol::encode(id, command)?;
        let kind = command.kind();
        let response = self.inner.router.register(id, kind);
        let _pending = PendingGuard {
            router: &self.inner.router,
            id,
        };

        if writer.send(Message::text(frame)).is_err() {
            return Err(Error::ConnectionClosed);
        }
        trace!(id, kind, "request queued");

        let timeout = self.inner.config.request_timeout;
        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::ConnectionClosed),
            Err(_) => {
                debug!(id, kind, "request timed out");
                Err(Error::RequestTimeout {
                    id,
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    // ── Events & status ──────────────────────────────────────────

    /// Register a handler for routed events.
    ///
    /// Runs on the read loop: one event at a time, in arrival order. Must
    /// not block -- hand heavy work off to another task.
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let handler: EventHandler = Arc::new(handler);
        self.inner.router.add_handler(handler);
    }

    /// Stream view of routed events. A receiver that falls more than 1024
    /// events behind gets [`broadcast::error::RecvError::Lagged`].
    pub fn events(&self) -> broadcast::Receiver<Arc<ServerEvent>> {
        self.inner.router.subscribe_events()
    }

    /// Lifecycle notifications (connected / disconnected / permanently failed).
    pub fn status(&self) -> broadcast::Receiver<StatusNotice> {
        self.inner.status_tx.subscribe()
    }

    /// Subscribe to connection state changes.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.state.borrow() == ConnectionState::Connected
    }

    /// Requests currently awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.router.pending_len()
    }

    /// Events dropped because no live subscription matched them.
    pub fn unrouted_events(&self) -> u64 {
        self.inner.router.unrouted_events()
    }

    // ── Supervisor plumbing ──────────────────────────────────────

    async fn supervisor_running(&self) -> bool {
        self.inner
            .supervisor
            .lock()
            .await
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    async fn spawn_supervisor(&self, session: Option<Session>) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(supervise(inner, session));
        *self.inner.supervisor.lock().await = Some(handle);
    }

    /// Wait for a running reconnect cycle to either connect or give up.
    async fn await_outcome(&self) -> Result<(), Error> {
        let mut state = self.state();
        let settled = state
            .wait_for(|s| {
                matches!(
                    s,
                    ConnectionState::Connected
                        | ConnectionState::PermanentlyFailed
                        | ConnectionState::Disconnected
                )
            })
            .await
            .map(|s| s.clone())
            .map_err(|_| Error::Disconnected)?;

        match settled {
            ConnectionState::Connected => Ok(()),
            ConnectionState::PermanentlyFailed => Err(Error::PermanentlyFailed),
            _ => Err(Error::Disconnected),
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("url", &self.inner.config.url.as_str())
            .field("state", &*self.inner.state.borrow())
            .field("pending", &self.inner.router.pending_len())
            .finish_non_exhaustive()
    }
}

/// Removes a pending entry when the waiting caller finishes or is dropped.
struct PendingGuard<'a> {
    router: &'a Router,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.router.forget(self.id);
    }
}

// ── ClientInner ──────────────────────────────────────────────────────

impl ClientInner {
    /// Publish a fresh writer queue and mark the client connected.
    fn activate(&self, ws: WsStream) -> Session {
        let (tx, rx) = mpsc::unbounded_channel();
        self.writer.store(Some(Arc::new(tx)));
        self.state.send_replace(ConnectionState::Connected);
        self.notify(StatusNotice::Connected);
        info!(url = %self.config.url, "connected");
        Session::new(ws, rx)
    }

    /// Drop everything tied to the current transport.
    ///
    /// The writer is unpublished before pending requests are drained; a
    /// request that still manages to queue a frame afterwards finds the
    /// session's receiver gone and fails on its own.
    fn teardown(&self) {
        self.writer.store(None);
        let failed = self.router.fail_all(&Error::ConnectionClosed);
        if failed > 0 {
            debug!(failed, "rejected outstanding requests");
        }
        self.router.clear_subscriptions();
    }

    fn fail_permanently(&self, reason: FailureReason) {
        self.teardown();
        let changed = self.state.send_if_modified(|state| {
            if *state == ConnectionState::PermanentlyFailed {
                false
            } else {
                *state = ConnectionState::PermanentlyFailed;
                true
            }
        });
        if changed {
            self.notify(StatusNotice::PermanentlyFailed(reason));
        }
    }

    fn notify(&self, notice: StatusNotice) {
        // No subscribers is fine.
        let _ = self.status_tx.send(notice);
    }
}

// ── Background supervisor ────────────────────────────────────────────

/// Main loop: run session → on loss, wait → reconnect, until cancelled,
/// rejected, or out of attempts.
async fn supervise(inner: Arc<ClientInner>, mut session: Option<Session>) {
    let mut attempt: u32 = 0;

    loop {
        if let Some(active) = session.take() {
            attempt = 0;
            let end = active.run(&inner.router, &inner.cancel).await;

            match end {
                SessionEnd::Cancelled => {
                    inner.teardown();
                    break;
                }
                SessionEnd::Closed { reason } => {
                    warn!(%reason, "connection lost");
                    // Leave `Connected` before callers see their requests fail.
                    inner
                        .state
                        .send_replace(ConnectionState::Reconnecting { attempt });
                    inner.teardown();
                    inner.notify(StatusNotice::Disconnected { reason });
                }
            }
        }

        if inner.cancel.is_cancelled() {
            break;
        }

        let max_attempts = inner.config.reconnect.max_attempts;
        if attempt >= max_attempts {
            error!(max_attempts, "reconnect attempts exhausted, giving up");
            inner.fail_permanently(FailureReason::ReconnectExhausted { attempts: attempt });
            break;
        }

        let delay = calculate_backoff(attempt, &inner.config.reconnect);
        attempt += 1;
        inner
            .state
            .send_replace(ConnectionState::Reconnecting { attempt });
        info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt, "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        let established = tokio::select! {
            biased;
            () = inner.cancel.cancelled() => break,
            result = session::establish(&inner.config, &inner.state) => result,
        };

        match established {
            Ok(ws) => session = Some(inner.activate(ws)),
            Err(Error::AuthenticationRejected { message }) => {
                error!(%message, "server rejected access token on reconnect");
                inner.fail_permanently(FailureReason::AuthenticationRejected { message });
                break;
            }
            Err(e) => {
                log_connect_failure(&e, attempt);
                // Leave `Authenticating` if the handshake got that far.
                inner
                    .state
                    .send_replace(ConnectionState::Reconnecting { attempt });
            }
        }
    }

    debug!("supervisor exiting");
}

fn log_connect_failure(err: &Error, attempt: u32) {
    if let Error::ProtocolViolation { detail } = err {
        warn!(protocol_violation = %detail, attempt, "connect attempt failed");
    } else {
        warn!(error = %err, attempt, "connect attempt failed");
    }
}
