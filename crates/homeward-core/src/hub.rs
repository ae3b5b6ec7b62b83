// ── Hub facade ──
//
// Typed, single-purpose operations over the connection core's generic
// request primitive. Owns no connection logic of its own: lifecycle,
// correlation and reconnection all live in `homeward_api::Client`.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, info, warn};

use homeward_api::models::STATE_CHANGED;
use homeward_api::{
    Client, Command, ConnectionState, ServerEvent, ServiceTarget, StatusNotice, SubscriptionId,
};

use crate::config::HubConfig;
use crate::convert;
use crate::error::CoreError;
use crate::model::{ActionRequest, DeviceState, EntityId, StateChangeEvent};

const CHANGE_CHANNEL_SIZE: usize = 1024;

/// Callback for decoded state changes.
pub type StateChangeHandler = Arc<dyn Fn(&StateChangeEvent) + Send + Sync>;

// ── Hub ─────────────────────────────────────────────────────────────

/// Typed handle to one hub connection.
///
/// Cheaply cloneable; every clone shares the same [`Client`], cached
/// state-change subscription and handler list.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    client: Client,
    /// Handle of the `state_changed` subscription, if one was created.
    /// The lock also serializes subscribe/unsubscribe wire requests.
    state_subscription: Mutex<Option<SubscriptionId>>,
    changes: Arc<ChangeDispatch>,
}

/// Fan-out for decoded state changes. Shared with the closure registered
/// on the client, so it must not hold the client itself.
struct ChangeDispatch {
    handlers: ArcSwap<Vec<StateChangeHandler>>,
    tx: broadcast::Sender<Arc<StateChangeEvent>>,
}

impl ChangeDispatch {
    fn handle(&self, event: &ServerEvent) {
        match StateChangeEvent::from_server_event(event) {
            Ok(Some(change)) => {
                for handler in self.handlers.load().iter() {
                    handler(&change);
                }
                // No stream consumers is fine.
                let _ = self.tx.send(Arc::new(change));
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, subscription = %event.subscription, "undecodable state change"),
        }
    }
}

impl Hub {
    /// Build a hub from runtime config. Performs no I/O.
    pub fn new(config: &HubConfig) -> Result<Self, CoreError> {
        Ok(Self::from_client(Client::new(config.to_client_config()?)))
    }

    /// Wrap an existing client. The hub registers one event handler on it.
    pub fn from_client(client: Client) -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CHANNEL_SIZE);
        let changes = Arc::new(ChangeDispatch {
            handlers: ArcSwap::from_pointee(Vec::new()),
            tx,
        });

        let dispatch = Arc::clone(&changes);
        client.on_event(move |event| dispatch.handle(event));

        Self {
            inner: Arc::new(HubInner {
                client,
                state_subscription: Mutex::new(None),
                changes,
            }),
        }
    }

    /// One-shot: connect, run closure, disconnect.
    ///
    /// For single CLI invocations that need one request/response cycle.
    pub async fn oneshot<F, Fut, T>(config: &HubConfig, f: F) -> Result<T, CoreError>
    where
        F: FnOnce(Hub) -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut cfg = config.clone();
        // A CLI call should fail fast rather than sit in the reconnect loop.
        cfg.max_reconnect_attempts = 0;

        let hub = Hub::new(&cfg)?;
        hub.connect().await?;
        let result = f(hub.clone()).await;
        hub.disconnect().await;
        result
    }

    // ── Lifecycle ────────────────────────────────────────────────

    pub async fn connect(&self) -> Result<(), CoreError> {
        self.inner.client.connect().await?;
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.inner.client.disconnect().await;
        *self.inner.state_subscription.lock().await = None;
    }

    pub fn is_connected(&self) -> bool {
        self.inner.client.is_connected()
    }

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.client.state()
    }

    pub fn current_state(&self) -> ConnectionState {
        self.inner.client.current_state()
    }

    /// Connected / disconnected / permanently-failed notifications.
    ///
    /// After every `Connected` the state-change subscription is gone;
    /// call [`subscribe_to_state_changes`](Self::subscribe_to_state_changes)
    /// again to resume the event stream.
    pub fn status(&self) -> broadcast::Receiver<StatusNotice> {
        self.inner.client.status()
    }

    /// The underlying connection core, for requests the facade does not cover.
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    /// Round-trip latency to the hub.
    pub async fn ping(&self) -> Result<std::time::Duration, CoreError> {
        Ok(self.inner.client.ping().await?)
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Snapshot of every entity the hub knows. An empty list is valid.
    pub async fn list_states(&self) -> Result<Vec<DeviceState>, CoreError> {
        let result = self.inner.client.request(Command::GetStates).await?;
        let states = convert::device_states(result)?;
        debug!(count = states.len(), "fetched states");
        Ok(states)
    }

    // ── Actions ──────────────────────────────────────────────────

    /// Invoke an action. Success means the hub acknowledged the request;
    /// the resulting state change arrives separately on the event stream.
    pub async fn invoke_action(&self, request: &ActionRequest) -> Result<(), CoreError> {
        request.validate()?;

        let command = Command::CallService {
            domain: request.category.clone(),
            service: request.action.clone(),
            target: request.target.as_ref().map(|id| ServiceTarget {
                entity_id: id.to_string(),
            }),
            service_data: request.parameters.clone(),
        };
        self.inner.client.request(command).await?;

        info!(
            category = %request.category,
            action = %request.action,
            entity_id = request.target.as_ref().map(EntityId::as_str),
            "action acknowledged"
        );
        Ok(())
    }

    /// Invoke `<category>.<action>` on one entity.
    pub async fn invoke(
        &self,
        category: &str,
        action: &str,
        target: &EntityId,
        parameters: Option<serde_json::Value>,
    ) -> Result<(), CoreError> {
        let mut request = ActionRequest::new(category, action).target(target.clone());
        request.parameters = parameters;
        self.invoke_action(&request).await
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Start receiving `state_changed` events.
    ///
    /// Idempotent: while the cached subscription is still routed, returns it
    /// without a wire request. A subscription lost to a reconnect is
    /// replaced by a fresh one.
    pub async fn subscribe_to_state_changes(&self) -> Result<SubscriptionId, CoreError> {
        let mut cached = self.inner.state_subscription.lock().await;

        if let Some(id) = *cached {
            if self.inner.client.is_subscription_active(id) {
                return Ok(id);
            }
            debug!(subscription = %id, "state subscription lost, renewing");
        }

        let id = self
            .inner
            .client
            .subscribe(Command::SubscribeEvents {
                event_type: Some(STATE_CHANGED.into()),
            })
            .await?;
        *cached = Some(id);
        info!(subscription = %id, "subscribed to state changes");
        Ok(id)
    }

    /// Cancel a subscription. Once the hub confirms, no further events are
    /// routed for `subscription`.
    pub async fn unsubscribe(&self, subscription: SubscriptionId) -> Result<(), CoreError> {
        let mut cached = self.inner.state_subscription.lock().await;

        self.inner
            .client
            .request(Command::UnsubscribeEvents { subscription })
            .await?;
        self.inner.client.release_subscription(subscription);

        if *cached == Some(subscription) {
            *cached = None;
        }
        debug!(%subscription, "unsubscribed");
        Ok(())
    }

    // ── Event delivery ───────────────────────────────────────────

    /// Register a handler for decoded state changes.
    ///
    /// Runs on the connection's read loop, once per event, in arrival
    /// order. Must not block.
    pub fn on_state_change<F>(&self, handler: F)
    where
        F: Fn(&StateChangeEvent) + Send + Sync + 'static,
    {
        let handler: StateChangeHandler = Arc::new(handler);
        self.inner.changes.handlers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&handler));
            next
        });
    }

    /// Async stream of decoded state changes. A consumer that falls too far
    /// behind skips the events it missed.
    pub fn state_changes(&self) -> impl Stream<Item = Arc<StateChangeEvent>> + Send + 'static {
        BroadcastStream::new(self.inner.changes.tx.subscribe()).filter_map(|item| match item {
            Ok(change) => Some(change),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "state change stream lagged");
                None
            }
        })
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("client", &self.inner.client)
            .finish_non_exhaustive()
    }
}
