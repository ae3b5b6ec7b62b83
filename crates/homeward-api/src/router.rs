// ── Inbound routing ──
//
// The pending-request table, the live subscription set, and the event
// fan-out. Callers register; the single read loop resolves and dispatches.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};

use crate::error::Error;
use crate::protocol::{ServerEvent, ServerFrame, SubscriptionId};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Callback invoked by the read loop for every routed event.
pub type EventHandler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

type Outcome = Result<Value, Error>;

struct PendingRequest {
    kind: &'static str,
    tx: oneshot::Sender<Outcome>,
}

pub(crate) struct Router {
    pending: DashMap<u64, PendingRequest>,
    subscriptions: DashSet<u64>,
    handlers: ArcSwap<Vec<EventHandler>>,
    event_tx: broadcast::Sender<Arc<ServerEvent>>,
    unrouted_events: AtomicU64,
}

impl Router {
    pub(crate) fn new() -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pending: DashMap::new(),
            subscriptions: DashSet::new(),
            handlers: ArcSwap::from_pointee(Vec::new()),
            event_tx,
            unrouted_events: AtomicU64::new(0),
        }
    }

    // ── Pending requests ─────────────────────────────────────────

    /// Track a request. The receiver resolves exactly once.
    pub(crate) fn register(&self, id: u64, kind: &'static str) -> oneshot::Receiver<Outcome> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, PendingRequest { kind, tx });
        rx
    }

    /// Drop a pending entry without resolving it. Returns `true` if it
    /// was still outstanding.
    pub(crate) fn forget(&self, id: u64) -> bool {
        self.pending.remove(&id).is_some()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn resolve(&self, id: u64, outcome: Outcome) {
        let Some((_, request)) = self.pending.remove(&id) else {
            tracing::debug!(id, "response for unknown request (timed out or cancelled)");
            return;
        };
        tracing::trace!(id, kind = request.kind, ok = outcome.is_ok(), "request resolved");
        // Receiver gone means the caller stopped waiting.
        let _ = request.tx.send(outcome);
    }

    /// Reject every outstanding request with `err`. Returns how many were failed.
    pub(crate) fn fail_all(&self, err: &Error) -> usize {
        let ids: Vec<u64> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for id in ids {
            if let Some((_, request)) = self.pending.remove(&id) {
                let _ = request.tx.send(Err(err.clone()));
                failed += 1;
            }
        }
        failed
    }

    // ── Subscriptions ────────────────────────────────────────────

    pub(crate) fn add_subscription(&self, id: u64) {
        self.subscriptions.insert(id);
    }

    pub(crate) fn remove_subscription(&self, id: u64) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    pub(crate) fn has_subscription(&self, id: u64) -> bool {
        self.subscriptions.contains(&id)
    }

    pub(crate) fn clear_subscriptions(&self) {
        self.subscriptions.clear();
    }

    // ── Event fan-out ────────────────────────────────────────────

    pub(crate) fn add_handler(&self, handler: EventHandler) {
        self.handlers.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(Arc::clone(&handler));
            next
        });
    }

    pub(crate) fn subscribe_events(&self) -> broadcast::Receiver<Arc<ServerEvent>> {
        self.event_tx.subscribe()
    }

    pub(crate) fn unrouted_events(&self) -> u64 {
        self.unrouted_events.load(Ordering::Relaxed)
    }

    fn dispatch(&self, event: ServerEvent) {
        let handlers = self.handlers.load();
        for handler in handlers.iter() {
            // A panicking handler must not take the read loop down with it.
            if panic::catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                tracing::error!(
                    subscription = %event.subscription,
                    event_type = %event.event_type,
                    "event handler panicked"
                );
            }
        }

        // No receivers is fine; lagging receivers observe `Lagged(n)`.
        let _ = self.event_tx.send(Arc::new(event));
    }

    // ── Frame routing ────────────────────────────────────────────

    /// Route one decoded frame from an established session.
    ///
    /// Handshake frames are not valid here and are reported as a protocol
    /// violation so the caller can recycle the connection.
    pub(crate) fn route(&self, frame: ServerFrame) -> Result<(), Error> {
        match frame {
            ServerFrame::Result {
                id,
                success: true,
                result,
                ..
            } => self.resolve(id, Ok(result)),
            ServerFrame::Result {
                id,
                success: false,
                error,
                ..
            } => {
                let (code, message) = error
                    .map(|e| (e.code, e.message))
                    .unwrap_or_else(|| ("unknown_error".into(), "request failed".into()));
                self.resolve(id, Err(Error::Server { code, message }));
            }
            ServerFrame::Pong { id } => self.resolve(id, Ok(Value::Null)),
            ServerFrame::Event { id, event } => {
                if self.has_subscription(id) {
                    self.dispatch(ServerEvent::from_raw(SubscriptionId(id), event));
                } else {
                    self.unrouted_events.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(
                        id,
                        event_type = %event.event_type,
                        "dropping event for inactive subscription"
                    );
                }
            }
            ServerFrame::Unknown => tracing::debug!("ignoring unknown frame type"),
            other @ (ServerFrame::AuthRequired { .. }
            | ServerFrame::AuthOk { .. }
            | ServerFrame::AuthInvalid { .. }) => {
                return Err(Error::ProtocolViolation {
                    detail: format!("unexpected {} after authentication", other.kind()),
                });
            }
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::protocol::decode;

    fn route_text(router: &Router, text: &str) -> Result<(), Error> {
        for frame in decode(text)? {
            router.route(frame)?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn resolves_by_id_regardless_of_order() {
        let router = Router::new();
        let rx1 = router.register(1, "get_states");
        let rx2 = router.register(2, "ping");

        route_text(&router, r#"{"id":2,"type":"pong"}"#).unwrap();
        route_text(&router, r#"{"id":1,"type":"result","success":true,"result":[1,2]}"#).unwrap();

        assert_eq!(rx1.await.unwrap().unwrap(), serde_json::json!([1, 2]));
        assert_eq!(rx2.await.unwrap().unwrap(), Value::Null);
        assert_eq!(router.pending_len(), 0);
    }

    #[tokio::test]
    async fn failed_result_carries_server_error() {
        let router = Router::new();
        let rx = router.register(5, "call_service");

        route_text(
            &router,
            r#"{"id":5,"type":"result","success":false,"error":{"code":"not_found","message":"Unknown entity"}}"#,
        )
        .unwrap();

        let err = rx.await.unwrap().unwrap_err();
        assert!(
            matches!(err, Error::Server { ref code, ref message } if code == "not_found" && message == "Unknown entity")
        );
    }

    #[tokio::test]
    async fn fail_all_rejects_every_pending_request() {
        let router = Router::new();
        let receivers: Vec<_> = (1..=3).map(|id| router.register(id, "get_states")).collect();

        assert_eq!(router.fail_all(&Error::ConnectionClosed), 3);
        assert_eq!(router.pending_len(), 0);

        for rx in receivers {
            assert!(matches!(rx.await.unwrap(), Err(Error::ConnectionClosed)));
        }
    }

    #[test]
    fn late_response_is_ignored() {
        let router = Router::new();
        let _rx = router.register(1, "get_states");
        assert!(router.forget(1));
        route_text(&router, r#"{"id":1,"type":"result","success":true,"result":null}"#).unwrap();
        assert_eq!(router.pending_len(), 0);
    }

    #[test]
    fn events_route_only_to_live_subscriptions() {
        let router = Router::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        router.add_handler(Arc::new(move |event: &ServerEvent| {
            sink.lock().unwrap().push(event.subscription.as_u64());
        }));

        router.add_subscription(7);
        let event = r#"{"id":ID,"type":"event","event":{"event_type":"state_changed","data":{}}}"#;
        route_text(&router, &event.replace("ID", "7")).unwrap();
        route_text(&router, &event.replace("ID", "8")).unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![7]);
        assert_eq!(router.unrouted_events(), 1);

        router.remove_subscription(7);
        route_text(&router, &event.replace("ID", "7")).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(router.unrouted_events(), 2);
    }

    #[test]
    fn events_reach_broadcast_receivers_in_order() {
        let router = Router::new();
        let mut rx = router.subscribe_events();
        router.add_subscription(1);

        for kind in ["first", "second", "third"] {
            let text = format!(
                r#"{{"id":1,"type":"event","event":{{"event_type":"{kind}","data":{{}}}}}}"#
            );
            route_text(&router, &text).unwrap();
        }

        let received: Vec<String> = (0..3)
            .map(|_| rx.try_recv().unwrap().event_type.clone())
            .collect();
        assert_eq!(received, ["first", "second", "third"]);
    }

    fn exploding_handler(_: &ServerEvent) {
        panic!("boom");
    }

    #[test]
    fn panicking_handler_does_not_stop_dispatch() {
        let router = Router::new();
        let calls = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&calls);

        router.add_handler(Arc::new(exploding_handler));
        router.add_handler(Arc::new(move |_: &ServerEvent| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        router.add_subscription(1);

        route_text(
            &router,
            r#"{"id":1,"type":"event","event":{"event_type":"state_changed","data":{}}}"#,
        )
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handshake_frame_mid_session_is_protocol_violation() {
        let router = Router::new();
        let err = route_text(&router, r#"{"type":"auth_required"}"#).unwrap_err();
        assert!(matches!(err, Error::ProtocolViolation { .. }));
    }
}
