//! TransportConnector - the single live connection for a process.
//!
//! The connector owns one [`Transport`] and interprets the actions of the
//! pure [`ConnectionState`] machine from chat-core:
//!
//! ```text
//! Application → TransportConnector → Transport → Network
//!                      ↓
//!              chat-core (pure state machine)
//! ```
//!
//! Once connected, a background session task reads frames in receive order,
//! decodes them and fans each event out to the handlers subscribed to its
//! kind, in registration order. When the connection drops the same task
//! retries per [`ReconnectPolicy`]. Nothing is replayed after a reconnect.
//!
//! Errors never escape to callers: `publish` while disconnected logs and
//! drops, malformed frames are logged and dropped, and exhausted retries
//! leave the connector in the failed state, which reads as "not connected".

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use chat_core::{Action, ConnectionEvent, ConnectionState, Event, ReconnectPolicy};
use chat_types::{EventKind, InboundEvent, OutboundEvent, UserId};
use reqwest::Url;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::lock;
use crate::transport::{Transport, TransportError};

/// Callback invoked for each inbound event of a subscribed kind.
pub type Handler = Arc<dyn Fn(&InboundEvent) + Send + Sync>;

struct Registration {
    id: u64,
    kind: EventKind,
    handler: Handler,
}

type Registry = Mutex<Vec<Registration>>;

/// Connection state plus a generation counter.
///
/// Every caller-initiated transition bumps the generation, so a session task
/// that lost a race with `connect`/`disconnect` cannot apply stale events.
struct Session {
    state: ConnectionState,
    generation: u64,
}

struct Inner<T> {
    transport: T,
    socket_url: String,
    policy: ReconnectPolicy,
    session: Mutex<Session>,
    registry: Arc<Registry>,
    next_handler_id: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<ConnectionEvent>,
}

/// The process-wide live connection.
///
/// Cloning is cheap and yields another handle to the same connection.
pub struct TransportConnector<T: Transport + 'static> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport + 'static> Clone for TransportConnector<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> TransportConnector<T> {
    /// Create a connector for `socket_url`. Nothing is connected yet.
    pub fn new(transport: T, socket_url: impl Into<String>, policy: ReconnectPolicy) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            inner: Arc::new(Inner {
                transport,
                socket_url: socket_url.into(),
                policy,
                session: Mutex::new(Session {
                    state: ConnectionState::new(),
                    generation: 0,
                }),
                registry: Arc::new(Mutex::new(Vec::new())),
                next_handler_id: AtomicU64::new(1),
                task: Mutex::new(None),
                events,
            }),
        }
    }

    /// Connect bound to `identity`.
    ///
    /// A no-op if already connected (or connecting) for the same identity.
    /// A different identity tears the current connection down first. Returns
    /// once the first attempt has finished; on failure, retries continue in
    /// the background.
    pub async fn connect(&self, identity: UserId) {
        let (generation, actions) = self.inner.request(Event::ConnectRequested { identity });
        if actions.is_empty() {
            debug!("connect ignored, already bound to this identity");
            return;
        }
        self.inner.abort_task();

        let mut queue: VecDeque<Action> = actions.into();
        while let Some(action) = queue.pop_front() {
            if matches!(action, Action::StartReconnectTimer { .. }) {
                queue.push_front(action);
                break;
            }
            queue.extend(self.inner.step(generation, action).await);
        }

        if !queue.is_empty() || self.inner.state().is_connected() {
            let inner = Arc::clone(&self.inner);
            let handle = tokio::spawn(async move { inner.run(generation, queue).await });
            *lock(&self.inner.task) = Some(handle);
        }
    }

    /// Tear down the connection. Safe to call when not connected.
    pub async fn disconnect(&self) {
        let (generation, actions) = self.inner.request(Event::DisconnectRequested);
        self.inner.abort_task();
        for action in actions {
            self.inner.step(generation, action).await;
        }
    }

    /// Publish an event to the server.
    ///
    /// Fire-and-forget: when not connected, or when the transport rejects
    /// the frame, the event is logged and dropped. Nothing is queued.
    pub async fn publish(&self, event: OutboundEvent) {
        if !self.is_connected() {
            warn!(event = event.name(), "not connected, dropping outbound event");
            return;
        }
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(event = event.name(), error = %e, "failed to encode outbound event");
                return;
            }
        };
        match self.inner.transport.send(&frame).await {
            Ok(()) => debug!(event = event.name(), "published"),
            Err(e) => warn!(event = event.name(), error = %e, "failed to publish event"),
        }
    }

    /// Register `handler` for inbound events of `kind`.
    ///
    /// Handlers for the same kind run in registration order. Handlers run on
    /// the reader task and should return promptly.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&InboundEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.registry).push(Registration {
            id,
            kind,
            handler: Arc::new(handler),
        });
        debug!(%kind, id, "handler subscribed");
        Subscription {
            id,
            kind,
            registry: Arc::downgrade(&self.inner.registry),
        }
    }

    /// Number of handlers currently registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        lock(&self.inner.registry)
            .iter()
            .filter(|r| r.kind == kind)
            .count()
    }

    /// Snapshot of the connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.inner.state().is_connected()
    }

    /// Identity the connection is (or was last) bound to.
    pub fn identity(&self) -> Option<UserId> {
        self.inner.state().identity().cloned()
    }

    /// Lifecycle notifications (connected, disconnected, retrying, gave up).
    pub fn connection_events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.inner.events.subscribe()
    }

    /// Get a reference to the underlying transport (for testing).
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }
}

impl<T: Transport + 'static> Inner<T> {
    fn state(&self) -> ConnectionState {
        lock(&self.session).state.clone()
    }

    /// Apply a caller-initiated event, starting a new generation.
    fn request(&self, event: Event) -> (u64, Vec<Action>) {
        let mut session = lock(&self.session);
        let state = std::mem::take(&mut session.state);
        let (next, actions) = state.on_event(event, &self.policy);
        session.state = next;
        // a no-op request must not orphan the running session task
        if !actions.is_empty() {
            session.generation += 1;
        }
        (session.generation, actions)
    }

    /// Apply an event observed by the session task of `generation`.
    fn observe(&self, generation: u64, event: Event) -> Vec<Action> {
        let mut session = lock(&self.session);
        if session.generation != generation {
            debug!(?event, "ignoring event from superseded session");
            return Vec::new();
        }
        let state = std::mem::take(&mut session.state);
        let (next, actions) = state.on_event(event, &self.policy);
        session.state = next;
        actions
    }

    fn is_current(&self, generation: u64) -> bool {
        lock(&self.session).generation == generation
    }

    fn abort_task(&self) {
        if let Some(handle) = lock(&self.task).take() {
            handle.abort();
        }
    }

    /// Execute one action, returning the follow-up actions.
    async fn step(&self, generation: u64, action: Action) -> Vec<Action> {
        match action {
            Action::Connect { identity } => {
                let event = match self.open(&identity).await {
                    Ok(()) => Event::ConnectSucceeded,
                    Err(e) => Event::ConnectFailed {
                        error: e.to_string(),
                    },
                };
                self.observe(generation, event)
            }
            Action::Disconnect => {
                if let Err(e) = self.transport.close().await {
                    debug!(error = %e, "transport close failed");
                }
                Vec::new()
            }
            Action::StartReconnectTimer { delay } => {
                tokio::time::sleep(delay).await;
                self.observe(generation, Event::ReconnectTimer)
            }
            // the timer lives in the session task, which the caller aborts
            Action::CancelReconnect => Vec::new(),
            Action::EmitEvent(event) => {
                self.report(event);
                Vec::new()
            }
        }
    }

    async fn open(&self, identity: &UserId) -> Result<(), TransportError> {
        let url = connection_url(&self.socket_url, identity)?;
        info!(%identity, "connecting");
        self.transport.connect(&url).await
    }

    /// Session task: read while connected, retry while reconnecting.
    async fn run(self: Arc<Self>, generation: u64, mut queue: VecDeque<Action>) {
        loop {
            let action = match queue.pop_front() {
                Some(action) => action,
                None if self.is_current(generation) && self.state().is_connected() => {
                    let reason = self.read_until_closed().await;
                    queue.extend(self.observe(generation, Event::ConnectionLost { reason }));
                    continue;
                }
                None => break,
            };
            queue.extend(self.step(generation, action).await);
        }
        debug!(generation, "session task finished");
    }

    async fn read_until_closed(&self) -> String {
        loop {
            match self.transport.recv().await {
                Ok(frame) => self.dispatch(&frame),
                Err(e) => return e.to_string(),
            }
        }
    }

    fn dispatch(&self, frame: &[u8]) {
        let event = match InboundEvent::from_frame(frame) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dropping malformed inbound event");
                return;
            }
        };
        let kind = event.kind();
        // snapshot so handlers may subscribe/unsubscribe without deadlocking
        let handlers: Vec<Handler> = lock(&self.registry)
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| Arc::clone(&r.handler))
            .collect();
        debug!(%kind, handlers = handlers.len(), "dispatching inbound event");
        for handler in handlers {
            handler(&event);
        }
    }

    fn report(&self, event: ConnectionEvent) {
        match &event {
            ConnectionEvent::Connected { identity } => info!(%identity, "connected"),
            ConnectionEvent::Disconnected { identity, reason } => {
                warn!(%identity, %reason, "disconnected")
            }
            ConnectionEvent::Retrying { attempt, error } => {
                info!(attempt, %error, "reconnect scheduled")
            }
            ConnectionEvent::GaveUp {
                identity,
                attempts,
                error,
            } => error!(%identity, attempts, %error, "giving up on reconnection"),
        }
        // no receivers is fine
        let _ = self.events.send(event);
    }
}

/// Build the connection URL carrying the identity as `userId`.
pub fn connection_url(socket_url: &str, identity: &UserId) -> Result<String, TransportError> {
    let mut url = Url::parse(socket_url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
    url.query_pairs_mut().append_pair("userId", identity.as_str());
    Ok(url.into())
}

/// Handle returned by [`TransportConnector::subscribe`].
///
/// Dropping it does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    kind: EventKind,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Remove the handler. Idempotent, and safe after the connector is gone.
    pub fn unsubscribe(&self) {
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = lock(&registry);
            let before = registry.len();
            registry.retain(|r| r.id != self.id);
            if registry.len() != before {
                debug!(kind = %self.kind, id = self.id, "handler unsubscribed");
            }
        }
    }

    /// Event kind this subscription listens to.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use chat_types::{Message, MessageKind, TypingNotice, TypingSignal};
    use std::time::Duration;

    fn connector() -> (TransportConnector<MockTransport>, MockTransport) {
        let transport = MockTransport::new();
        let policy = ReconnectPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(100),
        };
        (
            TransportConnector::new(transport.clone(), "ws://chat.test/ws", policy),
            transport,
        )
    }

    fn typing_frame(user: &str, is_typing: bool) -> Vec<u8> {
        InboundEvent::Typing(TypingSignal {
            user_id: user.into(),
            is_typing,
        })
        .to_frame()
        .unwrap()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    // ===========================================
    // Connect / Disconnect Tests
    // ===========================================

    #[tokio::test]
    async fn connect_carries_identity_in_query() {
        let (connector, transport) = connector();
        connector.connect("u1".into()).await;

        assert!(connector.is_connected());
        assert_eq!(connector.identity(), Some(UserId::from("u1")));
        assert_eq!(
            transport.connected_url().as_deref(),
            Some("ws://chat.test/ws?userId=u1")
        );
    }

    #[test]
    fn connection_url_escapes_identity() {
        let url = connection_url("ws://h/ws?v=2", &"a b&c".into()).unwrap();
        assert_eq!(url, "ws://h/ws?v=2&userId=a+b%26c");
    }

    #[test]
    fn connection_url_rejects_garbage() {
        assert!(matches!(
            connection_url("not a url", &"u1".into()),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn connect_is_idempotent_for_same_identity() {
        let (connector, transport) = connector();
        connector.connect("u1".into()).await;
        connector.connect("u1".into()).await;

        assert_eq!(transport.connect_attempts(), 1);
        assert!(connector.is_connected());
    }

    #[tokio::test]
    async fn connect_with_other_identity_rebinds() {
        let (connector, transport) = connector();
        connector.connect("u1".into()).await;
        connector.connect("u9".into()).await;

        assert_eq!(transport.connect_attempts(), 2);
        assert_eq!(connector.identity(), Some(UserId::from("u9")));
        assert!(transport
            .connected_url()
            .unwrap()
            .ends_with("userId=u9"));
    }

    #[tokio::test]
    async fn disconnect_is_safe_when_not_connected() {
        let (connector, _transport) = connector();
        connector.disconnect().await;
        connector.disconnect().await;
        assert!(matches!(connector.state(), ConnectionState::Disconnected));
    }

    #[tokio::test]
    async fn disconnect_closes_transport() {
        let (connector, transport) = connector();
        connector.connect("u1".into()).await;
        connector.disconnect().await;

        assert!(!connector.is_connected());
        assert!(!transport.is_connected());
    }

    // ===========================================
    // Publish Tests
    // ===========================================

    #[tokio::test]
    async fn publish_sends_envelope() {
        let (connector, transport) = connector();
        connector.connect("u1".into()).await;

        connector
            .publish(OutboundEvent::Typing(TypingNotice {
                receiver_id: "u2".into(),
                is_typing: true,
            }))
            .await;

        let sent = OutboundEvent::from_frame(&transport.last_sent().unwrap()).unwrap();
        assert_eq!(sent.name(), "typing");
    }

    #[tokio::test]
    async fn publish_while_disconnected_is_dropped() {
        let (connector, transport) = connector();
        let message = Message::compose("u1".into(), "u2".into(), "hi", MessageKind::Text);
        connector.publish(OutboundEvent::SendMessage(message)).await;

        assert!(transport.sent_frames().is_empty());
    }

    #[tokio::test]
    async fn publish_failure_is_absorbed() {
        let (connector, transport) = connector();
        connector.connect("u1".into()).await;
        transport.fail_next_send("broken pipe");

        connector
            .publish(OutboundEvent::Typing(TypingNotice {
                receiver_id: "u2".into(),
                is_typing: false,
            }))
            .await;
        assert!(transport.sent_frames().is_empty());
    }

    // ===========================================
    // Subscribe / Dispatch Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn handlers_run_in_registration_order() {
        let (connector, transport) = connector();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&seen);
        let _a = connector.subscribe(EventKind::Typing, move |_| first.lock().unwrap().push("a"));
        let second = Arc::clone(&seen);
        let _b = connector.subscribe(EventKind::Typing, move |_| second.lock().unwrap().push("b"));

        connector.connect("u1".into()).await;
        transport.push_inbound(typing_frame("u2", true));
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn events_are_delivered_in_receive_order() {
        let (connector, transport) = connector();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = connector.subscribe(EventKind::Typing, move |event| {
            if let InboundEvent::Typing(signal) = event {
                sink.lock().unwrap().push(signal.is_typing);
            }
        });

        connector.connect("u1".into()).await;
        transport.push_inbound(typing_frame("u2", true));
        transport.push_inbound(typing_frame("u2", false));
        transport.push_inbound(typing_frame("u2", true));
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec![true, false, true]);
    }

    #[tokio::test(start_paused = true)]
    async fn handlers_only_see_their_kind() {
        let (connector, transport) = connector();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let _sub = connector.subscribe(EventKind::OnlineStatus, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        connector.connect("u1".into()).await;
        transport.push_inbound(typing_frame("u2", true));
        settle().await;

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_frames_are_dropped() {
        let (connector, transport) = connector();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let _sub = connector.subscribe(EventKind::Typing, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        connector.connect("u1".into()).await;
        transport.push_inbound(b"not json".to_vec());
        transport.push_inbound(br#"{"event":"typing","data":{"isTyping":true}}"#.to_vec());
        transport.push_inbound(br#"{"event":"bogus","data":{}}"#.to_vec());
        transport.push_inbound(typing_frame("u2", true));
        settle().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(connector.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn unsubscribe_is_idempotent() {
        let (connector, transport) = connector();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let sub = connector.subscribe(EventKind::Typing, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(connector.handler_count(EventKind::Typing), 0);

        connector.connect("u1".into()).await;
        transport.push_inbound(typing_frame("u2", true));
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_after_connector_dropped() {
        let (connector, _transport) = connector();
        let sub = connector.subscribe(EventKind::Message, |_| {});
        drop(connector);
        sub.unsubscribe();
    }

    // ===========================================
    // Reconnect Tests
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn reconnects_after_connection_loss() {
        let (connector, transport) = connector();
        connector.connect("u1".into()).await;

        transport.drop_connection();
        settle().await;
        assert!(!connector.is_connected());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(connector.is_connected());
        assert_eq!(transport.connect_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_resumes_after_reconnect() {
        let (connector, transport) = connector();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let _sub = connector.subscribe(EventKind::Typing, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        connector.connect("u1".into()).await;
        transport.drop_connection();
        tokio::time::sleep(Duration::from_millis(150)).await;

        transport.push_inbound(typing_frame("u2", true));
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_bounded_retries() {
        let (connector, transport) = connector();
        let mut events = connector.connection_events();
        connector.connect("u1".into()).await;

        transport.refuse_connections(true);
        transport.drop_connection();
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(connector.state().is_failed());
        assert!(!connector.is_connected());
        // one initial connect plus three retries
        assert_eq!(transport.connect_attempts(), 4);

        let mut gave_up = false;
        while let Ok(event) = events.try_recv() {
            gave_up |= matches!(event, ConnectionEvent::GaveUp { attempts: 3, .. });
        }
        assert!(gave_up);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_first_connect_retries_in_background() {
        let (connector, transport) = connector();
        transport.fail_next_connect("refused");

        connector.connect("u1".into()).await;
        assert!(!connector.is_connected());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(connector.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn connect_during_reconnect_keeps_retry_alive() {
        let (connector, transport) = connector();
        connector.connect("u1".into()).await;
        transport.drop_connection();
        settle().await;

        connector.connect("u1".into()).await;
        assert!(matches!(connector.state(), ConnectionState::Reconnecting { .. }));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(connector.is_connected());
        assert_eq!(transport.connect_attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_cancels_pending_retry() {
        let (connector, transport) = connector();
        connector.connect("u1".into()).await;
        transport.drop_connection();
        settle().await;

        connector.disconnect().await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(transport.connect_attempts(), 1);
        assert!(matches!(connector.state(), ConnectionState::Disconnected));
    }
}
