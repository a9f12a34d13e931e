/// Central broadcast hub - client registry and fan-out dispatcher
///
/// The WsHub is the single authority for "who is connected". It manages:
/// - The client registry (mutated only by the dispatch loop and by shutdown)
/// - Fan-out of every broadcast event to each client's bounded outbound queue
/// - Backpressure: a client whose queue is full is disconnected, never waited on
/// - The shared cancellation signal and the shutdown sweep
/// - Hub-level metrics
///
/// Each client's outbound queue has exactly one `Sender`, stored in its
/// registry slot. Removing the slot drops the sender, which is what closes
/// the queue; a slot can only be removed once, so the queue closes once.
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::HubConfig;
use crate::errors::HubError;
use crate::logger::{self, LogTag};

use super::health::{ClientLiveness, LivenessCell};
use super::message::Event;
use super::metrics::HubMetrics;
use super::signal::Signal;
use super::tasks::supervise;

// ============================================================================
// HUB TYPES
// ============================================================================

/// Client ID (unique per connection for the lifetime of the hub)
pub type ClientId = u64;

/// Producer side of a client's outbound queue
pub type ClientSender = mpsc::Sender<Arc<Event>>;

/// Consumer side of a client's outbound queue (owned by the writer task)
pub type ClientReceiver = mpsc::Receiver<Arc<Event>>;

/// Hub lifecycle: Running -> ShuttingDown -> Stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum HubState {
    Running = 0,
    ShuttingDown = 1,
    Stopped = 2,
}

impl HubState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => HubState::Running,
            1 => HubState::ShuttingDown,
            _ => HubState::Stopped,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HubState::Running => "running",
            HubState::ShuttingDown => "shutting_down",
            HubState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for HubState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a client left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Peer sent a close frame or the stream ended
    PeerClosed,
    ReadError,
    /// No inbound traffic within the read timeout
    ReadTimeout,
    WriteError,
    WriteTimeout,
    /// Outbound queue was full at dispatch
    SlowConsumer,
    /// Outbound queue receiver was already gone at dispatch
    WriterGone,
    /// A client task ended abnormally
    TaskPanicked,
    HubShutdown,
    /// Close requested elsewhere (hub removal or the sibling task)
    Closed,
}

impl RemovalReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemovalReason::PeerClosed => "peer_closed",
            RemovalReason::ReadError => "read_error",
            RemovalReason::ReadTimeout => "read_timeout",
            RemovalReason::WriteError => "write_error",
            RemovalReason::WriteTimeout => "write_timeout",
            RemovalReason::SlowConsumer => "slow_consumer",
            RemovalReason::WriterGone => "writer_gone",
            RemovalReason::TaskPanicked => "task_panicked",
            RemovalReason::HubShutdown => "hub_shutdown",
            RemovalReason::Closed => "closed",
        }
    }
}

impl fmt::Display for RemovalReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the hub needs to own a client's registry membership
///
/// `initial` events are enqueued by the hub before the client becomes
/// visible to dispatch, so they always precede broadcast events. They must
/// fit into the queue's capacity or the registration is rejected.
pub struct ClientRegistration {
    pub id: ClientId,
    pub sender: ClientSender,
    pub closer: Signal,
    pub liveness: Arc<LivenessCell>,
    pub initial: Vec<Event>,
}

/// Registry entry
struct ClientSlot {
    sender: ClientSender,
    closer: Signal,
    liveness: Arc<LivenessCell>,
}

impl ClientSlot {
    /// Ask the connection to close; the queue closes when the slot drops
    ///
    /// The reason is recorded before the close signal fires so the writer
    /// reports it in the close frame.
    fn close(&self, reason: RemovalReason) {
        self.liveness.record_reason(reason);
        self.liveness.advance(ClientLiveness::Closing);
        self.closer.trigger();
    }
}

enum HubCommand {
    Register {
        registration: ClientRegistration,
        ack: oneshot::Sender<bool>,
    },
    Unregister {
        id: ClientId,
        reason: RemovalReason,
    },
}

/// Receiving halves consumed by the dispatch loop
struct HubInbox {
    commands: mpsc::UnboundedReceiver<HubCommand>,
    events: mpsc::Receiver<Arc<Event>>,
}

// ============================================================================
// WS HUB
// ============================================================================

/// Central broadcast hub
pub struct WsHub {
    /// Registered clients (client_id -> slot)
    clients: RwLock<HashMap<ClientId, ClientSlot>>,

    /// Registry size, published under the registry write lock
    client_count: AtomicUsize,

    /// Next client ID
    next_client_id: AtomicU64,

    /// Lifecycle state (HubState as u8)
    state: AtomicU8,

    /// True while the dispatch loop is consuming commands
    dispatching: AtomicBool,

    /// Shared cancellation signal for the hub, producers and client tasks
    shutdown: Signal,

    commands: mpsc::UnboundedSender<HubCommand>,
    events: mpsc::Sender<Arc<Event>>,
    inbox: Mutex<Option<HubInbox>>,

    /// Hub metrics
    metrics: Arc<HubMetrics>,
}

impl WsHub {
    /// Create new hub from config
    pub fn new(config: &HubConfig) -> Arc<Self> {
        Self::with_capacity(config.dispatch_queue_capacity)
    }

    /// Create new hub with an explicit dispatch queue capacity
    pub fn with_capacity(dispatch_queue_capacity: usize) -> Arc<Self> {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(dispatch_queue_capacity.max(1));

        Arc::new(Self {
            clients: RwLock::new(HashMap::new()),
            client_count: AtomicUsize::new(0),
            next_client_id: AtomicU64::new(1),
            state: AtomicU8::new(HubState::Running as u8),
            dispatching: AtomicBool::new(false),
            shutdown: Signal::new(),
            commands: commands_tx,
            events: events_tx,
            inbox: Mutex::new(Some(HubInbox {
                commands: commands_rx,
                events: events_rx,
            })),
            metrics: HubMetrics::new(),
        })
    }

    /// Spawn the dispatch loop
    ///
    /// A panic inside the loop is logged and followed by a full shutdown so
    /// no client is left registered without a dispatcher.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, HubError> {
        let state = self.state();
        if state != HubState::Running {
            return Err(HubError::NotRunning(state));
        }
        let inbox = self.inbox.lock().take().ok_or(HubError::AlreadyStarted)?;

        self.dispatching.store(true, Ordering::Release);
        let hub = Arc::clone(self);

        Ok(tokio::spawn(async move {
            let completed = supervise("hub dispatch", Arc::clone(&hub).run_dispatch(inbox))
                .await
                .is_some();
            hub.dispatching.store(false, Ordering::Release);
            if !completed {
                hub.shutdown();
            }
        }))
    }

    /// Allocate a fresh client ID
    pub fn next_client_id(&self) -> ClientId {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn state(&self) -> HubState {
        HubState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Shared cancellation signal (triggered by `shutdown`)
    pub fn shutdown_signal(&self) -> Signal {
        self.shutdown.clone()
    }

    pub fn metrics(&self) -> Arc<HubMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Current registry size (lock-free read)
    pub fn client_count(&self) -> usize {
        self.client_count.load(Ordering::Acquire)
    }

    /// Register a client through the dispatch loop
    ///
    /// Resolves once the dispatch loop has admitted or rejected the client.
    pub async fn register(&self, registration: ClientRegistration) -> Result<(), HubError> {
        let state = self.state();
        if state != HubState::Running {
            return Err(HubError::NotRunning(state));
        }
        if !self.dispatching.load(Ordering::Acquire) {
            return Err(HubError::DispatchUnavailable);
        }

        let id = registration.id;
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands
            .send(HubCommand::Register {
                registration,
                ack: ack_tx,
            })
            .map_err(|_| HubError::DispatchUnavailable)?;

        match ack_rx.await {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.metrics.registration_rejected();
                let state = self.state();
                if state != HubState::Running {
                    Err(HubError::NotRunning(state))
                } else {
                    Err(HubError::Rejected(id))
                }
            }
            Err(_) => Err(HubError::DispatchUnavailable),
        }
    }

    /// Request removal of a client
    ///
    /// Safe to call any number of times from any task; only the first
    /// removal closes the queue. Falls back to removing directly when the
    /// dispatch loop is no longer running.
    pub fn unregister(&self, id: ClientId, reason: RemovalReason) {
        if self.dispatching.load(Ordering::Acquire)
            && self
                .commands
                .send(HubCommand::Unregister { id, reason })
                .is_ok()
        {
            return;
        }
        self.remove_client(id, reason);
    }

    /// Queue an event for fan-out
    ///
    /// Never blocks. Returns false when the hub is not running or the
    /// dispatch queue is full (the event is dropped with a warning).
    pub fn broadcast(&self, event: Event) -> bool {
        if self.state() != HubState::Running {
            return false;
        }

        match self.events.try_send(Arc::new(event)) {
            Ok(()) => {
                self.metrics.event_accepted();
                true
            }
            Err(TrySendError::Full(event)) => {
                self.metrics.event_dropped();
                logger::warning(
                    LogTag::Hub,
                    &format!(
                        "Dispatch queue full, dropping {} event",
                        event.event_type()
                    ),
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Stop the hub
    ///
    /// Idempotent and safe to call concurrently. Cancels the shared signal,
    /// then closes every remaining client and empties the registry. Returns
    /// true for the caller that initiated the shutdown.
    pub fn shutdown(&self) -> bool {
        let first = self
            .state
            .compare_exchange(
                HubState::Running as u8,
                HubState::ShuttingDown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        self.shutdown.trigger();

        let drained: Vec<(ClientId, ClientSlot)> = {
            let mut clients = self.clients.write();
            let drained = clients.drain().collect();
            self.client_count.store(0, Ordering::Release);
            drained
        };

        for (_, slot) in &drained {
            slot.close(RemovalReason::HubShutdown);
            self.metrics.client_removed();
        }
        let closed = drained.len();
        drop(drained);

        if first {
            self.state.store(HubState::Stopped as u8, Ordering::Release);
            logger::info(
                LogTag::Hub,
                &format!("Hub stopped ({} clients closed)", closed),
            );
        }

        first
    }

    // ------------------------------------------------------------------------
    // Dispatch loop
    // ------------------------------------------------------------------------

    async fn run_dispatch(self: Arc<Self>, mut inbox: HubInbox) {
        logger::info(LogTag::Hub, "Dispatch loop started");

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.triggered() => break,

                Some(command) = inbox.commands.recv() => match command {
                    HubCommand::Register { registration, ack } => {
                        let admitted = self.admit(registration);
                        let _ = ack.send(admitted);
                    }
                    HubCommand::Unregister { id, reason } => {
                        self.remove_client(id, reason);
                    }
                },

                Some(event) = inbox.events.recv() => self.dispatch(event),

                else => break,
            }
        }

        logger::debug(LogTag::Hub, "Dispatch loop exited");
    }

    /// Insert a client into the registry after enqueueing its initial events
    fn admit(&self, registration: ClientRegistration) -> bool {
        let ClientRegistration {
            id,
            sender,
            closer,
            liveness,
            initial,
        } = registration;

        let mut clients = self.clients.write();

        // Checked under the lock so the shutdown sweep cannot miss a client
        if self.state() != HubState::Running || clients.contains_key(&id) {
            return false;
        }

        for event in initial {
            if sender.try_send(Arc::new(event)).is_err() {
                logger::warning(
                    LogTag::Hub,
                    &format!("Client {} rejected: initial snapshot exceeds queue", id),
                );
                return false;
            }
        }

        liveness.advance(ClientLiveness::Registered);
        clients.insert(
            id,
            ClientSlot {
                sender,
                closer,
                liveness,
            },
        );
        self.client_count.store(clients.len(), Ordering::Release);
        let active = clients.len();
        drop(clients);

        self.metrics.client_registered();
        logger::debug(
            LogTag::Hub,
            &format!("Client {} registered (active={})", id, active),
        );
        true
    }

    /// Fan an event out to every registered client
    ///
    /// Slow clients are only collected while the read lock is held and are
    /// removed after it is released.
    fn dispatch(&self, event: Arc<Event>) {
        let mut evicted = Vec::new();
        let mut delivered = 0u64;

        {
            let clients = self.clients.read();
            for (id, slot) in clients.iter() {
                match slot.sender.try_send(Arc::clone(&event)) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => evicted.push((*id, RemovalReason::SlowConsumer)),
                    Err(TrySendError::Closed(_)) => evicted.push((*id, RemovalReason::WriterGone)),
                }
            }
        }

        self.metrics.delivered(delivered);
        logger::verbose(
            LogTag::Hub,
            &format!(
                "Dispatched {} (delivered={}, evicted={})",
                event.event_type(),
                delivered,
                evicted.len()
            ),
        );

        for (id, reason) in evicted {
            if reason == RemovalReason::SlowConsumer {
                self.metrics.slow_client_disconnected();
                logger::warning(
                    LogTag::Hub,
                    &format!("Client {} outbound queue full, disconnecting", id),
                );
            }
            self.remove_client(id, reason);
        }
    }

    /// Remove a client from the registry and request its connection close
    ///
    /// Returns true only for the call that actually removed the client.
    pub(crate) fn remove_client(&self, id: ClientId, reason: RemovalReason) -> bool {
        let (slot, active) = {
            let mut clients = self.clients.write();
            let slot = clients.remove(&id);
            self.client_count.store(clients.len(), Ordering::Release);
            (slot, clients.len())
        };

        match slot {
            Some(slot) => {
                slot.close(reason);
                self.metrics.client_removed();
                logger::debug(
                    LogTag::Hub,
                    &format!(
                        "Client {} unregistered: {} (active={})",
                        id, reason, active
                    ),
                );
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webserver::ws::message::EventType;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    struct TestClient {
        id: ClientId,
        rx: ClientReceiver,
        closer: Signal,
        liveness: Arc<LivenessCell>,
    }

    fn test_client(hub: &WsHub, capacity: usize, initial: Vec<Event>) -> (ClientRegistration, TestClient) {
        let id = hub.next_client_id();
        let (tx, rx) = mpsc::channel(capacity);
        let closer = Signal::new();
        let liveness = Arc::new(LivenessCell::new());
        let registration = ClientRegistration {
            id,
            sender: tx,
            closer: closer.clone(),
            liveness: Arc::clone(&liveness),
            initial,
        };
        (
            registration,
            TestClient {
                id,
                rx,
                closer,
                liveness,
            },
        )
    }

    async fn registered(hub: &WsHub, capacity: usize) -> TestClient {
        let (registration, client) = test_client(hub, capacity, Vec::new());
        hub.register(registration).await.unwrap();
        client
    }

    async fn recv(client: &mut TestClient) -> Option<Arc<Event>> {
        timeout(Duration::from_secs(2), client.rx.recv())
            .await
            .expect("receive timed out")
    }

    fn event(n: u64) -> Event {
        Event::new(EventType::Event, json!({ "n": n }))
    }

    #[tokio::test]
    async fn test_register_and_count() {
        let hub = WsHub::with_capacity(16);
        hub.start().unwrap();

        assert_eq!(hub.client_count(), 0);
        let a = registered(&hub, 8).await;
        let _b = registered(&hub, 8).await;
        assert_eq!(hub.client_count(), 2);
        assert_eq!(a.liveness.get(), ClientLiveness::Registered);

        assert!(hub.remove_client(a.id, RemovalReason::PeerClosed));
        assert_eq!(hub.client_count(), 1);
        assert_eq!(a.liveness.get(), ClientLiveness::Closing);
        assert!(a.closer.is_triggered());

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_duplicate_registration_rejected() {
        let hub = WsHub::with_capacity(16);
        hub.start().unwrap();

        let (first, client) = test_client(&hub, 4, Vec::new());
        hub.register(first).await.unwrap();

        let (tx, _rx) = mpsc::channel(4);
        let duplicate = ClientRegistration {
            id: client.id,
            sender: tx,
            closer: Signal::new(),
            liveness: Arc::new(LivenessCell::new()),
            initial: Vec::new(),
        };
        assert_eq!(
            hub.register(duplicate).await,
            Err(HubError::Rejected(client.id))
        );
        assert_eq!(hub.client_count(), 1);
        assert_eq!(hub.metrics().snapshot().registrations_rejected, 1);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_register_requires_dispatch_loop() {
        let hub = WsHub::with_capacity(4);
        let (registration, _client) = test_client(&hub, 4, Vec::new());
        assert_eq!(
            hub.register(registration).await,
            Err(HubError::DispatchUnavailable)
        );

        hub.start().unwrap();
        assert!(matches!(hub.start(), Err(HubError::AlreadyStarted)));
        hub.shutdown();
    }

    #[tokio::test]
    async fn test_broadcast_order_preserved() {
        let hub = WsHub::with_capacity(64);
        hub.start().unwrap();
        let mut a = registered(&hub, 64).await;
        let mut b = registered(&hub, 64).await;

        for n in 0..20 {
            assert!(hub.broadcast(event(n)));
        }

        for client in [&mut a, &mut b] {
            for n in 0..20 {
                let received = recv(client).await.unwrap();
                assert_eq!(received.data()["n"], json!(n));
            }
        }

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_all_clients_receive_identical_event() {
        let hub = WsHub::with_capacity(8);
        hub.start().unwrap();
        let mut clients = Vec::new();
        for _ in 0..4 {
            clients.push(registered(&hub, 8).await);
        }

        let original = Event::new(EventType::JobUpdate, json!({"id": "job-7", "status": "running"}));
        hub.broadcast(original.clone());

        for client in clients.iter_mut() {
            let received = recv(client).await.unwrap();
            assert_eq!(*received, original);
        }
        assert_eq!(hub.metrics().snapshot().deliveries, 4);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_slow_client_disconnected_others_unaffected() {
        let hub = WsHub::with_capacity(16);
        hub.start().unwrap();

        let mut one = registered(&hub, 1).await;
        let mut two = registered(&hub, 1).await;
        let mut three = registered(&hub, 1).await;
        assert_eq!(hub.client_count(), 3);

        // A reaches everyone
        hub.broadcast(event(1));
        assert_eq!(recv(&mut one).await.unwrap().data()["n"], json!(1));
        assert_eq!(recv(&mut three).await.unwrap().data()["n"], json!(1));

        // Client two never drained A, so B overflows its queue
        hub.broadcast(event(2));
        assert_eq!(recv(&mut one).await.unwrap().data()["n"], json!(2));
        assert_eq!(recv(&mut three).await.unwrap().data()["n"], json!(2));

        // Client two keeps A, then observes the queue closing
        assert_eq!(recv(&mut two).await.unwrap().data()["n"], json!(1));
        assert!(recv(&mut two).await.is_none());
        assert!(two.closer.is_triggered());
        assert_eq!(two.liveness.reason(), Some(RemovalReason::SlowConsumer));
        assert_eq!(one.liveness.reason(), None);
        assert_eq!(hub.client_count(), 2);

        let snapshot = hub.metrics().snapshot();
        assert_eq!(snapshot.slow_client_disconnects, 1);
        assert_eq!(snapshot.clients_removed, 1);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_repeated_unregister_closes_once() {
        let hub = WsHub::with_capacity(16);
        hub.start().unwrap();
        let mut client = registered(&hub, 4).await;

        let mut callers = Vec::new();
        for _ in 0..8 {
            let hub = Arc::clone(&hub);
            let id = client.id;
            callers.push(tokio::spawn(async move {
                hub.unregister(id, RemovalReason::ReadError);
                hub.unregister(id, RemovalReason::WriteError);
            }));
        }
        for caller in callers {
            caller.await.unwrap();
        }

        assert!(recv(&mut client).await.is_none());
        assert_eq!(hub.client_count(), 0);

        // Let trailing unregister commands drain through the loop
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!hub.remove_client(client.id, RemovalReason::PeerClosed));
        assert_eq!(hub.metrics().snapshot().clients_removed, 1);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_count_released_before_queue_closes() {
        let hub = WsHub::with_capacity(16);
        hub.start().unwrap();
        let mut client = registered(&hub, 4).await;

        hub.unregister(client.id, RemovalReason::PeerClosed);
        assert!(recv(&mut client).await.is_none());
        assert_eq!(hub.client_count(), 0);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_initial_events_precede_broadcasts() {
        let hub = WsHub::with_capacity(16);
        hub.start().unwrap();

        let initial = vec![
            Event::new(EventType::Status, json!({"total_jobs": 0})),
            Event::new(EventType::Jobs, json!({"jobs": []})),
        ];
        let (registration, mut client) = test_client(&hub, 8, initial);
        hub.register(registration).await.unwrap();
        hub.broadcast(event(1));

        assert_eq!(recv(&mut client).await.unwrap().event_type(), EventType::Status);
        assert_eq!(recv(&mut client).await.unwrap().event_type(), EventType::Jobs);
        assert_eq!(recv(&mut client).await.unwrap().event_type(), EventType::Event);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_initial_events_must_fit_queue() {
        let hub = WsHub::with_capacity(16);
        hub.start().unwrap();

        let initial = vec![event(1), event(2)];
        let (registration, client) = test_client(&hub, 1, initial);
        assert_eq!(
            hub.register(registration).await,
            Err(HubError::Rejected(client.id))
        );
        assert_eq!(hub.client_count(), 0);

        hub.shutdown();
    }

    #[tokio::test]
    async fn test_dispatch_queue_overflow_drops() {
        // Loop not started, so nothing drains the dispatch queue
        let hub = WsHub::with_capacity(2);

        assert!(hub.broadcast(event(1)));
        assert!(hub.broadcast(event(2)));
        assert!(!hub.broadcast(event(3)));

        let snapshot = hub.metrics().snapshot();
        assert_eq!(snapshot.events_accepted, 2);
        assert_eq!(snapshot.events_dropped, 1);
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let hub = WsHub::with_capacity(16);
        let dispatch = hub.start().unwrap();

        let mut clients = Vec::new();
        for _ in 0..3 {
            clients.push(registered(&hub, 4).await);
        }

        let mut callers = Vec::new();
        for _ in 0..4 {
            let hub = Arc::clone(&hub);
            callers.push(tokio::spawn(async move { hub.shutdown() }));
        }
        let mut initiators = 0;
        for caller in callers {
            if caller.await.unwrap() {
                initiators += 1;
            }
        }
        assert_eq!(initiators, 1);
        assert!(!hub.shutdown());

        assert_eq!(hub.client_count(), 0);
        assert_eq!(hub.state(), HubState::Stopped);
        for client in clients.iter_mut() {
            assert!(client.closer.is_triggered());
            assert!(recv(client).await.is_none());
        }
        assert_eq!(hub.metrics().snapshot().clients_removed, 3);

        timeout(Duration::from_secs(1), dispatch)
            .await
            .expect("dispatch loop should exit")
            .unwrap();
    }

    #[tokio::test]
    async fn test_noop_after_shutdown() {
        let hub = WsHub::with_capacity(16);
        hub.start().unwrap();
        hub.shutdown();

        assert!(!hub.broadcast(event(1)));
        let (registration, _client) = test_client(&hub, 4, Vec::new());
        assert_eq!(
            hub.register(registration).await,
            Err(HubError::NotRunning(HubState::Stopped))
        );
        assert!(matches!(hub.start(), Err(HubError::NotRunning(_))));

        // Unregister of an unknown client after shutdown is harmless
        hub.unregister(42, RemovalReason::HubShutdown);
        assert_eq!(hub.client_count(), 0);
    }
}
