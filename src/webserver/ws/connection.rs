/// Client connection handler
///
/// Each accepted connection runs exactly two tasks:
/// - reader: liveness detection only; inbound application data is ignored
/// - writer: sole consumer of the outbound queue and sole writer of the
///   transport, also owns the heartbeat timer
///
/// The tasks share nothing but the outbound queue, the per-connection close
/// signal and the hub's cancellation signal. Every wait includes both
/// signals, so no task outlives a hub shutdown or a sibling's exit.
///
/// Cleanup lives in `ClientGuard::drop`, so it runs on every exit path,
/// including a panic unwinding through the task.
use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use crate::errors::HubError;
use crate::logger::{self, LogTag};

use super::health::{ClientLiveness, ConnectionHealth, HealthConfig, LivenessCell, CLOSE_FRAME_TIMEOUT};
use super::hub::{ClientId, ClientReceiver, ClientRegistration, RemovalReason, WsHub};
use super::message::Event;
use super::metrics::ConnectionMetrics;
use super::signal::Signal;
use super::tasks::spawn_supervised;

// ============================================================================
// SHARED STATE AND CLEANUP
// ============================================================================

struct ClientShared {
    id: ClientId,
    hub: Arc<WsHub>,
    closer: Signal,
    liveness: Arc<LivenessCell>,
    tasks_alive: AtomicUsize,
}

/// Guarantees close + unregister when a client task exits, however it exits
struct ClientGuard {
    shared: Arc<ClientShared>,
    role: &'static str,
    reason: RemovalReason,
}

impl ClientGuard {
    fn new(shared: Arc<ClientShared>, role: &'static str) -> Self {
        Self {
            shared,
            role,
            reason: RemovalReason::TaskPanicked,
        }
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        let shared = &self.shared;
        let reason = shared.liveness.record_reason(self.reason);

        shared.liveness.advance(ClientLiveness::Closing);
        shared.closer.trigger();
        shared.hub.unregister(shared.id, reason);

        if shared.tasks_alive.fetch_sub(1, Ordering::AcqRel) == 1 {
            shared.liveness.advance(ClientLiveness::Closed);
            logger::debug(
                LogTag::Client,
                &format!("Client {} closed ({})", shared.id, reason),
            );
        } else {
            logger::verbose(
                LogTag::Client,
                &format!("Client {} {} exited ({})", shared.id, self.role, self.reason),
            );
        }
    }
}

// ============================================================================
// ENTRY POINTS
// ============================================================================

/// Handles of the two tasks serving one client
pub struct ClientTasks {
    pub id: ClientId,
    pub reader: JoinHandle<Option<()>>,
    pub writer: JoinHandle<Option<()>>,
}

impl ClientTasks {
    /// Wait for both tasks to finish
    pub async fn join(self) {
        let _ = self.reader.await;
        let _ = self.writer.await;
    }
}

/// Handle an upgraded WebSocket
///
/// Returns once the client tasks are spawned, or immediately when the hub
/// refuses the registration (the socket is dropped, closing it).
pub async fn handle_connection(
    socket: WebSocket,
    hub: Arc<WsHub>,
    config: HealthConfig,
    initial: Vec<Event>,
) {
    let (sink, stream) = socket.split();

    match serve_client(hub, sink, stream, config, initial).await {
        Ok(tasks) => {
            logger::debug(
                LogTag::Client,
                &format!("Client {} connected", tasks.id),
            );
        }
        Err(e) => {
            logger::warning(LogTag::Client, &format!("Connection refused: {}", e));
        }
    }
}

/// Register a client with the hub and spawn its reader and writer tasks
///
/// Transport-agnostic: any message sink/stream pair works, which is what
/// the tests rely on.
pub async fn serve_client<Tx, Rx, E>(
    hub: Arc<WsHub>,
    sink: Tx,
    stream: Rx,
    config: HealthConfig,
    initial: Vec<Event>,
) -> Result<ClientTasks, HubError>
where
    Tx: Sink<Message> + Unpin + Send + 'static,
    Tx::Error: Display + Send,
    Rx: Stream<Item = Result<Message, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let id = hub.next_client_id();
    let (sender, queue) = mpsc::channel(config.queue_capacity.max(1));
    let closer = Signal::new();
    let liveness = Arc::new(LivenessCell::new());

    hub.register(ClientRegistration {
        id,
        sender,
        closer: closer.clone(),
        liveness: Arc::clone(&liveness),
        initial,
    })
    .await?;

    let shared = Arc::new(ClientShared {
        id,
        hub,
        closer,
        liveness,
        tasks_alive: AtomicUsize::new(2),
    });

    let writer = spawn_supervised(
        format!("client {} writer", id),
        run_writer(Arc::clone(&shared), sink, queue, config.clone()),
    );
    let reader = spawn_supervised(
        format!("client {} reader", id),
        run_reader(shared, stream, config),
    );

    Ok(ClientTasks { id, reader, writer })
}

// ============================================================================
// WRITER
// ============================================================================

enum Outbound {
    Event(Arc<Event>),
    Ping,
}

async fn run_writer<Tx>(
    shared: Arc<ClientShared>,
    mut sink: Tx,
    mut queue: ClientReceiver,
    config: HealthConfig,
) where
    Tx: Sink<Message> + Unpin,
    Tx::Error: Display,
{
    let mut guard = ClientGuard::new(Arc::clone(&shared), "writer");
    let hub_shutdown = shared.hub.shutdown_signal();
    let mut metrics = ConnectionMetrics::default();

    let mut heartbeat = interval_at(
        Instant::now() + config.heartbeat_interval,
        config.heartbeat_interval,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let reason = loop {
        let outbound = tokio::select! {
            biased;

            _ = hub_shutdown.triggered() => break RemovalReason::HubShutdown,
            _ = shared.closer.triggered() => break RemovalReason::Closed,

            item = queue.recv() => match item {
                Some(event) => Outbound::Event(event),
                // Sender dropped: the hub removed this client
                None => break RemovalReason::Closed,
            },

            _ = heartbeat.tick() => Outbound::Ping,
        };

        let (message, bytes) = match outbound {
            Outbound::Event(event) => match event.to_json() {
                Ok(text) => {
                    let bytes = text.len();
                    (Message::Text(text), bytes)
                }
                Err(e) => {
                    metrics.record_serialization_error();
                    logger::warning(
                        LogTag::Client,
                        &format!(
                            "Client {}: skipping unserializable {} event: {}",
                            shared.id,
                            event.event_type(),
                            e
                        ),
                    );
                    continue;
                }
            },
            Outbound::Ping => (Message::Ping(Vec::new()), 0),
        };
        let is_ping = matches!(message, Message::Ping(_));

        let sent = tokio::select! {
            biased;

            _ = hub_shutdown.triggered() => break RemovalReason::HubShutdown,
            _ = shared.closer.triggered() => break RemovalReason::Closed,

            result = timeout(config.write_timeout, sink.send(message)) => result,
        };

        match sent {
            Ok(Ok(())) => {
                if is_ping {
                    metrics.record_ping();
                } else {
                    metrics.record_message(bytes);
                }
            }
            Ok(Err(e)) => {
                logger::debug(
                    LogTag::Client,
                    &format!("Client {}: write failed: {}", shared.id, e),
                );
                break RemovalReason::WriteError;
            }
            Err(_) => {
                logger::warning(
                    LogTag::Client,
                    &format!(
                        "Client {}: write exceeded {:?}, disconnecting",
                        shared.id, config.write_timeout
                    ),
                );
                break RemovalReason::WriteTimeout;
            }
        }
    };

    guard.reason = reason;
    let reason = shared.liveness.record_reason(reason);
    shared.closer.trigger();

    close_transport(&mut sink, reason).await;

    logger::verbose(
        LogTag::Client,
        &format!(
            "Client {} writer stats: messages={} bytes={} pings={}",
            shared.id, metrics.messages_sent, metrics.bytes_sent, metrics.pings_sent
        ),
    );
}

/// Best-effort close frame followed by closing the sink, bounded in time
async fn close_transport<Tx>(sink: &mut Tx, reason: RemovalReason)
where
    Tx: Sink<Message> + Unpin,
{
    let code = match reason {
        RemovalReason::HubShutdown => close_code::AWAY,
        RemovalReason::SlowConsumer | RemovalReason::TaskPanicked => close_code::ERROR,
        _ => close_code::NORMAL,
    };
    let frame = CloseFrame {
        code,
        reason: reason.as_str().into(),
    };

    let _ = timeout(CLOSE_FRAME_TIMEOUT, async {
        let _ = sink.send(Message::Close(Some(frame))).await;
        let _ = sink.close().await;
    })
    .await;
}

// ============================================================================
// READER
// ============================================================================

async fn run_reader<Rx, E>(shared: Arc<ClientShared>, mut stream: Rx, config: HealthConfig)
where
    Rx: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut guard = ClientGuard::new(Arc::clone(&shared), "reader");
    let hub_shutdown = shared.hub.shutdown_signal();
    let mut health = ConnectionHealth::new();

    let reason = loop {
        let next = tokio::select! {
            biased;

            _ = hub_shutdown.triggered() => break RemovalReason::HubShutdown,
            _ = shared.closer.triggered() => break RemovalReason::Closed,

            next = timeout(config.read_timeout, stream.next()) => next,
        };

        match next {
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break RemovalReason::PeerClosed,
            // Any frame, pongs included, proves the peer is alive
            Ok(Some(Ok(_))) => health.record_activity(),
            Ok(Some(Err(e))) => {
                logger::debug(
                    LogTag::Client,
                    &format!("Client {}: read failed: {}", shared.id, e),
                );
                break RemovalReason::ReadError;
            }
            Err(_) => {
                logger::debug(
                    LogTag::Client,
                    &format!(
                        "Client {}: no inbound traffic for {}s (frames seen: {})",
                        shared.id,
                        health.seconds_since_activity(),
                        health.inbound_frames()
                    ),
                );
                break RemovalReason::ReadTimeout;
            }
        }
    };

    guard.reason = reason;
}
