//! Session actor.
//!
//! `create_session` spawns one task that owns the whole session: the handler
//! registry, the outbound queue, the connection lifecycle, the heartbeat and
//! the live transport link. Everything else talks to it through a cloneable
//! [`SessionHandle`]. The task never shares its state, so no locking is needed
//! and every mutation happens in the order events arrive.
//!
//! The loop multiplexes four sources, in priority order:
//! 1. commands from handles
//! 2. results of in-flight open attempts
//! 3. events from the live transport
//! 4. the earliest pending deadline (reconnect backoff, heartbeat timers)

use std::collections::VecDeque;
use std::sync::Arc;

use opendebate_protocol::{
    Data, Envelope, KnownEvent, MessageBuilder, PairingEvent, RoutingKey, Status,
};
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::error::{SessionError, TransportError};
use crate::heartbeat::{HeartbeatAction, HeartbeatConfig, HeartbeatMonitor, HeartbeatPhase};
use crate::messaging::queue::QueuedFrame;
use crate::messaging::{
    ConnectionLifecycle, ConnectionState, Dispatcher, EnqueueOutcome, FailureOutcome, Handler,
    OutboundQueue,
};
use crate::ports::{Notice, UiPort};
use crate::websocket::{Connector, TransportEvent, TransportLink};

/// Terminal notice shown once the reconnect budget is spent.
pub const CONNECTION_LOST_NOTICE: &str = "Could not connect to the server. Please refresh the page";

// =============================================================================
// Liveness options
// =============================================================================

/// How a feature wants its liveness checked.
pub struct LivenessOptions {
    keepalive: Envelope,
    ack: RoutingKey,
    config: HeartbeatConfig,
    clear_alert_on_exhaustion: bool,
    on_exhausted: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl LivenessOptions {
    pub fn new(keepalive: Envelope, ack: RoutingKey, config: HeartbeatConfig) -> Self {
        Self {
            keepalive,
            ack,
            config,
            clear_alert_on_exhaustion: false,
            on_exhausted: None,
        }
    }

    /// `pairing.keepalive` answered by `pairing.keepalive_ack`.
    pub fn pairing(config: HeartbeatConfig) -> Self {
        Self::new(
            MessageBuilder::keepalive(),
            KnownEvent::from(PairingEvent::KeepaliveAck).routing_key(),
            config,
        )
    }

    /// Run `callback` once when the retry budget is spent.
    pub fn on_exhausted(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_exhausted = Some(Box::new(callback));
        self
    }

    /// Clear the liveness banner on exhaustion instead of leaving it up.
    pub fn clear_alert_on_exhaustion(mut self, clear: bool) -> Self {
        self.clear_alert_on_exhaustion = clear;
        self
    }

    pub fn ack(&self) -> &RoutingKey {
        &self.ack
    }

    pub fn config(&self) -> HeartbeatConfig {
        self.config
    }
}

impl std::fmt::Debug for LivenessOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivenessOptions")
            .field("keepalive", &self.keepalive.routing_key().to_string())
            .field("ack", &self.ack.to_string())
            .field("config", &self.config)
            .field("clear_alert_on_exhaustion", &self.clear_alert_on_exhaustion)
            .field("on_exhausted", &self.on_exhausted.is_some())
            .finish()
    }
}

// =============================================================================
// Handle
// =============================================================================

enum Command {
    Connect { retries: Option<u32> },
    Disconnect,
    Send(String),
    Register { key: RoutingKey, handler: Handler },
    StartHeartbeat(LivenessOptions),
    StopHeartbeat,
    Shutdown,
}

/// Cloneable handle to a running session.
///
/// Every method only enqueues a command, so none of them block. They fail with
/// [`SessionError::Closed`] once the session task has exited.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    heartbeat: watch::Receiver<HeartbeatPhase>,
}

impl SessionHandle {
    /// Id carried by this session's tracing span.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Open the transport with the configured retry budget.
    pub fn connect(&self) -> Result<(), SessionError> {
        self.command(Command::Connect { retries: None })
    }

    /// Open the transport with an explicit retry budget for this attempt.
    pub fn connect_with_retries(&self, retries: u32) -> Result<(), SessionError> {
        self.command(Command::Connect {
            retries: Some(retries),
        })
    }

    /// Close the transport without scheduling a reconnect.
    pub fn disconnect(&self) -> Result<(), SessionError> {
        self.command(Command::Disconnect)
    }

    /// Send now if connected, otherwise queue until the next open.
    pub fn send(&self, envelope: &Envelope) -> Result<(), SessionError> {
        self.send_raw(envelope.to_wire())
    }

    /// Send an already encoded frame. Same queueing as [`SessionHandle::send`].
    pub fn send_raw(&self, frame: impl Into<String>) -> Result<(), SessionError> {
        self.command(Command::Send(frame.into()))
    }

    /// Register a handler for `topic.event_type`. Handlers run in registration order.
    pub fn register<F>(&self, topic: &str, event_type: &str, handler: F) -> Result<(), SessionError>
    where
        F: Fn(&Data) + Send + Sync + 'static,
    {
        self.command(Command::Register {
            key: RoutingKey::new(topic, event_type),
            handler: Arc::new(handler),
        })
    }

    /// Register a handler for a known event.
    pub fn on<F>(&self, event: impl Into<KnownEvent>, handler: F) -> Result<(), SessionError>
    where
        F: Fn(&Data) + Send + Sync + 'static,
    {
        self.command(Command::Register {
            key: event.into().routing_key(),
            handler: Arc::new(handler),
        })
    }

    /// Start (or restart) the keepalive loop described by `options`.
    pub fn start_heartbeat(&self, options: LivenessOptions) -> Result<(), SessionError> {
        self.command(Command::StartHeartbeat(options))
    }

    /// Stop the keepalive loop and clear its banner. Idempotent.
    pub fn stop_heartbeat(&self) -> Result<(), SessionError> {
        self.command(Command::StopHeartbeat)
    }

    /// Stop the session task. Other handles become stale.
    pub fn shutdown(&self) -> Result<(), SessionError> {
        self.command(Command::Shutdown)
    }

    /// Latest published connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver that sees every connection state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Latest published heartbeat phase.
    pub fn heartbeat_phase(&self) -> HeartbeatPhase {
        *self.heartbeat.borrow()
    }

    /// Receiver that sees every heartbeat phase change.
    pub fn watch_heartbeat(&self) -> watch::Receiver<HeartbeatPhase> {
        self.heartbeat.clone()
    }

    /// Resolves once the session task has exited.
    pub async fn closed(&self) {
        self.commands.closed().await
    }

    fn command(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }
}

/// Spawn a session task. Must be called from within a tokio runtime.
///
/// The session starts `Disconnected`; call [`SessionHandle::connect`].
pub fn create_session(
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    ui: Arc<dyn UiPort>,
) -> SessionHandle {
    let id = Uuid::new_v4();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
    let (heartbeat_tx, heartbeat_rx) = watch::channel(HeartbeatPhase::Idle);
    let (open_tx, open_rx) = mpsc::unbounded_channel();

    let span = tracing::info_span!("session", session_id = %id, endpoint = %config.endpoint);
    let actor = SessionActor {
        lifecycle: ConnectionLifecycle::new(config.max_retries, config.reconnect_delay),
        queue: OutboundQueue::new(config.queue),
        dispatcher: Dispatcher::default(),
        config,
        connector,
        ui,
        commands: cmd_rx,
        link: None,
        attempt: 0,
        pending_open: None,
        open_tx,
        open_rx,
        liveness: None,
        state_tx,
        heartbeat_tx,
    };
    tokio::spawn(actor.run().instrument(span));

    SessionHandle {
        id,
        commands: cmd_tx,
        state: state_rx,
        heartbeat: heartbeat_rx,
    }
}

// =============================================================================
// Actor
// =============================================================================

struct OpenResult {
    attempt: u64,
    result: Result<TransportLink, TransportError>,
}

struct LivenessSession {
    monitor: HeartbeatMonitor,
    keepalive: String,
    ack: RoutingKey,
    clear_alert_on_exhaustion: bool,
    on_exhausted: Option<Box<dyn FnOnce() + Send + 'static>>,
}

enum Event {
    Command(Command),
    HandlesDropped,
    Opened(OpenResult),
    Transport(TransportEvent),
    Deadline,
}

struct SessionActor {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    ui: Arc<dyn UiPort>,
    commands: mpsc::UnboundedReceiver<Command>,
    lifecycle: ConnectionLifecycle,
    queue: OutboundQueue,
    dispatcher: Dispatcher,
    link: Option<TransportLink>,
    /// Bumped per open attempt; results from older attempts are discarded.
    attempt: u64,
    pending_open: Option<AbortHandle>,
    open_tx: mpsc::UnboundedSender<OpenResult>,
    open_rx: mpsc::UnboundedReceiver<OpenResult>,
    liveness: Option<LivenessSession>,
    state_tx: watch::Sender<ConnectionState>,
    heartbeat_tx: watch::Sender<HeartbeatPhase>,
}

impl SessionActor {
    async fn run(mut self) {
        tracing::info!("Session started");
        loop {
            let deadline = self.next_deadline();
            let event = tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(command) => Event::Command(command),
                    None => Event::HandlesDropped,
                },

                Some(opened) = self.open_rx.recv() => Event::Opened(opened),

                event = next_transport_event(&mut self.link) => Event::Transport(event),

                _ = sleep_until_deadline(deadline) => Event::Deadline,
            };

            match event {
                Event::Command(Command::Shutdown) => {
                    tracing::info!("Shutdown requested");
                    break;
                }
                Event::HandlesDropped => {
                    tracing::debug!("All session handles dropped");
                    break;
                }
                Event::Command(command) => self.handle_command(command),
                Event::Opened(opened) => self.handle_opened(opened),
                Event::Transport(event) => self.handle_transport(event),
                Event::Deadline => self.handle_deadlines(Instant::now()),
            }
        }
        self.teardown();
    }

    fn next_deadline(&self) -> Option<Instant> {
        let heartbeat = self
            .liveness
            .as_ref()
            .and_then(|liveness| liveness.monitor.next_deadline());
        match (self.lifecycle.reconnect_due(), heartbeat) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { retries } => {
                let retries = retries.unwrap_or(self.config.max_retries);
                if self.lifecycle.request_connect(retries) {
                    tracing::info!(retries, "Connecting");
                    self.publish_state();
                    self.open_transport();
                }
            }
            Command::Disconnect => self.disconnect(),
            Command::Send(frame) => self.send_frame(frame),
            Command::Register { key, handler } => self.dispatcher.register(key, handler),
            Command::StartHeartbeat(options) => self.start_heartbeat(options),
            Command::StopHeartbeat => {
                let actions = match self.liveness.as_mut() {
                    Some(liveness) => liveness.monitor.stop(),
                    None => Vec::new(),
                };
                self.apply_heartbeat_actions(actions);
            }
            Command::Shutdown => {}
        }
    }

    // -------------------------------------------------------------------------
    // Connection
    // -------------------------------------------------------------------------

    fn open_transport(&mut self) {
        if let Some(previous) = self.pending_open.take() {
            previous.abort();
        }
        self.attempt += 1;
        let attempt = self.attempt;
        let connector = Arc::clone(&self.connector);
        let endpoint = self.config.endpoint.clone();
        let timeout = self.config.connect_timeout;
        let results = self.open_tx.clone();

        tracing::debug!(attempt, "Opening transport");
        let task = tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, connector.open(&endpoint)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(timeout)),
            };
            let _ = results.send(OpenResult { attempt, result });
        });
        self.pending_open = Some(task.abort_handle());
    }

    fn handle_opened(&mut self, opened: OpenResult) {
        if opened.attempt != self.attempt
            || self.lifecycle.state() != ConnectionState::Connecting
        {
            tracing::debug!(attempt = opened.attempt, "Discarding stale open result");
            return;
        }
        self.pending_open = None;

        match opened.result {
            Ok(link) => {
                self.link = Some(link);
                self.lifecycle.on_open();
                tracing::info!("Connected");
                self.publish_state();
                self.flush_queue();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Open attempt failed");
                self.handle_failure();
            }
        }
    }

    fn handle_transport(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Message(frame) => {
                if let Ok(dispatched) = self.dispatcher.dispatch(&frame, self.ui.as_ref()) {
                    self.observe_ack(&dispatched.envelope);
                }
            }
            TransportEvent::Closed(reason) => {
                tracing::warn!(reason = ?reason, "Transport closed");
                self.link = None;
                self.handle_failure();
            }
            TransportEvent::Error(error) => {
                tracing::warn!(error = %error, "Transport error");
                self.link = None;
                self.handle_failure();
            }
        }
    }

    fn handle_failure(&mut self) {
        match self.lifecycle.on_failure(Instant::now()) {
            FailureOutcome::Retry {
                delay,
                attempts_remaining,
            } => {
                tracing::info!(?delay, attempts_remaining, "Scheduling reconnect");
                self.ui.notify(Notice::new(
                    Status::Warning,
                    format!("Connection lost, reconnecting in {}s", delay.as_secs()),
                    true,
                ));
            }
            FailureOutcome::GiveUp => {
                tracing::error!("Reconnect budget exhausted");
                self.ui
                    .notify(Notice::new(Status::Error, CONNECTION_LOST_NOTICE, false));
            }
            FailureOutcome::Ignored => {}
        }
        self.publish_state();
    }

    fn disconnect(&mut self) {
        if let Some(pending) = self.pending_open.take() {
            pending.abort();
        }
        // invalidate any result still in flight
        self.attempt += 1;
        if self.link.take().is_some() {
            tracing::info!("Disconnected");
        }
        self.lifecycle.disconnect();
        self.publish_state();
    }

    fn handle_deadlines(&mut self, now: Instant) {
        if self.lifecycle.poll_reconnect(now) {
            tracing::info!(
                retries_remaining = self.lifecycle.retries_remaining(),
                "Reconnecting"
            );
            self.publish_state();
            self.open_transport();
        }

        let actions = match self.liveness.as_mut() {
            Some(liveness) => liveness.monitor.poll(now),
            None => Vec::new(),
        };
        self.apply_heartbeat_actions(actions);
    }

    fn publish_state(&mut self) {
        let state = self.lifecycle.state();
        if *self.state_tx.borrow() != state {
            self.state_tx.send_replace(state);
            self.ui.connection_changed(state);
        }
    }

    // -------------------------------------------------------------------------
    // Outbound
    // -------------------------------------------------------------------------

    fn send_frame(&mut self, frame: String) {
        let unsent = match &self.link {
            Some(link) if self.lifecycle.state().is_connected() => match link.send(frame) {
                Ok(()) => return,
                Err(SendError(frame)) => {
                    tracing::warn!("Writer gone, queueing frame");
                    frame
                }
            },
            _ => frame,
        };
        self.enqueue(unsent);
    }

    fn enqueue(&mut self, frame: String) {
        match self.queue.enqueue(frame) {
            EnqueueOutcome::Queued | EnqueueOutcome::DroppedOldest(_) => {
                tracing::debug!(queued = self.queue.len(), "Frame queued until connected");
            }
            EnqueueOutcome::Rejected => {
                tracing::warn!("Frame dropped, outbound queue full");
            }
        }
    }

    /// Send everything queued when the drain started, oldest first.
    fn flush_queue(&mut self) {
        let Some(link) = &self.link else {
            return;
        };
        let mut drain = self.queue.drain();
        let mut sent = 0usize;
        loop {
            let Some(entry) = drain.next() else {
                break;
            };
            let seq = entry.seq;
            if let Err(SendError(frame)) = link.send(entry.frame) {
                tracing::warn!(seq, "Flush interrupted, writer gone");
                drain.put_back(QueuedFrame { seq, frame });
                break;
            }
            sent += 1;
        }
        let left = drain.remaining();
        self.queue.restore(drain);
        if sent > 0 || left > 0 {
            tracing::info!(sent, left, "Flushed outbound queue");
        }
    }

    // -------------------------------------------------------------------------
    // Heartbeat
    // -------------------------------------------------------------------------

    fn start_heartbeat(&mut self, options: LivenessOptions) {
        let LivenessOptions {
            keepalive,
            ack,
            config,
            clear_alert_on_exhaustion,
            on_exhausted,
        } = options;
        tracing::info!(ack = %ack, interval = ?config.interval, "Starting heartbeat");

        // the previous monitor owns whatever banner is up
        if let Some(previous) = self.liveness.as_mut() {
            let actions = previous.monitor.stop();
            self.apply_heartbeat_actions(actions);
        }

        let mut monitor = HeartbeatMonitor::new(config);
        let actions = monitor.start(Instant::now());
        self.liveness = Some(LivenessSession {
            monitor,
            keepalive: keepalive.to_wire(),
            ack,
            clear_alert_on_exhaustion,
            on_exhausted,
        });
        self.apply_heartbeat_actions(actions);
    }

    fn observe_ack(&mut self, envelope: &Envelope) {
        let actions = match self.liveness.as_mut() {
            Some(liveness)
                if liveness.ack.topic() == envelope.topic
                    && liveness.ack.event_type() == envelope.event_type =>
            {
                liveness
                    .monitor
                    .on_ack(envelope.status, envelope.message.clone())
            }
            _ => return,
        };
        self.apply_heartbeat_actions(actions);
    }

    fn apply_heartbeat_actions(&mut self, actions: Vec<HeartbeatAction>) {
        let mut pending: VecDeque<HeartbeatAction> = actions.into();
        while let Some(action) = pending.pop_front() {
            match action {
                HeartbeatAction::SendKeepalive => {
                    // a missed beat is counted by the ack timeout, not replayed on reconnect
                    if !self.lifecycle.state().is_connected() {
                        tracing::debug!("Skipping keepalive, not connected");
                        continue;
                    }
                    if let Some(frame) = self.liveness.as_ref().map(|l| l.keepalive.clone()) {
                        self.send_frame(frame);
                    }
                }
                HeartbeatAction::Alert(alert) => self.ui.liveness_alert(alert),
                HeartbeatAction::Exhausted => {
                    let Some(liveness) = self.liveness.as_mut() else {
                        continue;
                    };
                    if liveness.clear_alert_on_exhaustion {
                        pending.extend(liveness.monitor.clear_alert());
                    }
                    if let Some(callback) = liveness.on_exhausted.take() {
                        callback();
                    }
                }
            }
        }

        let phase = self
            .liveness
            .as_ref()
            .map_or(HeartbeatPhase::Idle, |l| l.monitor.phase());
        self.heartbeat_tx.send_if_modified(|current| {
            let changed = *current != phase;
            *current = phase;
            changed
        });
    }

    fn teardown(&mut self) {
        let actions = match self.liveness.as_mut() {
            Some(liveness) => liveness.monitor.stop(),
            None => Vec::new(),
        };
        self.apply_heartbeat_actions(actions);
        self.disconnect();
        if !self.queue.is_empty() {
            tracing::warn!(dropped = self.queue.len(), "Session closed with frames queued");
        }
        tracing::info!("Session stopped");
    }
}

async fn next_transport_event(link: &mut Option<TransportLink>) -> TransportEvent {
    match link {
        Some(link) => link.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
