//! Client session: one outbound WebSocket to the chat server, replaced
//! wholesale on every reconnect.
//!
//! The session never hands the socket to its consumer. Instead it exposes
//! three bounded queues through [`SessionEvents`] (incoming messages, errors
//! and status changes) that a UI loop drains with non-blocking reads.
//!
//! Status follows `Disconnected -> Connecting -> Connected | Error`. A failed
//! attempt or a lost connection schedules one retry after the policy delay.
//! Every attempt gets a generation number; pumps and timers belonging to an
//! older generation are ignored when they report back.

use std::sync::Arc;

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{
    net::TcpStream,
    sync::{
        Mutex,
        mpsc::{self, error::TrySendError},
        oneshot,
    },
    task::JoinHandle,
    time::{self, Duration, Instant, timeout},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use chatterbox_shared::message::Envelope;

use crate::{
    config::SessionConfig,
    domain::frame_lines,
    error::ClientError,
    status::{ConnectionStatus, StatusModel},
};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Consumer side of the session's queues.
pub struct SessionEvents {
    pub incoming: mpsc::Receiver<Envelope>,
    pub errors: mpsc::Receiver<ClientError>,
    pub status: mpsc::Receiver<ConnectionStatus>,
}

impl SessionEvents {
    pub fn try_next_message(&mut self) -> Option<Envelope> {
        self.incoming.try_recv().ok()
    }

    pub fn try_next_error(&mut self) -> Option<ClientError> {
        self.errors.try_recv().ok()
    }

    pub fn try_next_status(&mut self) -> Option<ConnectionStatus> {
        self.status.try_recv().ok()
    }
}

/// Handle to a chat session. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct ClientSession {
    inner: Arc<Inner>,
}

struct Inner {
    endpoint: String,
    display_name: String,
    /// Tagged onto every outgoing envelope
    room: Option<String>,
    config: SessionConfig,
    outgoing: mpsc::Sender<Envelope>,
    /// Drained by whichever write pump is current.
    pending: Mutex<mpsc::Receiver<Envelope>>,
    incoming: mpsc::Sender<Envelope>,
    errors: mpsc::Sender<ClientError>,
    status: mpsc::Sender<ConnectionStatus>,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    status: StatusModel,
    generation: u64,
    closed: bool,
    failed_attempts: u32,
    active: Option<ActiveSocket>,
}

/// Pumps of the current socket. Dropping `shutdown` stops the write pump.
struct ActiveSocket {
    shutdown: oneshot::Sender<()>,
    reader: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pump {
    Read,
    Write,
}

impl ClientSession {
    /// Create a disconnected session and the queues its consumer reads.
    pub fn new(
        endpoint: impl Into<String>,
        display_name: impl Into<String>,
        config: SessionConfig,
    ) -> (Self, SessionEvents) {
        Self::with_room(endpoint, display_name, None, config)
    }

    /// Like [`ClientSession::new`], labelling outgoing messages with `room`.
    pub fn with_room(
        endpoint: impl Into<String>,
        display_name: impl Into<String>,
        room: Option<String>,
        config: SessionConfig,
    ) -> (Self, SessionEvents) {
        let (outgoing, pending) = mpsc::channel(config.outgoing_capacity.max(1));
        let (incoming_tx, incoming) = mpsc::channel(config.incoming_capacity.max(1));
        let (errors_tx, errors) = mpsc::channel(config.error_capacity.max(1));
        let (status_tx, status) = mpsc::channel(config.status_capacity.max(1));

        let session = Self {
            inner: Arc::new(Inner {
                endpoint: endpoint.into(),
                display_name: display_name.into(),
                room,
                config,
                outgoing,
                pending: Mutex::new(pending),
                incoming: incoming_tx,
                errors: errors_tx,
                status: status_tx,
                state: Mutex::new(SessionState::default()),
            }),
        };
        let events = SessionEvents {
            incoming,
            errors,
            status,
        };
        (session, events)
    }

    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    pub fn display_name(&self) -> &str {
        &self.inner.display_name
    }

    pub fn room(&self) -> Option<&str> {
        self.inner.room.as_deref()
    }

    /// Current phase as seen by the session itself.
    pub async fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().await.status.current()
    }

    /// Open a new socket to the endpoint.
    ///
    /// Emits `Connecting`, then `Connected` or `Error`. On failure the error is
    /// also pushed to the error queue and a retry is scheduled. Does nothing
    /// when already connected.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let endpoint = self.inner.endpoint.as_str();
        let generation = {
            let mut state = self.inner.state.lock().await;
            if state.status.is_connected() {
                tracing::debug!("Already connected to {}", endpoint);
                return Ok(());
            }
            state.closed = false;
            state.generation += 1;
            if let Some(stale) = state.active.take() {
                stale.reader.abort();
            }
            self.inner.publish(&mut state, ConnectionStatus::Connecting);
            state.generation
        };

        tracing::info!("Connecting to {}", endpoint);
        let connect_timeout = self.inner.config.connect_timeout;
        let dialed = match timeout(connect_timeout, connect_async(endpoint)).await {
            Ok(Ok((socket, _response))) => Ok(socket),
            Ok(Err(e)) => Err(ClientError::ConnectionError(e.to_string())),
            Err(_) => Err(ClientError::ConnectionError(format!(
                "timed out after {:?}",
                connect_timeout
            ))),
        };

        let mut state = self.inner.state.lock().await;
        if state.closed || state.generation != generation {
            tracing::debug!("Connection attempt {} was superseded", generation);
            return Err(ClientError::Cancelled);
        }

        match dialed {
            Ok(socket) => {
                let (sink, stream) = socket.split();
                let (shutdown, shutdown_rx) = oneshot::channel();
                tokio::spawn(write_pump(self.clone(), generation, sink, shutdown_rx));
                let reader = tokio::spawn(read_pump(self.clone(), generation, stream));
                state.active = Some(ActiveSocket { shutdown, reader });
                state.failed_attempts = 0;
                tracing::info!("Connected to {}", endpoint);
                self.inner.publish(&mut state, ConnectionStatus::Connected);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Connection to {} failed: {}", endpoint, e);
                self.inner.publish(&mut state, ConnectionStatus::Error);
                self.inner.report(e.clone());
                self.schedule_reconnect(&mut state);
                Err(e)
            }
        }
    }

    /// Queue a chat message from this session's user.
    ///
    /// Never waits: when the outgoing queue is full the message is dropped.
    pub fn send_message(&self, content: impl Into<String>) {
        let mut envelope = Envelope::chat(self.inner.display_name.as_str(), content);
        if let Some(room) = &self.inner.room {
            envelope = envelope.with_room(room.as_str());
        }
        match self.inner.outgoing.try_send(envelope) {
            Ok(()) => tracing::debug!("Queued outgoing message"),
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!("Outgoing queue full, dropping message: {}", dropped.content)
            }
            Err(TrySendError::Closed(_)) => tracing::warn!("Outgoing queue closed"),
        }
    }

    /// Close the socket and emit `Disconnected`. Cancels pending retries.
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        state.closed = true;
        state.generation += 1;
        if let Some(active) = state.active.take() {
            tracing::info!("Closing connection to {}", self.inner.endpoint);
            active.reader.abort();
            let _ = active.shutdown.send(());
        }
        self.inner.publish(&mut state, ConnectionStatus::Disconnected);
    }

    fn schedule_reconnect(&self, state: &mut SessionState) {
        let policy = self.inner.config.reconnect;
        if !policy.should_attempt_reconnect(state.failed_attempts) {
            tracing::error!(
                "Failed to reconnect after {} attempts, giving up",
                state.failed_attempts
            );
            self.inner
                .report(ClientError::ReconnectExhausted(state.failed_attempts));
            return;
        }

        state.failed_attempts += 1;
        let generation = state.generation;
        tracing::info!(
            "Reconnecting in {:?} (attempt {})",
            policy.delay,
            state.failed_attempts
        );

        let session = self.clone();
        tokio::spawn(async move {
            time::sleep(policy.delay).await;
            if !session.retry_due(generation).await {
                tracing::debug!("Skipping scheduled reconnect for attempt {}", generation);
                return;
            }
            if let Err(e) = session.connect().await {
                tracing::debug!("Reconnect attempt failed: {}", e);
            }
        });
    }

    async fn retry_due(&self, generation: u64) -> bool {
        let state = self.inner.state.lock().await;
        !state.closed && state.generation == generation && !state.status.is_connected()
    }

    /// Called by a pump when the socket of `generation` stops working.
    async fn connection_lost(&self, generation: u64, origin: Pump, error: Option<ClientError>) {
        let mut state = self.inner.state.lock().await;
        if state.closed || state.generation != generation {
            return;
        }
        let Some(active) = state.active.take() else {
            // the other pump already reported this socket
            return;
        };
        if origin == Pump::Write {
            active.reader.abort();
        }
        drop(active);

        if let Some(e) = error {
            tracing::warn!("{}", e);
            self.inner.report(e);
        }
        tracing::info!("Disconnected from {}", self.inner.endpoint);
        self.inner
            .publish(&mut state, ConnectionStatus::Disconnected);
        self.schedule_reconnect(&mut state);
    }
}

impl Inner {
    fn publish(&self, state: &mut SessionState, status: ConnectionStatus) {
        if !state.status.apply(status) {
            tracing::debug!("Ignoring stale {} status", status);
            return;
        }
        if self.status.try_send(status).is_err() {
            tracing::warn!("Status queue full, dropping {} update", status);
        }
    }

    fn report(&self, error: ClientError) {
        if let Err(e) = self.errors.try_send(error) {
            tracing::warn!("Error queue full, dropping error: {}", e.into_inner());
        }
    }

    /// Decode a frame, one envelope per line, into the incoming queue.
    fn deliver(&self, text: &str) {
        for line in frame_lines(text) {
            let envelope = Envelope::parse_or_plain(line);
            tracing::debug!("Received: {}", envelope.content);
            if self.incoming.try_send(envelope).is_err() {
                tracing::warn!("Incoming queue full, dropping message");
            }
        }
    }
}

async fn read_pump(session: ClientSession, generation: u64, mut stream: SplitStream<Socket>) {
    let pong_wait = session.inner.config.pong_wait;

    let failure = loop {
        let frame = match timeout(pong_wait, stream.next()).await {
            Err(_) => break Some(ClientError::ReadTimeout(pong_wait)),
            Ok(None) => break None,
            Ok(Some(Err(e))) => break Some(ClientError::ConnectionLost(e.to_string())),
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => session.inner.deliver(text.as_str()),
            Message::Binary(data) => session.inner.deliver(&String::from_utf8_lossy(&data)),
            Message::Close(_) => {
                tracing::info!("Server closed the connection");
                break None;
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
    };

    session.connection_lost(generation, Pump::Read, failure).await;
}

async fn write_pump(
    session: ClientSession,
    generation: u64,
    mut sink: SplitSink<Socket, Message>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let config = session.inner.config;

    let failure = {
        let mut pending = session.inner.pending.lock().await;
        let mut keepalive =
            time::interval_at(Instant::now() + config.ping_period, config.ping_period);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    let _ = timeout(config.write_wait, sink.send(Message::Close(None))).await;
                    break None;
                }
                next = pending.recv() => {
                    let Some(envelope) = next else { break None };
                    let json = match envelope.to_json() {
                        Ok(json) => json,
                        Err(e) => {
                            session.inner.report(ClientError::Serialization(e.to_string()));
                            continue;
                        }
                    };
                    if let Err(e) = send(&mut sink, Message::Text(json.into()), config.write_wait).await {
                        break Some(e);
                    }
                    tracing::debug!("Sent: {}", envelope.content);
                }
                _ = keepalive.tick() => {
                    if let Err(e) = send(&mut sink, Message::Ping(Default::default()), config.write_wait).await {
                        break Some(e);
                    }
                }
            }
        }
    };

    if let Some(e) = failure {
        session.connection_lost(generation, Pump::Write, Some(e)).await;
    }
}

async fn send(
    sink: &mut SplitSink<Socket, Message>,
    message: Message,
    write_wait: Duration,
) -> Result<(), ClientError> {
    match timeout(write_wait, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ClientError::ConnectionLost(e.to_string())),
        Err(_) => Err(ClientError::WriteTimeout(write_wait)),
    }
}
