//! Connection registry and broadcast dispatcher.
//!
//! The [`Hub`] owns the set of live connections and is the only code that
//! touches it. Everyone else talks to it through a cloneable [`HubHandle`].
//! Membership changes travel on an unbounded control queue and are never
//! dropped. Broadcasts and name announcements travel on a bounded traffic
//! queue, so a peer that floods the hub stalls its own read pump instead of
//! growing the queue. Commands are applied one at a time, so the registry
//! needs no lock and is never observed half-updated.

use std::{
    collections::{HashMap, VecDeque},
    fmt,
};

use tokio::sync::{
    mpsc::{self, error::TrySendError},
    oneshot,
};
use uuid::Uuid;

use chatterbox_shared::message::Envelope;

use crate::{config::BROADCAST_BUFFER, error::HubError};

/// Identity of one live socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Sending half of a connection's outbound queue.
pub type Outbound = mpsc::Sender<String>;

enum HubCommand {
    Register { id: ConnectionId, outbound: Outbound },
    Unregister { id: ConnectionId },
    Count { reply: oneshot::Sender<usize> },
    Broadcast { payload: String },
    Identify { id: ConnectionId, name: String },
}

/// Cloneable entry point to a running [`Hub`].
#[derive(Clone)]
pub struct HubHandle {
    control: mpsc::UnboundedSender<HubCommand>,
    traffic: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Add a connection. The hub keeps the only sender of `outbound`, so the
    /// queue closes as soon as the connection leaves the registry.
    ///
    /// A registration is applied before any traffic queued after it.
    pub fn register(&self, id: ConnectionId, outbound: Outbound) -> Result<(), HubError> {
        self.send_control(HubCommand::Register { id, outbound })
    }

    /// Remove a connection and close its outbound queue. Unknown ids are ignored.
    pub fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.send_control(HubCommand::Unregister { id })
    }

    /// Number of registered connections once every membership change queued
    /// before this call has been applied.
    pub async fn connection_count(&self) -> Result<usize, HubError> {
        let (reply, response) = oneshot::channel();
        self.send_control(HubCommand::Count { reply })?;
        response.await.map_err(|_| HubError::Stopped)
    }

    /// Queue `payload` for every registered connection. Waits while the
    /// traffic queue is full.
    pub async fn broadcast(&self, payload: impl Into<String>) -> Result<(), HubError> {
        let payload = payload.into();
        self.send_traffic(HubCommand::Broadcast { payload }).await
    }

    /// Record the display name of a connection and rebroadcast the user list.
    /// Ordered with the broadcasts sent through this handle.
    pub async fn identify(&self, id: ConnectionId, name: impl Into<String>) -> Result<(), HubError> {
        let name = name.into();
        self.send_traffic(HubCommand::Identify { id, name }).await
    }

    fn send_control(&self, command: HubCommand) -> Result<(), HubError> {
        self.control.send(command).map_err(|_| HubError::Stopped)
    }

    async fn send_traffic(&self, command: HubCommand) -> Result<(), HubError> {
        self.traffic.send(command).await.map_err(|_| HubError::Stopped)
    }
}

struct RegistryEntry {
    outbound: Outbound,
    display_name: Option<String>,
}

/// The dispatcher loop. Create with [`Hub::new`] and drive with [`Hub::run`].
pub struct Hub {
    control: mpsc::UnboundedReceiver<HubCommand>,
    traffic: mpsc::Receiver<HubCommand>,
    registry: HashMap<ConnectionId, RegistryEntry>,
}

impl Hub {
    pub fn new() -> (Self, HubHandle) {
        Self::with_broadcast_buffer(BROADCAST_BUFFER)
    }

    /// Like [`Hub::new`] with room for `capacity` queued broadcasts.
    pub fn with_broadcast_buffer(capacity: usize) -> (Self, HubHandle) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (traffic_tx, traffic_rx) = mpsc::channel(capacity.max(1));
        let hub = Self {
            control: control_rx,
            traffic: traffic_rx,
            registry: HashMap::new(),
        };
        let handle = HubHandle {
            control: control_tx,
            traffic: traffic_tx,
        };
        (hub, handle)
    }

    /// Start the loop on the current runtime and return its handle.
    pub fn spawn() -> HubHandle {
        let (hub, handle) = Self::new();
        tokio::spawn(hub.run());
        handle
    }

    /// Apply commands until every [`HubHandle`] is dropped. Pending control
    /// commands always go first.
    pub async fn run(mut self) {
        loop {
            let command = tokio::select! {
                biased;
                Some(command) = self.control.recv() => command,
                Some(command) = self.traffic.recv() => command,
                else => break,
            };
            self.apply(command);
        }
        tracing::info!("Hub stopped with {} clients registered", self.registry.len());
    }

    fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { id, outbound } => self.register(id, outbound),
            HubCommand::Unregister { id } => self.unregister(id),
            HubCommand::Count { reply } => {
                let _ = reply.send(self.registry.len());
            }
            HubCommand::Broadcast { payload } => self.broadcast([payload]),
            HubCommand::Identify { id, name } => self.identify(id, name),
        }
    }

    fn register(&mut self, id: ConnectionId, outbound: Outbound) {
        let entry = RegistryEntry {
            outbound,
            display_name: None,
        };
        if self.registry.insert(id, entry).is_some() {
            tracing::warn!("Client {} registered twice, replacing previous queue", id);
        }
        tracing::info!(
            "Client {} connected. Total clients: {}",
            id,
            self.registry.len()
        );
    }

    fn unregister(&mut self, id: ConnectionId) {
        let Some(entry) = self.registry.remove(&id) else {
            tracing::debug!("Client {} already unregistered", id);
            return;
        };
        tracing::info!(
            "Client {} disconnected. Total clients: {}",
            id,
            self.registry.len()
        );
        if let Some(name) = entry.display_name {
            let notices = self.departure_notices(&name);
            self.broadcast(notices);
        }
    }

    fn identify(&mut self, id: ConnectionId, name: String) {
        match self.registry.get_mut(&id) {
            Some(entry) => {
                tracing::info!("Client {} is now known as '{}'", id, name);
                entry.display_name = Some(name);
            }
            None => {
                tracing::debug!("Ignoring name '{}' for unregistered client {}", name, id);
                return;
            }
        }
        if let Some(roster) = encode(&Envelope::user_list(self.user_names())) {
            self.broadcast([roster]);
        }
    }

    /// Deliver each payload to every registered connection. Connections whose
    /// queue is full are evicted, and the departure of a named one queues its
    /// notices behind the current payloads.
    fn broadcast(&mut self, payloads: impl IntoIterator<Item = String>) {
        let mut pending: VecDeque<String> = payloads.into_iter().collect();
        while let Some(payload) = pending.pop_front() {
            for name in self.deliver(payload) {
                pending.extend(self.departure_notices(&name));
            }
        }
    }

    /// Returns the display names of evicted connections.
    fn deliver(&mut self, payload: String) -> Vec<String> {
        tracing::debug!("Broadcasting message to {} clients", self.registry.len());

        let mut stalled = Vec::new();
        for (id, entry) in &self.registry {
            match entry.outbound.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Client {} is not keeping up, evicting", id);
                    stalled.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Client {} outbound queue already closed", id);
                    stalled.push(*id);
                }
            }
        }

        let evicted: Vec<String> = stalled
            .into_iter()
            .filter_map(|id| self.registry.remove(&id))
            .filter_map(|entry| entry.display_name)
            .collect();
        if !evicted.is_empty() {
            tracing::info!("Total clients after eviction: {}", self.registry.len());
        }
        evicted
    }

    fn departure_notices(&self, name: &str) -> Vec<String> {
        [
            Envelope::system(format!("{} left the chat", name)),
            Envelope::user_list(self.user_names()),
        ]
        .iter()
        .filter_map(encode)
        .collect()
    }

    /// Display names of named connections, sorted for a stable order.
    fn user_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .registry
            .values()
            .filter_map(|entry| entry.display_name.clone())
            .collect();
        names.sort();
        names
    }
}

fn encode(envelope: &Envelope) -> Option<String> {
    match envelope.to_json() {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to serialize {:?} message: {}", envelope.kind, e);
            None
        }
    }
}
