// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hub actor.
//!
//! One task owns the [`Registry`] and processes, one at a time:
//!
//! - control commands from [`Hub`] handles (add, remove, queries)
//! - events from connection read tasks (inbound message, connection closed)
//!
//! Each event is handled to completion before the next is taken, so the
//! router always sees a consistent registry. The registry is never shared,
//! so no lock is involved.

use crate::config::HubConfig;
use crate::connection::{Connection, ConnectionHandle, ReaderEvent, UserMessage};
use crate::error::{HubError, RouteError, TransportError};
use crate::id::{ConnectionId, IdGenerator};
use crate::registry::Registry;
use crate::router::{RouteContext, Router};
use crate::stats::HubStats;
use crate::transport::Transport;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

enum Control {
    Add(Connection),
    Remove(ConnectionId),
    LookupIds(oneshot::Sender<Vec<ConnectionId>>),
    Get(ConnectionId, oneshot::Sender<Option<ConnectionHandle>>),
}

/// Handle to a running hub. Cheap to clone.
#[derive(Clone)]
pub struct Hub {
    control: mpsc::UnboundedSender<Control>,
    ids: Arc<IdGenerator>,
    stats: Arc<HubStats>,
    config: Arc<HubConfig>,
}

impl Hub {
    /// Start a hub with default configuration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R: Router>(router: R) -> Self {
        Self::with_config(router, HubConfig::default())
    }

    /// Start a hub.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_config<R: Router>(router: R, config: HubConfig) -> Self {
        let stats = Arc::new(HubStats::new());
        let (actor, control_tx) = HubActor::new(router, &config, Arc::clone(&stats));
        tokio::spawn(actor.run());

        Self {
            control: control_tx,
            ids: Arc::new(IdGenerator::new()),
            stats,
            config: Arc::new(config),
        }
    }

    /// The hub's ID sequence, for [`Connection::create`].
    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    /// Hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Live statistics.
    pub fn stats(&self) -> &HubStats {
        &self.stats
    }

    /// Open `transport`, assign it an ID and hand it to the hub.
    pub fn accept<T: Transport>(&self, transport: T) -> Result<ConnectionId, TransportError> {
        let conn = Connection::create(&self.ids, transport)?;
        let id = conn.id();
        self.add_connection(conn);
        Ok(id)
    }

    /// Hand a connection to the hub for registration. Returns immediately.
    pub fn add_connection(&self, conn: Connection) {
        let id = conn.id();
        if self.control.send(Control::Add(conn)).is_err() {
            warn!(connection = %id, "Hub not running, dropping connection");
        }
    }

    /// Deregister a connection and stop its read task. Unknown IDs are
    /// ignored.
    ///
    /// Messages the connection had queued but the hub had not yet handled
    /// are dropped.
    pub fn remove_connection(&self, id: ConnectionId) {
        if self.control.send(Control::Remove(id)).is_err() {
            debug!(connection = %id, "Hub not running, nothing to remove");
        }
    }

    /// Look up a registered connection.
    pub async fn get_connection(&self, id: ConnectionId) -> Result<ConnectionHandle, HubError> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::Get(id, tx))
            .map_err(|_| HubError::Stopped)?;
        rx.await
            .map_err(|_| HubError::Stopped)?
            .ok_or(HubError::NotFound(id))
    }

    /// All registered IDs, ascending.
    pub async fn lookup_all_ids(&self) -> Result<Vec<ConnectionId>, HubError> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control::LookupIds(tx))
            .map_err(|_| HubError::Stopped)?;
        rx.await.map_err(|_| HubError::Stopped)
    }

    /// Number of registered connections.
    pub async fn connection_count(&self) -> Result<usize, HubError> {
        Ok(self.lookup_all_ids().await?.len())
    }
}

struct HubActor<R> {
    registry: Registry,
    router: R,
    control: mpsc::UnboundedReceiver<Control>,
    events: mpsc::Receiver<ReaderEvent>,
    /// Cloned into each read task. Dropped once no handle can add more
    /// connections, so the loop ends when the last reader does.
    events_tx: Option<mpsc::Sender<ReaderEvent>>,
    stats: Arc<HubStats>,
}

impl<R: Router> HubActor<R> {
    fn new(
        router: R,
        config: &HubConfig,
        stats: Arc<HubStats>,
    ) -> (Self, mpsc::UnboundedSender<Control>) {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::channel(config.inbound_capacity.max(1));

        let actor = Self {
            registry: Registry::new(),
            router,
            control: control_rx,
            events: events_rx,
            events_tx: Some(events_tx),
            stats,
        };
        (actor, control_tx)
    }

    async fn run(mut self) {
        info!("Hub started");

        loop {
            tokio::select! {
                cmd = self.control.recv(), if self.events_tx.is_some() => match cmd {
                    Some(cmd) => self.handle_control(cmd),
                    None => {
                        debug!("All hub handles dropped");
                        self.events_tx = None;
                    }
                },
                event = self.events.recv() => match event {
                    Some(ReaderEvent::Message(msg)) => self.handle_message(msg),
                    Some(ReaderEvent::Closed(id)) => self.remove(id),
                    None => break,
                },
            }
        }

        info!("Hub stopped");
    }

    fn handle_control(&mut self, cmd: Control) {
        match cmd {
            Control::Add(conn) => self.add(conn),
            Control::Remove(id) => self.remove(id),
            Control::LookupIds(reply) => {
                let _ = reply.send(self.registry.ids());
            }
            Control::Get(id, reply) => {
                let _ = reply.send(self.registry.get(id).map(Connection::handle));
            }
        }
    }

    fn add(&mut self, mut conn: Connection) {
        let id = conn.id();
        if self.registry.contains(id) {
            error!(connection = %id, "Duplicate connection id, refusing registration");
            return;
        }
        let Some(events) = self.events_tx.clone() else {
            return;
        };

        conn.spawn_read_loop(events);
        if self.registry.insert(conn).is_ok() {
            HubStats::incr(&self.stats.connections_added);
            info!(connection = %id, total = self.registry.len(), "Connection added");
        }
    }

    fn remove(&mut self, id: ConnectionId) {
        if self.registry.remove(id).is_some() {
            HubStats::incr(&self.stats.connections_removed);
            info!(connection = %id, total = self.registry.len(), "Connection removed");
        } else {
            debug!(connection = %id, "Connection already removed");
        }
    }

    fn handle_message(&mut self, msg: UserMessage) {
        HubStats::incr(&self.stats.messages_received);
        let sender = msg.sender;

        if !self.registry.contains(sender) {
            debug!(connection = %sender, "Dropping message from removed connection");
            return;
        }

        let ctx = RouteContext::new(&self.registry, &self.stats);
        let router = &mut self.router;
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| router.route(&ctx, msg)));

        match result {
            Ok(Ok(())) => {}
            Ok(Err(RouteError::Decode(e))) => {
                HubStats::incr(&self.stats.decode_errors);
                warn!(connection = %sender, error = %e, "Dropping malformed message");
            }
            Ok(Err(e)) => {
                HubStats::incr(&self.stats.routing_errors);
                warn!(connection = %sender, error = %e, "Routing failed");
            }
            Err(_) => {
                HubStats::incr(&self.stats.routing_errors);
                error!(connection = %sender, "Router panicked, message dropped");
            }
        }
    }
}
