// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Routing strategies.
//!
//! A [`Router`] is chosen when the hub is built and runs inside the hub
//! actor, once per inbound message. It sees the registry only through a
//! [`RouteContext`], which is a consistent snapshot for the duration of
//! the call.

use crate::connection::{Connection, UserMessage};
use crate::envelope::{Envelope, MsgType};
use crate::error::RouteError;
use crate::id::ConnectionId;
use crate::registry::Registry;
use crate::stats::HubStats;
use tracing::{debug, warn};

/// Registry access handed to a router.
pub struct RouteContext<'a> {
    registry: &'a Registry,
    stats: &'a HubStats,
}

impl<'a> RouteContext<'a> {
    pub(crate) fn new(registry: &'a Registry, stats: &'a HubStats) -> Self {
        Self { registry, stats }
    }

    /// All registered IDs, ascending.
    pub fn lookup_all_ids(&self) -> Vec<ConnectionId> {
        self.registry.ids()
    }

    /// Look up a registered connection.
    pub fn get_connection(&self, id: ConnectionId) -> Result<&'a Connection, RouteError> {
        self.registry.get(id).ok_or(RouteError::NotFound(id))
    }

    /// Check whether an ID is registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.registry.contains(id)
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.registry.len()
    }

    /// Write raw bytes to a connection.
    ///
    /// Fails only when `id` is not registered. Transport write failures are
    /// logged and counted, not returned.
    pub fn deliver(&self, id: ConnectionId, frame: Vec<u8>) -> Result<(), RouteError> {
        let conn = self.get_connection(id)?;
        self.stats.record_delivery(conn.send(frame));
        Ok(())
    }

    /// Encode and write an envelope to a connection.
    pub fn deliver_envelope(&self, id: ConnectionId, envelope: &Envelope) -> Result<(), RouteError> {
        self.deliver(id, envelope.encode()?)
    }
}

/// Decides where inbound messages go.
pub trait Router: Send + 'static {
    /// Handle one inbound message.
    ///
    /// Errors are logged by the hub and never stop it.
    fn route(&mut self, ctx: &RouteContext<'_>, msg: UserMessage) -> Result<(), RouteError>;
}

impl<F> Router for F
where
    F: FnMut(&RouteContext<'_>, UserMessage) -> Result<(), RouteError> + Send + 'static,
{
    fn route(&mut self, ctx: &RouteContext<'_>, msg: UserMessage) -> Result<(), RouteError> {
        self(ctx, msg)
    }
}

/// Forwards every inbound frame verbatim to every connection, sender
/// included. No decoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct RelayRouter;

impl RelayRouter {
    pub fn new() -> Self {
        Self
    }
}

impl Router for RelayRouter {
    fn route(&mut self, ctx: &RouteContext<'_>, msg: UserMessage) -> Result<(), RouteError> {
        debug!(sender = %msg.sender, recipients = ctx.connection_count(), "Relaying message");
        for id in ctx.lookup_all_ids() {
            ctx.deliver(id, msg.payload.clone())?;
        }
        Ok(())
    }
}

/// Envelope protocol router: Send, Broadcast and FetchIDs.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeRouter {
    bounce_malformed: bool,
}

impl EnvelopeRouter {
    /// Router that silently drops (and logs) malformed input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also answer malformed input with an Error envelope.
    pub fn bounce_malformed(mut self, enabled: bool) -> Self {
        self.bounce_malformed = enabled;
        self
    }

    fn route_send(&self, ctx: &RouteContext<'_>, env: Envelope) -> Result<(), RouteError> {
        if let Some(destination) = env.destination_id().filter(|id| ctx.contains(*id)) {
            debug!(sender = %env.sender, destination = %destination, "Sending message");
            let out = Envelope::send(destination, env.sender, env.payload);
            return ctx.deliver_envelope(destination, &out);
        }

        debug!(sender = %env.sender, destination = env.destination, "Unknown destination");
        let reply = Envelope::no_such_destination(env.sender, env.destination);
        reply_to_sender(ctx, env.sender, &reply)
    }

    fn route_broadcast(&self, ctx: &RouteContext<'_>, env: Envelope) -> Result<(), RouteError> {
        let recipients = ctx.lookup_all_ids();
        debug!(sender = %env.sender, recipients = recipients.len(), "Broadcasting message");

        for id in recipients {
            let out = Envelope::broadcast(id, env.sender, env.payload.clone());
            ctx.deliver_envelope(id, &out)?;
        }
        Ok(())
    }

    fn route_fetch_ids(&self, ctx: &RouteContext<'_>, env: Envelope) -> Result<(), RouteError> {
        let ids: Vec<_> = ctx
            .lookup_all_ids()
            .into_iter()
            .filter(|id| *id != env.sender)
            .collect();
        debug!(sender = %env.sender, peers = ids.len(), "Sending peer ids");

        let reply = Envelope::ids_reply(env.sender, ids, env.payload);
        reply_to_sender(ctx, env.sender, &reply)
    }
}

impl Router for EnvelopeRouter {
    fn route(&mut self, ctx: &RouteContext<'_>, msg: UserMessage) -> Result<(), RouteError> {
        let mut env = match Envelope::decode(&msg.payload) {
            Ok(env) => env,
            Err(e) => {
                if self.bounce_malformed {
                    let reply = Envelope::error(msg.sender, format!("malformed envelope: {}", e));
                    reply_to_sender(ctx, msg.sender, &reply)?;
                }
                return Err(e);
            }
        };

        // Never trust a claimed identity.
        env.sender = msg.sender;

        match env.kind {
            MsgType::Send => self.route_send(ctx, env),
            MsgType::Broadcast => self.route_broadcast(ctx, env),
            MsgType::FetchIds => self.route_fetch_ids(ctx, env),
            MsgType::Error => {
                warn!(
                    sender = %env.sender,
                    payload = %env.payload,
                    "Ignoring client-originated error envelope"
                );
                Ok(())
            }
        }
    }
}

/// Best-effort reply; a sender that has already gone is not an error.
fn reply_to_sender(
    ctx: &RouteContext<'_>,
    sender: ConnectionId,
    reply: &Envelope,
) -> Result<(), RouteError> {
    match ctx.deliver_envelope(sender, reply) {
        Err(RouteError::NotFound(_)) => {
            debug!(sender = %sender, kind = %reply.kind, "Sender gone, dropping reply");
            Ok(())
        }
        other => other,
    }
}
