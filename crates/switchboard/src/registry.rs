// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection registry.
//!
//! Plain owned map, no interior locking: the hub actor is its only owner.

use crate::connection::Connection;
use crate::id::ConnectionId;
use std::collections::btree_map::{self, BTreeMap};

/// Mapping from [`ConnectionId`] to [`Connection`].
///
/// Ordered by ID, so [`ids`](Self::ids) is ascending without an extra sort.
#[derive(Debug, Default)]
pub struct Registry {
    connections: BTreeMap<ConnectionId, Connection>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection.
    ///
    /// An ID that is already present is refused and the connection handed
    /// back; the existing entry is left untouched.
    pub fn insert(&mut self, conn: Connection) -> Result<(), Connection> {
        match self.connections.entry(conn.id()) {
            btree_map::Entry::Occupied(_) => Err(conn),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(conn);
                Ok(())
            }
        }
    }

    /// Remove a connection. Absent IDs are a no-op.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    /// Look up a connection.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Check whether an ID is registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// All registered IDs, ascending.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
