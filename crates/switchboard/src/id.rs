// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Connection identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier of a registered connection.
///
/// IDs start at 1. The value 0 is reserved: on the wire it means
/// "unset" in client requests and "the hub itself" in hub-originated
/// envelopes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Reserved ID, never assigned to a connection.
    pub const HUB: ConnectionId = ConnectionId(0);

    /// Wrap a raw ID (as read from the wire).
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// True for the reserved ID 0.
    pub const fn is_reserved(self) -> bool {
        self.0 == 0
    }

    /// Interpret a signed wire integer. Zero and negative values name no
    /// connection.
    pub fn from_wire(raw: i64) -> Option<Self> {
        u64::try_from(raw).ok().filter(|v| *v != 0).map(Self)
    }

    /// Signed wire integer for this ID.
    pub fn to_wire(self) -> i64 {
        i64::try_from(self.0).unwrap_or(i64::MAX)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<ConnectionId> for u64 {
    fn from(id: ConnectionId) -> Self {
        id.0
    }
}

/// Monotonic ID sequence.
///
/// The first call to [`next`](Self::next) yields 1, each later call yields
/// the previous value plus one. Values are never reused.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicU64,
}

impl IdGenerator {
    /// Create a generator whose first ID is 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Draw the next ID.
    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
