// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Hub statistics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Live counters, updated by the hub actor and read from anywhere.
#[derive(Debug)]
pub struct HubStats {
    /// Connections registered.
    pub connections_added: AtomicU64,

    /// Connections removed.
    pub connections_removed: AtomicU64,

    /// Inbound messages handed to the router.
    pub messages_received: AtomicU64,

    /// Frames accepted by a connection's transport.
    pub messages_delivered: AtomicU64,

    /// Frames the transport refused.
    pub delivery_failures: AtomicU64,

    /// Inbound messages that could not be decoded.
    pub decode_errors: AtomicU64,

    /// Other router failures.
    pub routing_errors: AtomicU64,

    /// Hub start time.
    pub started: Instant,
}

impl HubStats {
    /// Create zeroed stats.
    pub fn new() -> Self {
        Self {
            connections_added: AtomicU64::new(0),
            connections_removed: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            routing_errors: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub(crate) fn record_delivery(&self, delivered: bool) {
        if delivered {
            self.messages_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.delivery_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> HubStatsSnapshot {
        HubStatsSnapshot {
            connections_added: self.connections_added.load(Ordering::Relaxed),
            connections_removed: self.connections_removed.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            routing_errors: self.routing_errors.load(Ordering::Relaxed),
            uptime_secs: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for HubStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of hub statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HubStatsSnapshot {
    pub connections_added: u64,
    pub connections_removed: u64,
    pub messages_received: u64,
    pub messages_delivered: u64,
    pub delivery_failures: u64,
    pub decode_errors: u64,
    pub routing_errors: u64,
    pub uptime_secs: u64,
}

impl HubStatsSnapshot {
    /// Connections currently registered, according to the counters.
    pub fn active_connections(&self) -> u64 {
        self.connections_added
            .saturating_sub(self.connections_removed)
    }
}
