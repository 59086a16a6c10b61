// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types.

use crate::id::ConnectionId;
use thiserror::Error;

/// Transport-level failures.
///
/// A read failure ends the connection; a write failure is logged and
/// otherwise ignored.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport closed")]
    Closed,

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Outbound queue full")]
    Backpressure,
}

/// Errors raised while routing a single inbound message.
///
/// These are contained to the message that caused them; the hub logs them
/// and carries on.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("Malformed envelope: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode envelope: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("No such connection: {0}")]
    NotFound(ConnectionId),

    #[error("Delivery failed: {0}")]
    Transport(#[from] TransportError),
}

/// Errors returned by the hub handle.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("No such connection: {0}")]
    NotFound(ConnectionId),

    #[error("Hub not running")]
    Stopped,
}
