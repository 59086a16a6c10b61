// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Transport seam.
//!
//! The hub never talks to sockets directly. A concrete transport (WebSocket,
//! in-memory, ...) turns an accepted connection into a pair of halves:
//!
//! - a [`MessageSink`], written only by the hub's dispatch path
//! - a [`MessageSource`], read only by the connection's own read task
//!
//! Sinks are non-blocking. Transports that need to await socket writes do
//! so in a writer task of their own, fed through a [`ChannelSink`].

use crate::error::TransportError;
use futures::future::BoxFuture;
use tokio::sync::mpsc;

pub mod memory;

/// Outbound half of a transport.
pub trait MessageSink: Send + Sync + 'static {
    /// Queue one discrete message for the peer.
    ///
    /// Must not block. Errors are reported, never retried.
    fn send(&self, frame: Vec<u8>) -> Result<(), TransportError>;
}

/// Inbound half of a transport.
pub trait MessageSource: Send + 'static {
    /// Wait for the next discrete message.
    ///
    /// `Ok(None)` signals an orderly close. Both `Ok(None)` and `Err` are
    /// terminal: the source is not polled again.
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<Vec<u8>>, TransportError>>;
}

/// A connection that can be opened into a sink/source pair.
pub trait Transport: Send + 'static {
    type Sink: MessageSink;
    type Source: MessageSource;

    /// Complete the handshake and split the connection.
    fn open(self) -> Result<(Self::Sink, Self::Source), TransportError>;
}

/// [`MessageSink`] backed by a bounded queue drained by a writer task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChannelSink {
    /// Wrap an existing queue sender.
    pub fn new(tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiving end for the writer task.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// True once the writer task has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl MessageSink for ChannelSink {
    fn send(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.tx.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}
