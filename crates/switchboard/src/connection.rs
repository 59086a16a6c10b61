// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client connections.
//!
//! A [`Connection`] pairs an ID with the two halves of an opened transport.
//! Once registered with the hub, its inbound half moves into a dedicated
//! read task; the outbound half stays in the registry and is only written
//! from the hub's dispatch path. Dropping the connection stops its read task.

use crate::error::TransportError;
use crate::id::{ConnectionId, IdGenerator};
use crate::transport::{MessageSink, MessageSource, Transport};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};

/// Raw inbound message, tagged with the connection it arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    /// True sender, as known by the hub.
    pub sender: ConnectionId,
    /// Undecoded message bytes.
    pub payload: Vec<u8>,
}

/// Events emitted by a connection's read task.
///
/// Messages and the final close travel on the same queue so the hub sees a
/// connection's events in the order they happened.
#[derive(Debug)]
pub enum ReaderEvent {
    Message(UserMessage),
    Closed(ConnectionId),
}

/// A registered (or about to be registered) client endpoint.
pub struct Connection {
    id: ConnectionId,
    sink: Arc<dyn MessageSink>,
    source: Option<Box<dyn MessageSource>>,
    reader: Option<AbortHandle>,
}

impl Connection {
    /// Open `transport` and assign it the next ID from `ids`.
    ///
    /// Handshake failures are returned as-is and consume no ID.
    pub fn create<T: Transport>(ids: &IdGenerator, transport: T) -> Result<Self, TransportError> {
        let (sink, source) = transport.open()?;
        let id = ids.next();
        debug!(connection = %id, "Connection created");

        Ok(Self {
            id,
            sink: Arc::new(sink),
            source: Some(Box::new(source)),
            reader: None,
        })
    }

    /// Connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Best-effort single write. Returns whether the frame was accepted.
    ///
    /// Failures are logged and otherwise ignored: the peer's own read task
    /// is what reports a dead connection.
    pub fn send(&self, frame: Vec<u8>) -> bool {
        send_frame(self.id, self.sink.as_ref(), frame)
    }

    /// Cheap handle sharing this connection's outbound half.
    pub fn handle(&self) -> ConnectionHandle {
        ConnectionHandle {
            id: self.id,
            sink: Arc::clone(&self.sink),
        }
    }

    /// Start the read task, feeding `events`.
    ///
    /// Returns `None` if the read task was already started.
    pub fn spawn_read_loop(&mut self, events: mpsc::Sender<ReaderEvent>) -> Option<JoinHandle<()>> {
        let source = self.source.take()?;
        let task = tokio::spawn(read_loop(self.id, source, events));
        self.reader = Some(task.abort_handle());
        Some(task)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("reading", &self.reader.is_some())
            .finish()
    }
}

/// Outbound-only view of a registered connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sink: Arc<dyn MessageSink>,
}

impl ConnectionHandle {
    /// Connection ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Best-effort single write, same semantics as [`Connection::send`].
    pub fn send(&self, frame: Vec<u8>) -> bool {
        send_frame(self.id, self.sink.as_ref(), frame)
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .finish()
    }
}

fn send_frame(id: ConnectionId, sink: &dyn MessageSink, frame: Vec<u8>) -> bool {
    let len = frame.len();
    match sink.send(frame) {
        Ok(()) => {
            debug!(connection = %id, bytes = len, "Sent message to client");
            true
        }
        Err(e) => {
            warn!(connection = %id, error = %e, "Send to client failed");
            false
        }
    }
}

/// Forward every inbound frame to the hub until the transport ends, then
/// report the close exactly once.
async fn read_loop(
    id: ConnectionId,
    mut source: Box<dyn MessageSource>,
    events: mpsc::Sender<ReaderEvent>,
) {
    loop {
        match source.recv().await {
            Ok(Some(payload)) => {
                debug!(connection = %id, bytes = payload.len(), "Received message from client");
                let msg = UserMessage {
                    sender: id,
                    payload,
                };
                if events.send(ReaderEvent::Message(msg)).await.is_err() {
                    debug!(connection = %id, "Hub gone, stopping reader");
                    return;
                }
            }
            Ok(None) => {
                info!(connection = %id, "Client closed connection");
                break;
            }
            Err(e) => {
                warn!(connection = %id, error = %e, "Read from client failed");
                break;
            }
        }
    }

    let _ = events.send(ReaderEvent::Closed(id)).await;
}
