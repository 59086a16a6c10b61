// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WebSocket transport.
//!
//! Adapts an upgraded axum [`WebSocket`] to the hub's transport seam:
//!
//! - Outbound frames go through a [`ChannelSink`] to a writer task that owns
//!   the socket's send half and writes each frame as a text message.
//! - Inbound text and binary messages are handed to the read task as bytes.
//!   Ping/pong are skipped, a close frame or end of stream is an orderly
//!   close, and a socket error is a transport failure.

use axum::extract::ws::{Message, WebSocket};
use futures::future::BoxFuture;
use futures::stream::{SplitSink, SplitStream};
use futures::{FutureExt, SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use switchboard::{ChannelSink, MessageSource, Transport, TransportError};
use tokio::sync::mpsc;
use tracing::debug;

/// One admitted client, counted against `max_clients` until dropped.
#[derive(Debug)]
pub struct ClientSlot {
    count: Arc<AtomicUsize>,
}

impl ClientSlot {
    /// Take a slot if fewer than `max` are held. `max == 0` means unlimited.
    pub fn acquire(count: &Arc<AtomicUsize>, max: usize) -> Option<Self> {
        count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (max == 0 || n < max).then_some(n + 1)
            })
            .ok()
            .map(|_| Self {
                count: Arc::clone(count),
            })
    }
}

impl Drop for ClientSlot {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}

/// An upgraded WebSocket, ready to be accepted by the hub.
pub struct WsTransport {
    socket: WebSocket,
    outbound_capacity: usize,
    slot: Option<ClientSlot>,
}

impl WsTransport {
    pub fn new(socket: WebSocket, outbound_capacity: usize) -> Self {
        Self {
            socket,
            outbound_capacity,
            slot: None,
        }
    }

    /// Hold `slot` for as long as the connection is being read.
    pub fn with_slot(mut self, slot: ClientSlot) -> Self {
        self.slot = Some(slot);
        self
    }
}

impl Transport for WsTransport {
    type Sink = ChannelSink;
    type Source = WsSource;

    fn open(self) -> Result<(ChannelSink, WsSource), TransportError> {
        let (ws_tx, ws_rx) = self.socket.split();
        let (sink, rx) = ChannelSink::channel(self.outbound_capacity);
        tokio::spawn(write_loop(ws_tx, rx));

        Ok((
            sink,
            WsSource {
                stream: ws_rx,
                _slot: self.slot,
            },
        ))
    }
}

/// Inbound half of a [`WsTransport`].
pub struct WsSource {
    stream: SplitStream<WebSocket>,
    _slot: Option<ClientSlot>,
}

impl MessageSource for WsSource {
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<Vec<u8>>, TransportError>> {
        async move {
            while let Some(msg) = self.stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => return Ok(Some(text.into_bytes())),
                    Ok(Message::Binary(data)) => return Ok(Some(data)),
                    Ok(Message::Close(_)) => return Ok(None),
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                        // Axum answers pings itself
                    }
                    Err(e) => return Err(TransportError::Io(e.to_string())),
                }
            }
            Ok(None)
        }
        .boxed()
    }
}

/// Drain the outbound queue onto the socket until either side goes away.
async fn write_loop(mut ws_tx: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(frame) = rx.recv().await {
        let msg = match String::from_utf8(frame) {
            Ok(text) => Message::Text(text),
            Err(e) => Message::Binary(e.into_bytes()),
        };
        if let Err(e) = ws_tx.send(msg).await {
            debug!(error = %e, "WebSocket write failed, stopping writer");
            break;
        }
    }
    let _ = ws_tx.close().await;
}
