// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-process transport.
//!
//! [`MemoryTransport::pair`] returns the hub-side transport and a
//! [`MemoryPeer`] that plays the remote client: it pushes inbound frames,
//! reads whatever the hub sends back, and can close or fail the connection.

use super::{ChannelSink, MessageSource, Transport};
use crate::error::TransportError;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc;

type Frame = Result<Vec<u8>, TransportError>;

/// Hub-side end of an in-memory connection.
pub struct MemoryTransport {
    inbound: mpsc::Receiver<Frame>,
    outbound: mpsc::Sender<Vec<u8>>,
}

/// Client-side end of an in-memory connection.
pub struct MemoryPeer {
    tx: Option<mpsc::Sender<Frame>>,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl MemoryTransport {
    /// Create a connected transport/peer pair. `capacity` bounds both
    /// directions.
    pub fn pair(capacity: usize) -> (MemoryTransport, MemoryPeer) {
        let capacity = capacity.max(1);
        let (in_tx, in_rx) = mpsc::channel(capacity);
        let (out_tx, out_rx) = mpsc::channel(capacity);
        (
            MemoryTransport {
                inbound: in_rx,
                outbound: out_tx,
            },
            MemoryPeer {
                tx: Some(in_tx),
                rx: out_rx,
            },
        )
    }
}

impl Transport for MemoryTransport {
    type Sink = ChannelSink;
    type Source = MemorySource;

    fn open(self) -> Result<(ChannelSink, MemorySource), TransportError> {
        if self.outbound.is_closed() {
            return Err(TransportError::Handshake("peer went away".into()));
        }
        Ok((
            ChannelSink::new(self.outbound),
            MemorySource {
                inbound: self.inbound,
            },
        ))
    }
}

/// Inbound half of a [`MemoryTransport`].
pub struct MemorySource {
    inbound: mpsc::Receiver<Frame>,
}

impl MessageSource for MemorySource {
    fn recv(&mut self) -> BoxFuture<'_, Result<Option<Vec<u8>>, TransportError>> {
        async move {
            match self.inbound.recv().await {
                Some(Ok(frame)) => Ok(Some(frame)),
                Some(Err(e)) => Err(e),
                None => Ok(None),
            }
        }
        .boxed()
    }
}

impl MemoryPeer {
    /// Send a frame to the hub, waiting for queue space.
    pub async fn send(&self, frame: impl Into<Vec<u8>>) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(Ok(frame.into()))
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Wait for the next frame from the hub. `None` once the hub side is gone.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    /// Take a frame if one is already queued.
    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }

    /// Close the connection in an orderly way.
    pub fn close(&mut self) {
        self.tx = None;
    }

    /// Make the hub's next read fail with an I/O error.
    pub async fn fail(&mut self, reason: impl Into<String>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(TransportError::Io(reason.into()))).await;
        }
    }
}
