// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Switchboard - connection registry and routing hub.
//!
//! Routes structured messages among many concurrently connected clients,
//! each identified by a unique numeric ID. Supports point-to-point delivery,
//! broadcast, and peer-ID discovery.
//!
//! # Architecture
//!
//! - **Hub**: a single actor task that exclusively owns the [`Registry`].
//!   Registration, removal and message handling are serialized through its
//!   event loop; nothing else touches the registry.
//! - **Connection**: one per client. Its read task forwards inbound frames
//!   to the hub and reports its own ID for removal when the transport fails.
//! - **Router**: a strategy picked at hub construction that decides where
//!   each inbound message goes ([`EnvelopeRouter`], [`RelayRouter`], or any
//!   closure).
//!
//! # Quick Start
//!
//! ```no_run
//! use switchboard::{EnvelopeRouter, Hub};
//! use switchboard::transport::memory::MemoryTransport;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let hub = Hub::new(EnvelopeRouter::new());
//!
//! let (transport, mut peer) = MemoryTransport::pair(16);
//! let id = hub.accept(transport)?;
//!
//! peer.send(r#"{"MsgType": 3}"#).await?;
//! let reply = peer.recv().await;
//! println!("connection {} got {:?}", id, reply);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod hub;
pub mod id;
pub mod registry;
pub mod router;
pub mod stats;
pub mod transport;

pub use config::HubConfig;
pub use connection::{Connection, ConnectionHandle, UserMessage};
pub use envelope::{Envelope, MsgType};
pub use error::{HubError, RouteError, TransportError};
pub use hub::Hub;
pub use id::{ConnectionId, IdGenerator};
pub use registry::Registry;
pub use router::{EnvelopeRouter, RelayRouter, RouteContext, Router};
pub use stats::{HubStats, HubStatsSnapshot};
pub use transport::{ChannelSink, MessageSink, MessageSource, Transport};
