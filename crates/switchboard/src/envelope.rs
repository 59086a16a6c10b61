// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Envelope wire protocol.
//!
//! JSON objects with capitalised field names:
//!
//! ```json
//! {"MsgType": 1, "DestinationID": 2, "SenderID": 1, "Payload": {"text": "hi"}}
//! {"MsgType": 3, "DestinationID": 1, "SenderID": 1, "Ids": [2, 3], "Payload": null}
//! ```
//!
//! | MsgType | meaning |
//! |---|---|
//! | 1 | Send to `DestinationID` |
//! | 2 | Broadcast to everyone |
//! | 3 | Fetch the IDs of the other connections |
//! | 4 | Error (hub to client) |
//!
//! `Type`, `To` and `From` are accepted on input as older spellings of
//! `MsgType`, `DestinationID` and `SenderID`. ID fields are plain integers;
//! `null` reads as 0, and zero or negative destinations name no connection.

use crate::error::RouteError;
use crate::id::ConnectionId;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Envelope kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    Send,
    Broadcast,
    FetchIds,
    Error,
}

impl MsgType {
    /// Wire code.
    pub const fn code(self) -> u8 {
        match self {
            MsgType::Send => 1,
            MsgType::Broadcast => 2,
            MsgType::FetchIds => 3,
            MsgType::Error => 4,
        }
    }

    /// Parse a wire code.
    pub const fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(MsgType::Send),
            2 => Some(MsgType::Broadcast),
            3 => Some(MsgType::FetchIds),
            4 => Some(MsgType::Error),
            _ => None,
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MsgType::Send => "send",
            MsgType::Broadcast => "broadcast",
            MsgType::FetchIds => "fetch_ids",
            MsgType::Error => "error",
        };
        f.write_str(name)
    }
}

impl Serialize for MsgType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for MsgType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u64::deserialize(deserializer)?;
        MsgType::from_code(code)
            .ok_or_else(|| de::Error::custom(format!("unknown MsgType {}", code)))
    }
}

/// Routing envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "MsgType", alias = "Type")]
    pub kind: MsgType,

    /// Target ID as sent. Ignored on Broadcast/FetchIDs requests, set on
    /// delivery. See [`destination_id`](Self::destination_id).
    #[serde(
        rename = "DestinationID",
        alias = "To",
        default,
        deserialize_with = "nullable_int"
    )]
    pub destination: i64,

    /// Always overwritten by the hub with the true sender.
    #[serde(
        rename = "SenderID",
        alias = "From",
        default,
        deserialize_with = "nullable_sender"
    )]
    pub sender: ConnectionId,

    /// Peer IDs, FetchIDs responses only.
    #[serde(rename = "Ids", default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<ConnectionId>>,

    /// Opaque application data.
    #[serde(rename = "Payload", default)]
    pub payload: serde_json::Value,
}

fn nullable_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0))
}

fn nullable_sender<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ConnectionId, D::Error> {
    let raw = nullable_int(deserializer)?;
    Ok(ConnectionId::from_wire(raw).unwrap_or(ConnectionId::HUB))
}

impl Envelope {
    /// Point-to-point delivery to `destination`.
    pub fn send(
        destination: ConnectionId,
        sender: ConnectionId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind: MsgType::Send,
            destination: destination.to_wire(),
            sender,
            ids: None,
            payload,
        }
    }

    /// One broadcast copy addressed to `destination`.
    pub fn broadcast(
        destination: ConnectionId,
        sender: ConnectionId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind: MsgType::Broadcast,
            destination: destination.to_wire(),
            sender,
            ids: None,
            payload,
        }
    }

    /// Reply to a FetchIDs request.
    pub fn ids_reply(
        requester: ConnectionId,
        ids: Vec<ConnectionId>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            kind: MsgType::FetchIds,
            destination: requester.to_wire(),
            sender: requester,
            ids: Some(ids),
            payload,
        }
    }

    /// Hub-originated error for `destination`.
    pub fn error(destination: ConnectionId, message: impl Into<String>) -> Self {
        Self {
            kind: MsgType::Error,
            destination: destination.to_wire(),
            sender: ConnectionId::HUB,
            ids: None,
            payload: serde_json::Value::String(message.into()),
        }
    }

    /// Error reply for a Send to an unknown destination. `missing` is the
    /// raw requested value.
    pub fn no_such_destination(sender: ConnectionId, missing: i64) -> Self {
        Self::error(sender, format!("no such destination {}", missing))
    }

    /// The addressed connection, if `destination` can name one.
    pub fn destination_id(&self) -> Option<ConnectionId> {
        ConnectionId::from_wire(self.destination)
    }

    /// Decode from raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, RouteError> {
        serde_json::from_slice(bytes).map_err(RouteError::Decode)
    }

    /// Encode to raw bytes.
    pub fn encode(&self) -> Result<Vec<u8>, RouteError> {
        serde_json::to_vec(self).map_err(RouteError::Encode)
    }
}
