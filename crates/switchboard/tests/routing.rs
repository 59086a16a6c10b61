// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters

//! End-to-end hub tests over the in-memory transport.
//!
//! Every client is a `MemoryPeer` connected to a live hub, so these exercise
//! the read tasks, the actor loop and the envelope router together.

use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;
use switchboard::transport::memory::{MemoryPeer, MemoryTransport};
use switchboard::{ConnectionId, Envelope, EnvelopeRouter, Hub, HubConfig, MsgType, RelayRouter};

const TIMEOUT: Duration = Duration::from_secs(5);

fn id(raw: u64) -> ConnectionId {
    ConnectionId::new(raw)
}

/// Connect `n` clients and wait until all are registered.
async fn connect_all(hub: &Hub, n: usize) -> Vec<MemoryPeer> {
    let mut peers = Vec::with_capacity(n);
    for _ in 0..n {
        let (transport, peer) = MemoryTransport::pair(64);
        hub.accept(transport).expect("accept");
        peers.push(peer);
    }
    assert_eq!(hub.connection_count().await.unwrap(), n);
    peers
}

async fn recv_envelope(peer: &mut MemoryPeer) -> Envelope {
    let frame = tokio::time::timeout(TIMEOUT, peer.recv())
        .await
        .expect("timed out waiting for envelope")
        .expect("hub side closed");
    Envelope::decode(&frame).expect("decode envelope")
}

/// Wait until the hub has routed `count` inbound messages in total.
async fn wait_for_received(hub: &Hub, count: u64) {
    for _ in 0..400 {
        if hub.stats().snapshot().messages_received >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("hub never routed {} messages", count);
}

fn assert_silent(peer: &mut MemoryPeer) {
    assert!(peer.try_recv().is_none(), "unexpected frame");
}

#[tokio::test]
async fn ids_are_sequential_without_gaps() {
    let hub = Hub::new(EnvelopeRouter::new());
    let _peers = connect_all(&hub, 10).await;

    let ids = hub.lookup_all_ids().await.unwrap();
    let expected: Vec<_> = (1..=10).map(id).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn removing_absent_id_changes_nothing() {
    let hub = Hub::new(EnvelopeRouter::new());
    let _peers = connect_all(&hub, 3).await;

    hub.remove_connection(id(42));
    hub.remove_connection(ConnectionId::HUB);

    assert_eq!(hub.lookup_all_ids().await.unwrap(), vec![id(1), id(2), id(3)]);
}

#[tokio::test]
async fn explicit_removal_stops_dispatch() {
    let hub = Hub::new(EnvelopeRouter::new());
    let mut peers = connect_all(&hub, 2).await;

    hub.remove_connection(id(2));
    assert_eq!(hub.lookup_all_ids().await.unwrap(), vec![id(1)]);

    peers[0]
        .send(r#"{"MsgType": 1, "DestinationID": 2, "Payload": "x"}"#)
        .await
        .unwrap();

    let got = recv_envelope(&mut peers[0]).await;
    assert_eq!(got.kind, MsgType::Error);
    assert!(peers[1].try_recv().is_none());
}

#[tokio::test]
async fn broadcast_reaches_everyone_once() {
    // connections 1,2,3; 2 broadcasts "hi"
    let hub = Hub::new(EnvelopeRouter::new());
    let mut peers = connect_all(&hub, 3).await;

    peers[1]
        .send(r#"{"MsgType": 2, "Payload": "hi"}"#)
        .await
        .unwrap();

    for (i, peer) in peers.iter_mut().enumerate() {
        let got = recv_envelope(peer).await;
        assert_eq!(got.kind, MsgType::Broadcast);
        assert_eq!(got.sender, id(2));
        assert_eq!(got.destination_id(), Some(id(i as u64 + 1)));
        assert_eq!(got.payload, json!("hi"));
    }
    for peer in peers.iter_mut() {
        assert_silent(peer);
    }
}

#[tokio::test]
async fn send_reaches_only_destination() {
    let hub = Hub::new(EnvelopeRouter::new());
    let mut peers = connect_all(&hub, 3).await;

    peers[0]
        .send(r#"{"MsgType": 1, "DestinationID": 3, "Payload": {"n": 1}}"#)
        .await
        .unwrap();

    let got = recv_envelope(&mut peers[2]).await;
    assert_eq!(got.kind, MsgType::Send);
    assert_eq!(got.sender, id(1));
    assert_eq!(got.payload, json!({"n": 1}));

    assert_silent(&mut peers[0]);
    assert_silent(&mut peers[1]);
    assert_silent(&mut peers[2]);
}

#[tokio::test]
async fn send_to_absent_destination_errors_to_sender() {
    // connections 1,2; 1 sends to 5
    let hub = Hub::new(EnvelopeRouter::new());
    let mut peers = connect_all(&hub, 2).await;

    peers[0]
        .send(r#"{"MsgType": 1, "DestinationID": 5, "Payload": "x"}"#)
        .await
        .unwrap();

    let got = recv_envelope(&mut peers[0]).await;
    assert_eq!(got.kind, MsgType::Error);
    assert_eq!(got.destination_id(), Some(id(1)));
    assert_eq!(got.sender, ConnectionId::HUB);
    assert!(got.payload.as_str().unwrap().contains('5'));

    assert_silent(&mut peers[0]);
    assert_silent(&mut peers[1]);
}

#[tokio::test]
async fn send_to_unusable_destination_errors_to_sender() {
    let hub = Hub::new(EnvelopeRouter::new());
    let mut peers = connect_all(&hub, 2).await;

    peers[0]
        .send(r#"{"MsgType": 1, "DestinationID": -1, "Payload": "x"}"#)
        .await
        .unwrap();
    let got = recv_envelope(&mut peers[0]).await;
    assert_eq!(got.kind, MsgType::Error);
    assert_eq!(got.payload, json!("no such destination -1"));

    peers[0]
        .send(r#"{"MsgType": 1, "DestinationID": null, "Payload": "x"}"#)
        .await
        .unwrap();
    let got = recv_envelope(&mut peers[0]).await;
    assert_eq!(got.kind, MsgType::Error);
    assert_eq!(got.payload, json!("no such destination 0"));

    assert_silent(&mut peers[0]);
    assert_silent(&mut peers[1]);
    assert_eq!(hub.stats().snapshot().decode_errors, 0);
}

#[tokio::test]
async fn fetch_ids_excludes_requester() {
    // connections 1,2,3; 3 fetches ids
    let hub = Hub::new(EnvelopeRouter::new());
    let mut peers = connect_all(&hub, 3).await;

    peers[2].send(r#"{"MsgType": 3}"#).await.unwrap();

    let got = recv_envelope(&mut peers[2]).await;
    assert_eq!(got.kind, MsgType::FetchIds);
    assert_eq!(got.ids, Some(vec![id(1), id(2)]));

    assert_silent(&mut peers[0]);
    assert_silent(&mut peers[1]);
}

#[tokio::test]
async fn fetch_ids_sorted_after_churn() {
    let hub = Hub::new(EnvelopeRouter::new());
    let mut peers = connect_all(&hub, 5).await;

    // Drop 2 and 4, then add 6.
    peers[1].close();
    peers[3].close();
    for _ in 0..200 {
        if hub.connection_count().await.unwrap() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let (transport, _late) = MemoryTransport::pair(8);
    assert_eq!(hub.accept(transport).unwrap(), id(6));

    peers[4].send(r#"{"MsgType": 3}"#).await.unwrap();
    let got = recv_envelope(&mut peers[4]).await;
    assert_eq!(got.ids, Some(vec![id(1), id(3), id(6)]));
}

#[tokio::test]
async fn malformed_input_gets_no_reply() {
    let hub = Hub::new(EnvelopeRouter::new());
    let mut peers = connect_all(&hub, 2).await;

    peers[0].send("{{{ not json").await.unwrap();
    peers[0]
        .send(r#"{"MsgType": 4, "Payload": "client error"}"#)
        .await
        .unwrap();
    wait_for_received(&hub, 2).await;

    assert_silent(&mut peers[0]);
    assert_silent(&mut peers[1]);
    assert_eq!(hub.stats().snapshot().decode_errors, 1);

    // The hub is still routing afterwards.
    peers[0].send(r#"{"MsgType": 3}"#).await.unwrap();
    assert_eq!(recv_envelope(&mut peers[0]).await.ids, Some(vec![id(2)]));
}

#[tokio::test]
async fn malformed_input_bounced_when_configured() {
    let hub = Hub::new(EnvelopeRouter::new().bounce_malformed(true));
    let mut peers = connect_all(&hub, 1).await;

    peers[0].send("nope").await.unwrap();
    let got = recv_envelope(&mut peers[0]).await;
    assert_eq!(got.kind, MsgType::Error);
}

#[tokio::test]
async fn read_failure_deregisters() {
    let hub = Hub::new(EnvelopeRouter::new());
    let mut peers = connect_all(&hub, 2).await;

    peers[0].fail("connection reset").await;
    for _ in 0..200 {
        if hub.lookup_all_ids().await.unwrap() == vec![id(2)] {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(hub.lookup_all_ids().await.unwrap(), vec![id(2)]);
    assert!(hub.get_connection(id(1)).await.is_err());
}

#[tokio::test]
async fn stalled_reader_does_not_block_others() {
    let hub = Hub::new(EnvelopeRouter::new());
    let mut fast = connect_all(&hub, 1).await;

    // Client 2 never reads and has room for a single frame.
    let (transport, _stalled) = MemoryTransport::pair(1);
    hub.accept(transport).unwrap();
    fast.extend(connect_all_after(&hub, 1).await);

    for n in 0..3 {
        let msg = json!({"MsgType": 2, "Payload": n});
        fast[0].send(msg.to_string()).await.unwrap();
    }

    for n in 0..3 {
        assert_eq!(recv_envelope(&mut fast[0]).await.payload, json!(n));
        assert_eq!(recv_envelope(&mut fast[1]).await.payload, json!(n));
    }

    // Failed writes are counted but never deregister.
    let snapshot = hub.stats().snapshot();
    assert_eq!(snapshot.delivery_failures, 2);
    assert_eq!(hub.connection_count().await.unwrap(), 3);
}

#[tokio::test]
async fn relay_router_echoes_raw_frames() {
    let hub = Hub::new(RelayRouter::new());
    let mut peers = connect_all(&hub, 3).await;

    peers[0].send("hello everyone").await.unwrap();

    for peer in peers.iter_mut() {
        let frame = tokio::time::timeout(TIMEOUT, peer.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frame, b"hello everyone".to_vec());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_senders_lose_nothing() {
    const CLIENTS: u64 = 8;
    const MESSAGES: u64 = 50;

    let config = HubConfig {
        inbound_capacity: 4,
        ..Default::default()
    };
    let hub = Hub::with_config(EnvelopeRouter::new(), config);

    // Client 1 is the sink; clients 2..=CLIENTS+1 send to it.
    let (transport, mut sink) = MemoryTransport::pair((CLIENTS * MESSAGES) as usize);
    hub.accept(transport).unwrap();
    let senders = connect_all_after(&hub, CLIENTS as usize).await;

    let tasks: Vec<_> = senders
        .into_iter()
        .map(|peer| {
            tokio::spawn(async move {
                for n in 0..MESSAGES {
                    let msg = json!({"MsgType": 1, "DestinationID": 1, "Payload": n});
                    peer.send(msg.to_string()).await.unwrap();
                }
                peer
            })
        })
        .collect();

    let mut _keep = Vec::new();
    for task in tasks {
        _keep.push(task.await.unwrap());
    }

    let mut seen = HashSet::new();
    let mut last_per_sender = std::collections::HashMap::new();
    for _ in 0..(CLIENTS * MESSAGES) {
        let got = recv_envelope(&mut sink).await;
        let n = got.payload.as_u64().unwrap();
        assert!(seen.insert((got.sender, n)), "duplicate delivery");

        // Per-sender order is preserved.
        if let Some(prev) = last_per_sender.insert(got.sender, n) {
            assert!(n > prev, "out of order from {}", got.sender);
        }
    }
    assert_eq!(seen.len() as u64, CLIENTS * MESSAGES);
    assert_eq!(
        hub.stats().snapshot().messages_received,
        CLIENTS * MESSAGES
    );
}

async fn connect_all_after(hub: &Hub, n: usize) -> Vec<MemoryPeer> {
    let before = hub.connection_count().await.unwrap();
    let mut peers = Vec::with_capacity(n);
    for _ in 0..n {
        let (transport, peer) = MemoryTransport::pair(64);
        hub.accept(transport).unwrap();
        peers.push(peer);
    }
    assert_eq!(hub.connection_count().await.unwrap(), before + n);
    peers
}
