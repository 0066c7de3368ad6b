//! Drives the session manager over the in-process channel connection, so
//! every payload crosses the wire encoding.

use chrono::{DateTime, Utc};
use mua2fa_protocol::{Profile, User, Uuid};
use mua2fa_record::{KeyPair, Record};
use mua2fa_session::{Outcome, SessionConfig, SessionManager};
use mua2fa_transport::{
    ChannelConnection, ChannelPeer, ClientboundPayload, ConnectionId, DisconnectReason,
    PeerEvent, ServerboundPayload, channel_pair,
};
use tokio::sync::mpsc;

fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

const T0: i64 = 1_800_000_000;

fn connect(
    n: u64,
    name: &str,
) -> (
    ChannelConnection,
    ChannelPeer,
    mpsc::UnboundedReceiver<mua2fa_transport::InboundFrame>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    let profile = Profile::new(Uuid::from_u128(n as u128), name).unwrap();
    let (conn, peer) = channel_pair(ConnectionId::new(n), profile, tx);
    (conn, peer, rx)
}

async fn next_request(peer: &mut ChannelPeer) -> mua2fa_transport::RequestRecord {
    match peer.recv().await.unwrap() {
        Some(PeerEvent::Payload(ClientboundPayload::RequestRecord(req))) => req,
        other => panic!("expected a record request, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cache_bypass_round_trip_finishes_with_identity() {
    let keys = KeyPair::generate();
    let mut mgr = SessionManager::new(keys.clone(), SessionConfig::default());
    let (conn, mut peer, mut inbound) = connect(1, "Steve");

    mgr.start(conn.clone(), at(T0)).unwrap();
    let request = next_request(&mut peer).await;

    // The client already holds a record signed by the same key.
    let stored = Record::sign(
        User::new("mua:1001", "Steve", "steve@example.com"),
        peer.profile().clone(),
        at(T0 + 86_400),
        &keys,
    )
    .unwrap();
    assert!(stored
        .verify(peer.profile(), &request.key)
        .is_valid_at(at(T0)));
    peer.send(&ServerboundPayload::ResponseRecord(stored.clone()))
        .unwrap();

    let frame = inbound.recv().await.unwrap();
    let ServerboundPayload::ResponseRecord(record) = frame.decode().unwrap() else {
        panic!("expected a record response");
    };
    let outcome = mgr.handle_record(&conn, record, at(T0 + 1)).unwrap();

    assert_eq!(
        outcome,
        Outcome::Finished {
            identifier: Some("mua:1001".into())
        }
    );
    assert_eq!(
        peer.recv().await.unwrap(),
        Some(PeerEvent::Payload(ClientboundPayload::RequestRefresh(stored)))
    );
    assert_eq!(peer.recv().await.unwrap(), Some(PeerEvent::TaskFinished));
}

#[tokio::test]
async fn test_cancel_round_trip_with_required_auth_disconnects() {
    let keys = KeyPair::generate();
    let config = SessionConfig {
        require_union_auth: true,
        ..SessionConfig::default()
    };
    let mut mgr = SessionManager::new(keys, config);
    let (conn, mut peer, mut inbound) = connect(2, "Alex");

    mgr.start(conn.clone(), at(T0)).unwrap();
    let request = next_request(&mut peer).await;
    let hinted = request.state.with_hints("cancelled", "done").unwrap();
    peer.send(&ServerboundPayload::ResponseCancel(hinted)).unwrap();

    let ServerboundPayload::ResponseCancel(state) = inbound.recv().await.unwrap().decode().unwrap()
    else {
        panic!("expected a cancel response");
    };
    mgr.handle_cancel(&conn, state, at(T0 + 2)).unwrap();

    assert_eq!(
        peer.recv().await.unwrap(),
        Some(PeerEvent::Disconnected(DisconnectReason::NotWhitelisted))
    );
}

#[tokio::test]
async fn test_silent_client_is_swept_after_tolerance() {
    let keys = KeyPair::generate();
    let mut mgr = SessionManager::new(keys, SessionConfig::default());
    let (conn, mut peer, _inbound) = connect(3, "Quiet");

    mgr.start(conn, at(T0)).unwrap();
    next_request(&mut peer).await;

    assert!(mgr.sweep(at(T0 + 200)).is_empty());
    assert_eq!(mgr.sweep(at(T0 + 211)).len(), 1);
    assert_eq!(
        peer.recv().await.unwrap(),
        Some(PeerEvent::Disconnected(DisconnectReason::Timeout))
    );
}
