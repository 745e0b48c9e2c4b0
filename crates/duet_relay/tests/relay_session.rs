use std::net::SocketAddr;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use duet_relay::*;

// -- Helpers -------------------------------------------------------------

async fn start_relay(policy: SlotPolicy) -> SocketAddr {
    let config = RelayConfig {
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        slot_policy: policy,
        ..RelayConfig::default()
    };
    let server = RelayServer::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

async fn next(client: &mut RelayClient) -> Message {
    timeout(Duration::from_secs(2), client.recv())
        .await
        .expect("timed out waiting for a relayed message")
        .expect("connection closed")
}

// -- Sessions ------------------------------------------------------------

#[tokio::test]
async fn test_two_player_session() {
    let addr = start_relay(SlotPolicy::Permanent).await;

    let mut a = RelayClient::connect(&addr.to_string()).await.unwrap();
    let mut b = RelayClient::connect(&addr.to_string()).await.unwrap();
    assert_eq!(a.slot(), SlotId::ONE);
    assert_eq!(b.slot(), SlotId::TWO);

    a.send("hi").await.unwrap();
    for client in [&mut a, &mut b] {
        let msg = next(client).await;
        assert_eq!(msg.encode(), b"1 hi".to_vec());
    }

    b.send("yo").await.unwrap();
    for client in [&mut a, &mut b] {
        let msg = next(client).await;
        assert_eq!(msg.encode(), b"2 yo".to_vec());
    }

    // A third player is turned away without disturbing the first two.
    let third = RelayClient::connect(&format!("ws://{addr}/")).await;
    assert!(matches!(third, Err(RelayError::Transport(_))));

    a.send("still here").await.unwrap();
    assert_eq!(next(&mut b).await.payload(), b"still here");
    assert_eq!(next(&mut a).await.payload(), b"still here");
}

#[tokio::test]
async fn test_interleaved_messages_arrive_in_the_same_order_everywhere() {
    let addr = start_relay(SlotPolicy::Permanent).await;
    let mut a = RelayClient::connect(&addr.to_string()).await.unwrap();
    let mut b = RelayClient::connect(&addr.to_string()).await.unwrap();

    for i in 0..10 {
        a.send(format!("a{i}")).await.unwrap();
        b.send(format!("b{i}")).await.unwrap();
    }

    let mut seen_a = Vec::new();
    let mut seen_b = Vec::new();
    for _ in 0..20 {
        seen_a.push(next(&mut a).await);
        seen_b.push(next(&mut b).await);
    }
    assert_eq!(seen_a, seen_b);

    // Per-sender order is kept.
    let from_a: Vec<_> = seen_a
        .iter()
        .filter(|m| m.source() == SlotId::ONE)
        .map(|m| m.payload().to_vec())
        .collect();
    let expected: Vec<_> = (0..10).map(|i| format!("a{i}").into_bytes()).collect();
    assert_eq!(from_a, expected);
}

#[tokio::test]
async fn test_unknown_path_is_refused() {
    let addr = start_relay(SlotPolicy::Permanent).await;
    let result = RelayClient::connect(&format!("ws://{addr}/elsewhere")).await;
    assert!(result.is_err());

    // The refusal did not use up a slot.
    let a = RelayClient::connect(&addr.to_string()).await.unwrap();
    assert_eq!(a.slot(), SlotId::ONE);
}

// -- Frame size limit ----------------------------------------------------

#[tokio::test]
async fn test_payload_at_limit_is_relayed_and_one_over_is_not() {
    let addr = start_relay(SlotPolicy::Permanent).await;
    let mut a = RelayClient::connect(&addr.to_string()).await.unwrap();
    let mut b = RelayClient::connect(&addr.to_string()).await.unwrap();

    let at_limit = "x".repeat(202);
    a.send(at_limit.clone()).await.unwrap();
    assert_eq!(next(&mut b).await.payload(), at_limit.as_bytes());
    assert_eq!(next(&mut a).await.payload(), at_limit.as_bytes());

    // The transport refuses the oversized frame; nothing reaches the relay.
    let _ = a.send("y".repeat(203)).await;
    b.send("after").await.unwrap();
    let msg = next(&mut b).await;
    assert_eq!(msg.source(), SlotId::TWO);
    assert_eq!(msg.payload(), b"after");
}

// -- Disconnects ---------------------------------------------------------

#[tokio::test]
async fn test_slots_are_permanent_by_default() {
    let addr = start_relay(SlotPolicy::Permanent).await;
    let a = RelayClient::connect(&addr.to_string()).await.unwrap();
    let mut b = RelayClient::connect(&addr.to_string()).await.unwrap();

    a.close().await;
    sleep(Duration::from_millis(200)).await;

    assert!(RelayClient::connect(&addr.to_string()).await.is_err());

    // The remaining player still gets relayed traffic.
    b.send("alone").await.unwrap();
    assert_eq!(next(&mut b).await.payload(), b"alone");
}

#[tokio::test]
async fn test_release_on_disconnect_lets_a_new_player_in() {
    let addr = start_relay(SlotPolicy::ReleaseOnDisconnect).await;
    let a = RelayClient::connect(&addr.to_string()).await.unwrap();
    let mut b = RelayClient::connect(&addr.to_string()).await.unwrap();

    a.close().await;

    // The slot frees once the relay notices the close.
    let mut c = None;
    for _ in 0..20 {
        if let Ok(client) = RelayClient::connect(&addr.to_string()).await {
            c = Some(client);
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    let mut c = c.expect("slot 1 was never released");
    assert_eq!(c.slot(), SlotId::ONE);

    c.send("replacement").await.unwrap();
    assert_eq!(next(&mut b).await.encode(), b"1 replacement".to_vec());
    assert_eq!(next(&mut c).await.encode(), b"1 replacement".to_vec());
}

#[tokio::test]
async fn test_drain_returns_everything_already_received() {
    let addr = start_relay(SlotPolicy::Permanent).await;
    let mut a = RelayClient::connect(&addr.to_string()).await.unwrap();
    let mut b = RelayClient::connect(&addr.to_string()).await.unwrap();

    a.send("one").await.unwrap();
    a.send("two").await.unwrap();
    // Wait for the second message, then check nothing else is pending.
    assert_eq!(next(&mut b).await.payload(), b"one");
    assert_eq!(next(&mut b).await.payload(), b"two");
    assert!(b.drain().is_empty());

    sleep(Duration::from_millis(200)).await;
    let drained: Vec<_> = a.drain().into_iter().map(Message::into_payload).collect();
    assert_eq!(drained, vec![b"one".to_vec(), b"two".to_vec()]);
}
