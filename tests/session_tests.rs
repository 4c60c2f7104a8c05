//! Integration tests for the connection session lifecycle

use courier::relay::QueuePolicy;
use courier::server::{ChatService, ClientConnection, ConnectionSession, SessionState};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};
use tokio_util::sync::CancellationToken;

/// Route until the recipient's single-slot queue accepts the message
async fn route_until_queued(service: &ChatService, body: &str) -> bool {
    for _ in 0..100 {
        let delivery = service
            .send_message("alice", "bob", body)
            .expect("route should succeed");
        if delivery.delivered == 1 {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_removed_session_reports_closed_and_can_reconnect() -> anyhow::Result<()> {
    let service = ChatService::new(QueuePolicy::Unbounded);
    let (tx, _rx) = mpsc::channel(16);
    let client = ClientConnection::new(tx);
    let mut slot = ConnectionSession::new(CancellationToken::new());
    assert_eq!(slot.state(), SessionState::Connecting);

    let token = slot.begin().expect("empty slot accepts a session");
    let admitted = service.connect("x", token)?;
    slot.activate(admitted, client.clone());
    assert_eq!(slot.state(), SessionState::Active);
    assert!(slot.begin().is_none(), "active slot rejects a second session");

    service.registry().remove("x");
    assert_eq!(slot.state(), SessionState::Closed);

    let token = slot.begin().expect("closed slot can open a new session");
    assert_eq!(slot.state(), SessionState::Connecting);
    let admitted = service.connect("x", token)?;
    slot.activate(admitted, client);
    assert_eq!(slot.state(), SessionState::Active);
    assert!(service.registry().contains("x"));

    slot.close().await;
    assert_eq!(slot.state(), SessionState::Closed);
    assert!(!service.registry().contains("x"));

    Ok(())
}

#[tokio::test]
async fn test_failed_admission_closes_slot() -> anyhow::Result<()> {
    let service = ChatService::new(QueuePolicy::Unbounded);
    let _taken = service.connect("x", CancellationToken::new())?;
    let mut slot = ConnectionSession::new(CancellationToken::new());

    let token = slot.begin().expect("empty slot accepts a session");
    assert!(service.connect("x", token).is_err());
    slot.fail();
    assert_eq!(slot.state(), SessionState::Closed);

    assert!(slot.begin().is_some());
    Ok(())
}

#[tokio::test]
async fn test_delivery_continues_after_transport_failure() -> anyhow::Result<()> {
    let service = ChatService::new(QueuePolicy::Bounded { capacity: 1 });
    let _alice = service.connect("alice", CancellationToken::new())?;

    // Writer side of bob's connection is already gone
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let mut slot = ConnectionSession::new(CancellationToken::new());
    let token = slot.begin().expect("empty slot accepts a session");
    let admitted = service.connect("bob", token)?;
    slot.activate(admitted, ClientConnection::new(tx));

    // Each message after the first only fits once the loop drained the previous one
    for i in 0..5 {
        assert!(
            route_until_queued(&service, &i.to_string()).await,
            "message {} was never accepted",
            i
        );
    }

    assert!(service.registry().contains("bob"));
    assert_eq!(slot.state(), SessionState::Active);

    slot.close().await;
    assert!(!service.registry().contains("bob"));

    Ok(())
}
