//! Integration tests for message routing

use courier::relay::{
    Delivery, Destination, Directory, QueuePolicy, RelayError, Router, Session, SessionRegistry,
};
use std::io::Write;
use std::sync::{Arc, Mutex};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

struct Fixture {
    registry: Arc<SessionRegistry>,
    directory: Arc<Directory>,
    router: Router,
}

impl Fixture {
    fn new(policy: QueuePolicy) -> Self {
        let registry = Arc::new(SessionRegistry::new(policy));
        let directory = Arc::new(Directory::new());
        let router = Router::new(Arc::clone(&registry), Arc::clone(&directory));
        Self {
            registry,
            directory,
            router,
        }
    }

    fn connect(&self, identity: &str) -> Session {
        let session = self
            .registry
            .admit(identity, CancellationToken::new())
            .expect("admit should succeed");
        self.directory
            .register_user(identity)
            .expect("register should succeed");
        session
    }
}

/// Assert nothing is waiting in a session's queue
async fn assert_empty(session: &mut Session) {
    let next = timeout(Duration::from_millis(50), session.recv()).await;
    assert!(next.is_err(), "Expected no queued message, got {:?}", next);
}

#[tokio::test]
async fn test_direct_delivery() -> anyhow::Result<()> {
    let fx = Fixture::new(QueuePolicy::Unbounded);
    let mut alice = fx.connect("alice");
    let mut bob = fx.connect("bob");

    let delivery = fx.router.route("alice", "bob", "hi")?;
    assert_eq!(
        delivery,
        Delivery {
            delivered: 1,
            offline: 0,
            dropped: 0
        }
    );

    let msg = timeout(Duration::from_secs(1), bob.recv())
        .await?
        .expect("bob should receive a message");
    assert_eq!(msg.sender, "alice");
    assert_eq!(msg.channel, Destination::user("bob"));
    assert_eq!(msg.body, "hi");

    assert_empty(&mut bob).await;
    assert_empty(&mut alice).await;

    Ok(())
}

#[tokio::test]
async fn test_group_delivery_skips_offline_members() -> anyhow::Result<()> {
    let fx = Fixture::new(QueuePolicy::Unbounded);
    fx.directory.insert_group("team", ["a", "b", "c"])?;
    let _sender = fx.connect("sender");
    let mut a = fx.connect("a");
    let mut c = fx.connect("c");

    let delivery = fx.router.route("sender", "team", "standup")?;
    assert_eq!(delivery.delivered, 2);
    assert_eq!(delivery.offline, 1);

    for session in [&mut a, &mut c] {
        let msg = timeout(Duration::from_secs(1), session.recv())
            .await?
            .expect("member should receive a message");
        assert_eq!(msg.sender, "sender");
        assert_eq!(msg.channel, Destination::group("team"));
        assert_eq!(msg.body, "standup");
    }

    assert!(fx.registry.lookup("b").is_none());

    Ok(())
}

#[tokio::test]
async fn test_unknown_destination() {
    let fx = Fixture::new(QueuePolicy::Unbounded);
    let mut alice = fx.connect("alice");
    let mut bob = fx.connect("bob");

    let result = fx.router.route("alice", "nonexistent", "hello?");
    assert_eq!(
        result.unwrap_err(),
        RelayError::UnknownDestination("nonexistent".to_string())
    );

    assert_empty(&mut alice).await;
    assert_empty(&mut bob).await;
}

#[tokio::test]
async fn test_unregistered_sender_rejected_before_resolution() {
    let fx = Fixture::new(QueuePolicy::Unbounded);
    let mut bob = fx.connect("bob");

    // Destination does not exist either; authentication must fail first
    let result = fx.router.route("unregistered-user", "nonexistent", "hi");
    assert!(matches!(result, Err(RelayError::Unauthenticated(_))));

    let result = fx.router.route("unregistered-user", "bob", "hi");
    assert!(matches!(result, Err(RelayError::Unauthenticated(_))));

    assert_empty(&mut bob).await;
}

#[tokio::test]
async fn test_offline_user_is_not_an_error() -> anyhow::Result<()> {
    let fx = Fixture::new(QueuePolicy::Unbounded);
    let _alice = fx.connect("alice");
    let bob = fx.connect("bob");
    drop(bob);

    let delivery = fx.router.route("alice", "bob", "are you there?")?;
    assert_eq!(delivery.delivered, 0);
    assert_eq!(delivery.offline, 1);

    Ok(())
}

#[tokio::test]
async fn test_sender_in_group_receives_own_message() -> anyhow::Result<()> {
    let fx = Fixture::new(QueuePolicy::Unbounded);
    fx.directory.insert_group("pair", ["alice", "bob"])?;
    let mut alice = fx.connect("alice");
    let _bob = fx.connect("bob");

    let delivery = fx.router.route("alice", "pair", "hello both")?;
    assert_eq!(delivery.delivered, 2);

    let echo = timeout(Duration::from_secs(1), alice.recv())
        .await?
        .expect("sender is a member");
    assert_eq!(echo.channel, Destination::group("pair"));

    Ok(())
}

#[tokio::test]
async fn test_full_queue_counts_drop_without_failing() -> anyhow::Result<()> {
    let fx = Fixture::new(QueuePolicy::Bounded { capacity: 1 });
    let _alice = fx.connect("alice");
    let mut bob = fx.connect("bob");

    let first = fx.router.route("alice", "bob", "first")?;
    assert_eq!(first.delivered, 1);

    let second = fx.router.route("alice", "bob", "second")?;
    assert_eq!(second.delivered, 0);
    assert_eq!(second.dropped, 1);

    let msg = bob.recv().await.expect("first message kept");
    assert_eq!(msg.body, "first");
    assert_empty(&mut bob).await;

    Ok(())
}

#[tokio::test]
async fn test_per_recipient_fifo() -> anyhow::Result<()> {
    let fx = Fixture::new(QueuePolicy::Unbounded);
    let _alice = fx.connect("alice");
    let mut bob = fx.connect("bob");

    for i in 0..20 {
        fx.router.route("alice", "bob", &i.to_string())?;
    }

    for i in 0..20 {
        let msg = bob.recv().await.expect("message should arrive");
        assert_eq!(msg.body, i.to_string());
    }

    Ok(())
}

/// In-memory sink for formatted log lines
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_offline_skip_logged_as_warning() -> anyhow::Result<()> {
    let fx = Fixture::new(QueuePolicy::Unbounded);
    let _alice = fx.connect("alice");
    drop(fx.connect("bob"));

    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let delivery =
        tracing::subscriber::with_default(subscriber, || fx.router.route("alice", "bob", "hi"))?;
    assert_eq!(delivery.offline, 1);

    let output = String::from_utf8(logs.0.lock().unwrap().clone())?;
    assert!(output.contains("WARN"), "got: {}", output);
    assert!(output.contains("Skipping offline recipient 'bob'"), "got: {}", output);

    Ok(())
}
