//! Integration tests for the outbox engine.
//!
//! Everything runs on injected fakes (scripted executor, recording view
//! cache, watch-channel network signal) plus real SQLite via tempfile where
//! durability matters — no external services.
//!
//! # Test Organization
//! - `happy_*` - Normal operation: offline write, reconnect, replay, drain
//! - `failure_*` - Failure scenarios: retry exhaustion, enqueue failures

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::watch;

use outbox_engine::{
    is_placeholder, CacheSnapshot, ExecuteError, HandleRegistry, InMemoryOutbox, MutationExecutor,
    MutationHandle, MutationId, MutationKey, MutationRecord, OutboxConfig, OutboxStore,
    OutboxUpdate, OptimisticApplier, ReconnectWatcher, RollbackError, SqliteOutbox, SyncCoordinator,
    SyncStatus, ViewCache,
};

// =============================================================================
// Fakes
// =============================================================================

/// Fake server: records executed handles, optionally failing the first N
/// attempts per mutation, and stores confirmed entities.
struct FakeServer {
    fail_first: usize,
    executed: Mutex<Vec<MutationHandle>>,
    entities: Mutex<Vec<Value>>,
}

impl FakeServer {
    fn new() -> Self {
        Self::failing_first(0)
    }

    fn failing_first(fail_first: usize) -> Self {
        Self {
            fail_first,
            executed: Mutex::new(Vec::new()),
            entities: Mutex::new(Vec::new()),
        }
    }

    fn calls_for(&self, id: &str) -> usize {
        self.executed
            .lock()
            .iter()
            .filter(|h| h.id.as_str() == id)
            .count()
    }
}

#[async_trait]
impl MutationExecutor for FakeServer {
    async fn execute(&self, handle: &MutationHandle) -> Result<(), ExecuteError> {
        let prior = self.calls_for(handle.id.as_str());
        self.executed.lock().push(handle.clone());
        if prior < self.fail_first {
            return Err(ExecuteError::Transient("connection refused".into()));
        }

        // Server assigns a real id and persists the entity
        let body: Value = serde_json::from_slice(&handle.variables).unwrap_or(json!({}));
        let mut entity = body;
        if let Value::Object(ref mut map) = entity {
            map.insert(
                "id".into(),
                Value::String(format!("srv-{}", self.executed.lock().len())),
            );
        }
        self.entities.lock().push(entity);
        Ok(())
    }
}

/// Recording view cache: one list view, refetched from the fake server on
/// invalidation.
struct FakeViews {
    list: Mutex<Vec<Value>>,
    server: Arc<FakeServer>,
}

#[async_trait]
impl ViewCache for FakeViews {
    fn snapshot(&self, scope: &MutationKey) -> CacheSnapshot {
        CacheSnapshot {
            scope: scope.clone(),
            views: vec![("list".into(), Value::Array(self.list.lock().clone()))],
        }
    }

    fn splice(&self, _scope: &MutationKey, placeholder: Value) {
        self.list.lock().push(placeholder);
    }

    fn restore(&self, snapshot: CacheSnapshot) -> Result<(), RollbackError> {
        if let Some((_, Value::Array(items))) = snapshot.views.into_iter().next() {
            *self.list.lock() = items;
        }
        Ok(())
    }

    async fn invalidate(&self, _scope: &MutationKey) {
        // Refetch authoritative state
        *self.list.lock() = self.server.entities.lock().clone();
    }
}

fn handle(id: &str) -> MutationHandle {
    MutationHandle::new(
        MutationId::from(id),
        MutationKey::new(["create-prop"]),
        br#"{"name":"Acme"}"#.to_vec(),
    )
}

/// Make a backoff-deferred record eligible again without waiting out the delay.
async fn rewind(outbox: &dyn OutboxStore, id: &str) {
    outbox
        .update(
            &MutationId::from(id),
            OutboxUpdate::default().timestamp(0),
        )
        .await
        .unwrap();
}

// =============================================================================
// Happy Path Tests
// =============================================================================

/// The full offline round trip: optimistic placeholder while offline, network
/// returns, debounce fires, gate resumes, drain syncs, cache shows the
/// server-confirmed entity instead of the placeholder.
#[tokio::test(start_paused = true)]
async fn happy_offline_write_syncs_after_reconnect() {
    let server = Arc::new(FakeServer::new());
    let views = Arc::new(FakeViews {
        list: Mutex::new(Vec::new()),
        server: server.clone(),
    });
    let outbox = Arc::new(InMemoryOutbox::new());
    let registry = Arc::new(HandleRegistry::new());
    let config = OutboxConfig::default();
    let coordinator = Arc::new(SyncCoordinator::new(
        outbox.clone(),
        server.clone(),
        registry.clone(),
        &config,
    ));

    let (online_tx, online_rx) = watch::channel(false);
    let watcher = ReconnectWatcher::spawn(coordinator.clone(), online_rx, config.debounce());
    tokio::task::yield_now().await;

    // Offline: dispatch the write optimistically and park it
    let applier = OptimisticApplier::new(views.clone() as Arc<dyn ViewCache>);
    let mut mutation = applier.on_mutate(
        MutationId::from("m-1"),
        MutationKey::new(["create-prop"]),
        serde_json::to_vec(&json!({"name": "Acme"})).unwrap(),
        json!({"name": "Acme"}),
    );
    coordinator.park(&mutation.handle).await.unwrap();
    registry.pause(mutation.handle.clone());

    // The UI already shows the speculative entity
    {
        let list = views.list.lock();
        assert_eq!(list.len(), 1);
        assert!(is_placeholder(list[0]["id"].as_str().unwrap()));
    }

    // Network comes back; nothing happens inside the debounce window
    online_tx.send(true).unwrap();
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(1_999)).await;
    assert_eq!(server.calls_for("m-1"), 0);

    // Window elapses: gate → resume → drain
    tokio::time::sleep(Duration::from_millis(2)).await;
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(server.calls_for("m-1"), 1);

    let record = outbox.get(&MutationId::from("m-1")).unwrap();
    assert_eq!(record.status, SyncStatus::Synced);

    // Settle: the refetch supersedes the placeholder with server truth
    applier.on_success(&mut mutation);
    applier.on_settled(&mut mutation).await;
    let list = views.list.lock();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], "srv-1");
    assert_eq!(list[0]["name"], "Acme");
    drop(list);

    watcher.shutdown().await;
}

/// A mutation parked in a previous session is replayed after "restart" with
/// the same idempotency key, even though no live handle exists anymore.
#[tokio::test]
async fn happy_replay_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outbox.db");
    let path = path.to_str().unwrap();
    let config = OutboxConfig::default();

    let original = handle("m-1");
    let expected_key = original.idempotency_key.clone();

    // Session one: park and exit before syncing
    {
        let outbox = Arc::new(SqliteOutbox::open(path).await.unwrap());
        let coordinator = Arc::new(SyncCoordinator::new(
            outbox,
            Arc::new(FakeServer::new()),
            Arc::new(HandleRegistry::new()),
            &config,
        ));
        coordinator.park(&original).await.unwrap();
    }

    // Session two: fresh store handle, empty registry
    let outbox = Arc::new(SqliteOutbox::open(path).await.unwrap());
    let server = Arc::new(FakeServer::new());
    let coordinator = Arc::new(SyncCoordinator::new(
        outbox.clone(),
        server.clone(),
        Arc::new(HandleRegistry::new()),
        &config,
    ));

    let summary = coordinator.start_sync().await;
    assert_eq!(summary.synced, 1);

    // The replayed handle carried the identical idempotency key
    let executed = server.executed.lock();
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].idempotency_key, expected_key);

    let all = outbox.scan_all().await.unwrap();
    assert_eq!(all[0].status, SyncStatus::Synced);
}

/// B overtakes A: A defers with backoff, B (younger, not deferred) syncs
/// first. Approximate FIFO, asserted explicitly.
#[tokio::test]
async fn happy_deferred_record_is_overtaken() {
    // A's first two attempts fail, everything else succeeds immediately
    struct OnlyAFails {
        inner: Arc<FakeServer>,
    }
    #[async_trait]
    impl MutationExecutor for OnlyAFails {
        async fn execute(&self, handle: &MutationHandle) -> Result<(), ExecuteError> {
            if handle.id.as_str() == "a" {
                self.inner.execute(handle).await
            } else {
                self.inner.executed.lock().push(handle.clone());
                Ok(())
            }
        }
    }

    let outbox = Arc::new(InMemoryOutbox::new());
    let config = OutboxConfig::default();
    let coordinator = Arc::new(SyncCoordinator::new(
        outbox.clone(),
        Arc::new(OnlyAFails {
            inner: Arc::new(FakeServer::failing_first(2)),
        }),
        Arc::new(HandleRegistry::new()),
        &config,
    ));

    // A enqueued before B while offline
    let mut a = MutationRecord::new(
        MutationId::from("a"),
        MutationKey::new(["create-prop"]),
        serde_json::to_vec(&json!({"name": "A"})).unwrap(),
    );
    a.timestamp -= 100;
    outbox.enqueue(&a).await.unwrap();

    let b = MutationRecord::new(
        MutationId::from("b"),
        MutationKey::new(["create-prop"]),
        serde_json::to_vec(&json!({"name": "B"})).unwrap(),
    );
    outbox.enqueue(&b).await.unwrap();

    let summary = coordinator.start_sync().await;
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.deferred, 1);

    // B finished before A's final retry
    assert_eq!(outbox.get(&MutationId::from("b")).unwrap().status, SyncStatus::Synced);
    assert_eq!(outbox.get(&MutationId::from("a")).unwrap().status, SyncStatus::Pending);

    // A eventually succeeds on its third attempt
    rewind(outbox.as_ref(), "a").await;
    coordinator.start_sync().await;
    rewind(outbox.as_ref(), "a").await;
    let summary = coordinator.start_sync().await;
    assert_eq!(summary.synced, 1);
    assert_eq!(outbox.get(&MutationId::from("a")).unwrap().status, SyncStatus::Synced);
}

// =============================================================================
// Failure Scenario Tests
// =============================================================================

/// An always-failing mutation executes exactly 3 times, ends terminally
/// `failed` with `retry_count = 3`, and is never selected again — persisted
/// through SQLite so the terminal state survives restart too.
#[tokio::test]
async fn failure_retry_exhaustion_is_terminal_and_durable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outbox.db");
    let path = path.to_str().unwrap();
    let config = OutboxConfig::default();

    let outbox = Arc::new(SqliteOutbox::open(path).await.unwrap());
    let server = Arc::new(FakeServer::failing_first(usize::MAX));
    let coordinator = Arc::new(SyncCoordinator::new(
        outbox.clone(),
        server.clone(),
        Arc::new(HandleRegistry::new()),
        &config,
    ));

    coordinator.park(&handle("doomed")).await.unwrap();

    for _ in 0..2 {
        coordinator.start_sync().await;
        rewind(outbox.as_ref(), "doomed").await;
    }
    let summary = coordinator.start_sync().await;
    assert_eq!(summary.failed, 1);
    assert_eq!(server.calls_for("doomed"), 3);

    // No further attempts, even with an eligible timestamp
    coordinator.start_sync().await;
    assert_eq!(server.calls_for("doomed"), 3);

    // Terminal state is durable
    drop(coordinator);
    let reopened = SqliteOutbox::open(path).await.unwrap();
    let all = reopened.scan_all().await.unwrap();
    assert_eq!(all[0].status, SyncStatus::Failed);
    assert_eq!(all[0].retry_count, 3);
}

/// Backoff grows 2^n seconds and stamped timestamps never decrease.
#[tokio::test]
async fn failure_backoff_grows_exponentially() {
    let outbox = Arc::new(InMemoryOutbox::new());
    let server = Arc::new(FakeServer::failing_first(usize::MAX));
    let config = OutboxConfig::default();
    let coordinator = Arc::new(SyncCoordinator::new(
        outbox.clone(),
        server,
        Arc::new(HandleRegistry::new()),
        &config,
    ));

    coordinator.park(&handle("m-1")).await.unwrap();

    let mut last_timestamp = 0i64;
    for (attempt, expected_delay_ms) in [(1u32, 2_000i64), (2, 4_000)] {
        let before = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as i64;
        coordinator.start_sync().await;

        let record = outbox.get(&MutationId::from("m-1")).unwrap();
        assert_eq!(record.retry_count, attempt);
        assert!(record.timestamp >= before + expected_delay_ms);
        assert!(record.timestamp >= last_timestamp, "timestamps never decrease");
        last_timestamp = record.timestamp;

        rewind(outbox.as_ref(), "m-1").await;
    }
}

/// A failed enqueue propagates to the caller: the write was not queued.
#[tokio::test]
async fn failure_enqueue_error_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("outbox.db");
    let outbox = Arc::new(SqliteOutbox::open(path.to_str().unwrap()).await.unwrap());
    let config = OutboxConfig::default();
    let coordinator = Arc::new(SyncCoordinator::new(
        outbox.clone(),
        Arc::new(FakeServer::new()),
        Arc::new(HandleRegistry::new()),
        &config,
    ));

    coordinator.park(&handle("m-1")).await.unwrap();
    let err = coordinator.park(&handle("m-1")).await.unwrap_err();
    assert!(matches!(
        err,
        outbox_engine::StorageError::Duplicate(_)
    ));

    // Only the first write is actually queued
    assert_eq!(outbox.count_pending().await.unwrap(), 1);
}

/// Gate contract on both ends: idle on a fully-synced store, resumed with an
/// accurate count otherwise (resume invoked exactly once).
#[tokio::test]
async fn happy_smart_sync_gate_contract() {
    struct CountingCache {
        resumes: AtomicUsize,
    }
    #[async_trait]
    impl outbox_engine::MutationCache for CountingCache {
        fn find(&self, _id: &MutationId) -> Option<MutationHandle> {
            None
        }
        async fn resume_paused(&self) -> usize {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            2
        }
    }

    let outbox = Arc::new(InMemoryOutbox::new());
    let cache = Arc::new(CountingCache {
        resumes: AtomicUsize::new(0),
    });
    let config = OutboxConfig::default();
    let coordinator = Arc::new(SyncCoordinator::new(
        outbox.clone(),
        Arc::new(FakeServer::new()),
        cache.clone(),
        &config,
    ));

    // Empty store
    let outcome = coordinator.smart_sync().await;
    assert!(!outcome.resumed);
    assert_eq!(outcome.pending_count, 0);
    assert_eq!(cache.resumes.load(Ordering::SeqCst), 0);

    // Two pending records
    coordinator.park(&handle("m-1")).await.unwrap();
    coordinator.park(&handle("m-2")).await.unwrap();
    let outcome = coordinator.smart_sync().await;
    assert!(outcome.resumed);
    assert_eq!(outcome.pending_count, 2);
    assert_eq!(cache.resumes.load(Ordering::SeqCst), 1);
}
