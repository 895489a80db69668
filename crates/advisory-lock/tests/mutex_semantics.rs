// Integration tests have relaxed clippy settings.
// Production code (src/) must use strict zero-unwrap/panic patterns.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::too_many_lines,
    clippy::doc_markdown
)]
//! Mutex behaviour against the in-memory advisory lock server.
//!
//! Covers sharing a connection, contention across connections, `try_lock`,
//! `with_lock` release guarantees and session cleanup on close.

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use advisory_lock::{Error, MemoryServer, MemorySession, MutexFactory, Readiness};

const HOLD: Duration = Duration::from_millis(40);

fn factory(server: &MemoryServer) -> MutexFactory<MemorySession> {
    MutexFactory::connect(server.connector()).unwrap()
}

#[tokio::test]
async fn lock_unlock_on_same_connection_does_not_block() {
    let server = MemoryServer::new();
    let factory = factory(&server);
    let inside = Arc::new(AtomicUsize::new(0));
    let entries = Arc::new(Mutex::new(Vec::new()));

    let mut cycles = Vec::new();
    for expected in 0..3 {
        let mutex = factory.mutex("test-lock");
        let inside = Arc::clone(&inside);
        let entries = Arc::clone(&entries);
        cycles.push(tokio::spawn(async move {
            mutex.lock().await.unwrap();
            let seen = inside.fetch_add(1, Ordering::SeqCst);
            entries.lock().unwrap().push((expected, seen));
            tokio::time::sleep(HOLD).await;
            inside.fetch_sub(1, Ordering::SeqCst);
            mutex.unlock().await.unwrap();
        }));
    }
    for cycle in cycles {
        cycle.await.unwrap();
    }

    // Same session: every lock is granted while the others are still held.
    let entries = entries.lock().unwrap().clone();
    assert_eq!(entries, vec![(0, 0), (1, 1), (2, 2)]);
    assert!(server.active_locks().is_empty());
}

#[tokio::test]
async fn sequential_cycles_on_one_connection_complete_in_order() {
    let server = MemoryServer::new();
    let factory = factory(&server);
    let mutex = factory.mutex("test-lock");
    let mut log = Vec::new();

    for i in 0..3 {
        mutex.lock().await.unwrap();
        log.push(format!("enter {i}"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        log.push(format!("leave {i}"));
        assert!(mutex.unlock().await.unwrap());
    }

    assert_eq!(
        log,
        ["enter 0", "leave 0", "enter 1", "leave 1", "enter 2", "leave 2"]
    );
}

#[tokio::test]
async fn lock_unlock_on_different_connections_serializes() {
    let server = MemoryServer::new();
    let inside = Arc::new(AtomicUsize::new(0));
    let entered = Arc::new(AtomicUsize::new(0));

    let mut contenders = Vec::new();
    for _ in 0..5 {
        let factory = factory(&server);
        let inside = Arc::clone(&inside);
        let entered = Arc::clone(&entered);
        contenders.push(tokio::spawn(async move {
            let mutex = factory.mutex("test-lock");
            mutex.lock().await.unwrap();
            assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
            entered.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(HOLD).await;
            inside.fetch_sub(1, Ordering::SeqCst);
            mutex.unlock().await.unwrap();
            factory
        }));
    }
    let mut factories = Vec::new();
    for contender in contenders {
        factories.push(contender.await.unwrap());
    }

    assert_eq!(entered.load(Ordering::SeqCst), 5);
    for factory in factories {
        factory.close().await.unwrap();
    }
    assert_eq!(server.active_sessions(), 0);
}

#[tokio::test]
async fn try_lock_never_blocks() {
    let server = MemoryServer::new();
    let mutex1 = factory(&server).mutex("test-try-lock");
    let mutex2 = factory(&server).mutex("test-try-lock");

    assert!(mutex1.try_lock().await.unwrap());
    assert!(!mutex2.try_lock().await.unwrap());
    assert!(mutex1.unlock().await.unwrap());
    assert!(mutex2.try_lock().await.unwrap());
    assert!(!mutex1.try_lock().await.unwrap());
    assert!(mutex2.unlock().await.unwrap());
}

#[tokio::test]
async fn with_lock_followed_by_try_lock() {
    let server = MemoryServer::new();
    let mutex1 = factory(&server).mutex("test-withlock-lock");
    let mutex2 = factory(&server).mutex("test-withlock-lock");

    let inner = mutex2.clone();
    let result = mutex1
        .with_lock(|| async move {
            let obtained = inner.try_lock().await?;
            assert!(!obtained);
            Ok::<_, Error>("someval")
        })
        .await;

    assert_eq!(result, Ok("someval"));
    assert!(mutex2.try_lock().await.unwrap());
    assert!(mutex2.unlock().await.unwrap());
}

#[tokio::test]
async fn with_lock_plain_value() {
    let server = MemoryServer::new();
    let mutex = factory(&server).mutex("test-withlock-lock");

    let result = mutex.with_lock(|| async { Ok::<_, Error>(7) }).await;

    assert_eq!(result, Ok(7));
    assert!(!server.is_locked(mutex.key()));
}

#[tokio::test]
async fn with_lock_blocks_until_lock_available() {
    let server = MemoryServer::new();
    let mutex1 = factory(&server).mutex("test-withlock-lock");
    let mutex2 = factory(&server).mutex("test-withlock-lock");
    let logs = Arc::new(Mutex::new(Vec::new()));

    let run = |name: &'static str, mutex: advisory_lock::AdvisoryMutex<MemorySession>| {
        let logs = Arc::clone(&logs);
        tokio::spawn(async move {
            mutex
                .with_lock(|| async {
                    logs.lock().unwrap().push(format!("{name} enters"));
                    tokio::time::sleep(HOLD).await;
                    logs.lock().unwrap().push(format!("{name} leaves"));
                    Ok::<_, Error>(())
                })
                .await
        })
    };
    let first = run("mutex1", mutex1);
    let second = run("mutex2", mutex2);
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let logs = logs.lock().unwrap().clone();
    let version1 = ["mutex1 enters", "mutex1 leaves", "mutex2 enters", "mutex2 leaves"];
    let version2 = ["mutex2 enters", "mutex2 leaves", "mutex1 enters", "mutex1 leaves"];
    assert!(logs == version1 || logs == version2, "interleaved: {logs:?}");
}

#[tokio::test]
async fn throwing_inside_critical_section_unlocks_mutex() {
    let server = MemoryServer::new();
    let holder = factory(&server).mutex("test-throw");
    let peer = factory(&server).mutex("test-throw");

    let result: Result<(), Error> = holder
        .with_lock(|| async { Err(Error::InvalidConfig("boom".into())) })
        .await;

    assert_eq!(result, Err(Error::InvalidConfig("boom".into())));
    assert!(peer.try_lock().await.unwrap());
}

#[tokio::test]
async fn operations_queue_until_connected_then_run_in_order() {
    let server = MemoryServer::new().with_connect_delay(Duration::from_millis(30));
    let factory = factory(&server);
    let mutex = factory.mutex("queued");
    assert_eq!(factory.readiness(), Readiness::Connecting);

    // futures::join! polls in declaration order, matching queue order.
    let (locked, retried, unlocked) =
        futures::join!(mutex.lock(), mutex.try_lock(), mutex.unlock());

    assert!(locked.is_ok());
    assert_eq!(retried, Ok(true));
    assert_eq!(unlocked, Ok(true));
    assert_eq!(server.active_locks()[0].depth, 1);
    assert_eq!(factory.readiness(), Readiness::Ready);
}

#[tokio::test]
async fn connection_failure_is_permanent() {
    let server = MemoryServer::new().failing_connect("connection refused");
    let factory = factory(&server);
    let mutex = factory.mutex("never");

    let expected = Error::ConnectionFailed("connection refused".into());
    assert_eq!(mutex.lock().await, Err(expected.clone()));
    assert_eq!(mutex.try_lock().await, Err(expected.clone()));
    let result: Result<(), Error> = mutex.with_lock(|| async { Ok(()) }).await;
    assert_eq!(result, Err(expected));
    assert_eq!(factory.outstanding(), 0);
}

#[tokio::test]
async fn outstanding_count_tracks_blocked_lock() {
    let server = MemoryServer::new();
    let holder = factory(&server);
    let waiter = factory(&server);
    holder.mutex("busy").lock().await.unwrap();
    waiter.guard().await_ready().await.unwrap();
    assert!(waiter.guard().is_idle());

    let blocked = waiter.mutex("busy");
    let pending = tokio::spawn(async move { blocked.lock().await });
    while waiter.outstanding() == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(waiter.outstanding(), 1);

    holder.close().await.unwrap();
    pending.await.unwrap().unwrap();
    waiter.guard().wait_idle().await;
    assert_eq!(waiter.outstanding(), 0);
}

#[tokio::test]
async fn closing_factories_leaves_no_sessions() {
    let server = MemoryServer::new();
    let before = server.active_sessions();

    let mut workers = Vec::new();
    for _ in 0..25 {
        let factory = factory(&server);
        workers.push(tokio::spawn(async move {
            factory
                .mutex("test-withlock-release")
                .with_lock(|| async { Ok::<_, Error>(()) })
                .await?;
            factory.close().await
        }));
    }
    for worker in workers {
        worker.await.unwrap().unwrap();
    }

    assert_eq!(server.active_sessions(), before);
}
