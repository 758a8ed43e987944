//! Architectural Contract Test: Shutdown Determinism
//!
//! This test verifies that shutdown is deterministic and complete.
//!
//! Constraints verified:
//! - Scheduler terminates on shutdown signal, even mid-pass
//! - The link store is flushed before exit
//! - Lifecycle events are emitted
//!
//! If this test fails, someone has added:
//! - Detached background tasks
//! - Tasks that ignore cancellation
//! - Blocking operations in shutdown path

mod common;

use common::*;
use faceit_sync_core::{MemoryLinkStore, MemoryUserDirectory, SyncEvent, SyncScheduler};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

async fn build(
    profiles: StaticProfileClient,
    links: CountingLinkStore,
) -> (SyncScheduler, mpsc::Receiver<SyncEvent>) {
    let directory = MemoryUserDirectory::new();
    add_user(&directory, "u1", &[]).await;

    SyncScheduler::new(
        Arc::new(profiles),
        Arc::new(directory),
        Arc::new(links),
        &test_config(),
    )
    .expect("valid configuration")
}

/// Receive events until one matches, failing after 5 seconds
async fn wait_for(
    events: &mut mpsc::Receiver<SyncEvent>,
    predicate: impl Fn(&SyncEvent) -> bool,
) -> SyncEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("expected event within 5 seconds")
}

#[tokio::test]
async fn shutdown_signal_terminates_scheduler() {
    let profiles = StaticProfileClient::new().with_player("p1", "alice", 5);
    let links = CountingLinkStore::new(MemoryLinkStore::with_entries([link_entry("p1", "u1")]));
    let (scheduler, mut events) = build(profiles, links).await;

    let handle = scheduler.spawn();

    // First pass runs immediately
    wait_for(&mut events, |e| matches!(e, SyncEvent::PassCompleted { .. })).await;

    let result = tokio::time::timeout(Duration::from_secs(5), handle.shutdown()).await;

    assert!(result.is_ok(), "Scheduler should terminate within 5 seconds");
    assert!(
        result.unwrap().is_ok(),
        "Scheduler should shut down successfully"
    );
}

#[tokio::test]
async fn shutdown_flushes_link_store() {
    let profiles = StaticProfileClient::new().with_player("p1", "alice", 5);
    let links = CountingLinkStore::new(MemoryLinkStore::with_entries([link_entry("p1", "u1")]));
    let (scheduler, mut events) = build(profiles, links.clone()).await;

    let handle = scheduler.spawn();
    wait_for(&mut events, |e| matches!(e, SyncEvent::PassCompleted { .. })).await;
    assert_eq!(links.flush_call_count(), 0, "passes do not flush");

    handle.shutdown().await.unwrap();

    assert_eq!(links.flush_call_count(), 1, "flush() called exactly once on shutdown");
}

#[tokio::test]
async fn shutdown_during_hung_pass_is_prompt() {
    let profiles = StaticProfileClient::new();
    profiles.respond("p1", ProfileResponse::Hang);
    let links = CountingLinkStore::new(MemoryLinkStore::with_entries([link_entry("p1", "u1")]));
    let (scheduler, mut events) = build(profiles, links.clone()).await;

    // Per-user timeout far beyond the test's patience
    let handle = scheduler.with_user_timeout(Duration::from_secs(3600)).spawn();
    wait_for(&mut events, |e| matches!(e, SyncEvent::PassStarted { .. })).await;

    let result = tokio::time::timeout(Duration::from_secs(5), handle.shutdown()).await;

    assert!(result.is_ok(), "in-flight pass must not delay shutdown");
    assert_eq!(links.flush_call_count(), 1);

    let stopped = wait_for(&mut events, |e| matches!(e, SyncEvent::Stopped { .. })).await;
    assert_eq!(
        stopped,
        SyncEvent::Stopped {
            reason: "Shutdown signal during pass".to_string()
        }
    );
}

#[tokio::test]
async fn lifecycle_events_are_emitted_in_order() {
    let profiles = StaticProfileClient::new().with_player("p1", "alice", 5);
    let links = CountingLinkStore::new(MemoryLinkStore::with_entries([link_entry("p1", "u1")]));
    let (scheduler, mut events) = build(profiles, links).await;

    let handle = scheduler.with_interval(Duration::from_millis(50)).spawn();

    let first = wait_for(&mut events, |_| true).await;
    assert_eq!(
        first,
        SyncEvent::Started {
            interval: Duration::from_millis(50)
        }
    );

    // Two passes on a short interval
    wait_for(&mut events, |e| matches!(e, SyncEvent::PassCompleted { .. })).await;
    let second = wait_for(&mut events, |e| matches!(e, SyncEvent::PassCompleted { .. })).await;
    if let SyncEvent::PassCompleted { summary } = second {
        assert_eq!(summary.no_change, 1, "second pass finds nothing to change");
    }

    handle.shutdown().await.unwrap();

    wait_for(&mut events, |e| matches!(e, SyncEvent::Stopped { .. })).await;
}

#[tokio::test]
async fn scheduler_without_links_shuts_down_cleanly() {
    let profiles = StaticProfileClient::new();
    let links = CountingLinkStore::new(MemoryLinkStore::new());
    let (scheduler, _events) = build(profiles, links).await;

    let handle = scheduler.spawn();
    assert!(!handle.is_finished());

    let result = tokio::time::timeout(Duration::from_secs(5), handle.shutdown()).await;
    assert!(matches!(result, Ok(Ok(()))));
}
