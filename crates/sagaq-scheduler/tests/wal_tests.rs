//! Crash-recovery behavior of a scheduler running over the write-ahead log

use std::sync::Arc;

use sagaq_command::{Command, CommandRegistry, ExecutionError, SerializedCommand};
use sagaq_scheduler::{CommandScheduler, Outcome, QueueBackend, SchedulerError, WalQueue};
use sagaq_test_utils::{create_customer_command, provision_resources_command, RecordingApi};

fn wal_scheduler(
    queue: WalQueue,
    api: &Arc<RecordingApi>,
) -> CommandScheduler<WalQueue> {
    CommandScheduler::with_queue(queue, CommandRegistry::with_defaults(), api.clone())
}

#[tokio::test]
async fn test_unacked_entries_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.wal");
    let api = Arc::new(RecordingApi::new());

    {
        let mut scheduler = wal_scheduler(WalQueue::open(&path).unwrap(), &api);
        scheduler.schedule(&create_customer_command()).unwrap();
        scheduler.schedule(&provision_resources_command()).unwrap();
        // no execution happened, both entries are still owed
    }

    let queue = WalQueue::open(&path).unwrap();
    assert_eq!(queue.recovered(), 2);

    let mut scheduler = wal_scheduler(queue, &api);
    let summary = scheduler.drain().await.unwrap();
    assert_eq!(summary.executed, 2);
    assert_eq!(api.execute_call_count(), 2);
}

#[tokio::test]
async fn test_executed_entries_are_not_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.wal");
    let api = Arc::new(RecordingApi::new());

    {
        let mut scheduler = wal_scheduler(WalQueue::open(&path).unwrap(), &api);
        scheduler.schedule(&create_customer_command()).unwrap();
        scheduler.schedule(&provision_resources_command()).unwrap();
        assert!(scheduler.execute_next().await.unwrap().is_executed());
    }

    let queue = WalQueue::open(&path).unwrap();
    assert_eq!(queue.recovered(), 1);

    let mut scheduler = wal_scheduler(queue, &api);
    match scheduler.execute_next().await.unwrap() {
        Outcome::Executed { command, .. } => {
            assert_eq!(command.kind(), "provision_resources");
        }
        other => panic!("expected Executed, got {other:?}"),
    }
    assert_eq!(scheduler.execute_next().await.unwrap(), Outcome::Idle);

    // the create_customer from before the restart ran exactly once
    assert_eq!(api.execute_call_count(), 2);
}

#[tokio::test]
async fn test_compensated_entries_are_not_replayed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.wal");
    let api = Arc::new(RecordingApi::new());
    api.queue_execute_failure(ExecutionError::Unavailable("api down".to_string()));

    {
        let mut scheduler = wal_scheduler(WalQueue::open(&path).unwrap(), &api);
        scheduler.schedule(&provision_resources_command()).unwrap();
        assert!(scheduler.execute_next().await.unwrap().is_compensated());
    }

    let queue = WalQueue::open(&path).unwrap();
    assert_eq!(queue.recovered(), 0);
    assert_eq!(api.undo_call_count(), 1);
}

#[tokio::test]
async fn test_poison_entry_is_dropped_durably() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.wal");
    let api = Arc::new(RecordingApi::new());

    {
        let mut queue = WalQueue::open(&path).unwrap();
        queue.append(&SerializedCommand::new("unknown_type")).unwrap();

        let mut scheduler = wal_scheduler(queue, &api);
        assert!(matches!(
            scheduler.execute_next().await,
            Err(SchedulerError::Decode { .. })
        ));
    }

    // the drop was journaled, a restart does not resurrect the entry
    let queue = WalQueue::open(&path).unwrap();
    assert_eq!(queue.recovered(), 0);
    assert_eq!(api.call_count(), 0);
}

#[tokio::test]
async fn test_envelopes_survive_the_journal_byte_for_byte() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("commands.wal");
    let api = Arc::new(RecordingApi::new());

    {
        let mut scheduler = wal_scheduler(WalQueue::open(&path).unwrap(), &api);
        scheduler.schedule(&create_customer_command()).unwrap();
    }

    let queue = WalQueue::open(&path).unwrap();
    let entries: Vec<_> = queue.pending().cloned().collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].command, create_customer_command().serialize());
}
