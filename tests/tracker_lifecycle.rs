//! End-to-end lifecycle coverage for the item tracker

use darkroom::{Item, ItemTracker, ItemStatus, SourceType, TrackerError};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

fn open_tracker(dir: &TempDir) -> ItemTracker {
    ItemTracker::open(dir.path().join("workspace.json")).unwrap()
}

fn photo(id: &str) -> Item {
    Item::new(id, format!("/photos/{id}.jpg"), SourceType::Image)
}

fn seed(tracker: &ItemTracker, count: usize) {
    let items = (0..count).map(|i| photo(&format!("item_{i}"))).collect();
    tracker.add_items(items).unwrap();
}

#[test]
fn resume_checkpoint_after_partial_batch() {
    // Complete two, fail one: the checkpoint is the first item with no
    // terminal outcome and the remainder keeps insertion order.
    let dir = TempDir::new().unwrap();
    let tracker = open_tracker(&dir);
    seed(&tracker, 5);

    tracker.mark_completed("item_0", "a harbor at dawn", Some(900)).unwrap();
    tracker.mark_completed("item_1", "street market stalls", Some(1100)).unwrap();
    tracker.mark_failed("item_2", "Connection timeout occurred").unwrap();

    assert_eq!(
        tracker.get_resume_checkpoint().unwrap().as_deref(),
        Some("item_3")
    );
    assert_eq!(
        tracker.get_remaining_items().unwrap(),
        vec!["item_3", "item_4"]
    );
}

#[test]
fn failure_messages_land_in_error_buckets() {
    let dir = TempDir::new().unwrap();
    let tracker = open_tracker(&dir);
    seed(&tracker, 1);

    tracker.mark_failed("item_0", "Connection timeout occurred").unwrap();

    let stats = tracker.statistics().unwrap();
    assert_eq!(stats.error_count(darkroom::ErrorCategory::Timeout), 1);
}

#[test]
fn double_completion_counts_once_but_takes_latest_text() {
    let dir = TempDir::new().unwrap();
    let tracker = open_tracker(&dir);
    seed(&tracker, 1);

    tracker.mark_completed("item_0", "first pass", Some(500)).unwrap();
    tracker.mark_completed("item_0", "second pass", Some(999)).unwrap();

    let snapshot = tracker.snapshot().unwrap();
    assert_eq!(snapshot.workflow_progress.completed_files, 1);
    assert_eq!(
        snapshot.items["item_0"].description.as_deref(),
        Some("second pass")
    );
    // Only the first completion feeds the timing statistics.
    assert_eq!(snapshot.batch_statistics.processing_times.samples, 1);
    assert_eq!(snapshot.batch_statistics.processing_times.slowest_ms, Some(500));
}

#[test]
fn thousand_item_batch_half_completed() {
    let dir = TempDir::new().unwrap();
    let tracker = open_tracker(&dir);
    seed(&tracker, 1000);

    for i in 0..500 {
        tracker
            .mark_completed(&format!("item_{i}"), format!("description {i}"), Some(50))
            .unwrap();
    }

    let progress = tracker.progress().unwrap();
    assert_eq!(progress.total_files, 1000);
    assert_eq!(progress.completed_files, 500);
    assert_eq!(tracker.get_remaining_items().unwrap().len(), 500);
}

#[test]
fn remaining_items_keep_insertion_order_not_key_order() {
    let dir = TempDir::new().unwrap();
    let tracker = open_tracker(&dir);
    seed(&tracker, 12);

    // Lexicographically item_10 sorts before item_2; insertion order wins.
    let expected: Vec<String> = (0..12).map(|i| format!("item_{i}")).collect();
    assert_eq!(tracker.get_remaining_items().unwrap(), expected);
}

#[test]
fn read_only_tracker_rejects_mutations_without_writing() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("workspace.json");
    {
        let tracker = ItemTracker::open(&path).unwrap();
        seed(&tracker, 2);
    }
    let before = std::fs::read(&path).unwrap();

    let reader = ItemTracker::open_read_only(&path).unwrap();
    let err = reader.add_item(photo("item_99")).unwrap_err();
    assert!(err.is_read_only());
    let err = reader.mark_completed("item_0", "text", None).unwrap_err();
    assert!(err.is_read_only());

    // The document is byte-identical; the rejection happened before any
    // disk access.
    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert_eq!(reader.get_remaining_items().unwrap().len(), 2);
}

#[test]
fn unknown_ids_surface_not_found() {
    let dir = TempDir::new().unwrap();
    let tracker = open_tracker(&dir);
    seed(&tracker, 1);

    for err in [
        tracker.mark_processing("ghost").unwrap_err(),
        tracker.mark_completed("ghost", "x", None).unwrap_err(),
        tracker.mark_failed("ghost", "y").unwrap_err(),
        tracker.reset_item("ghost").unwrap_err(),
    ] {
        assert!(err.is_not_found(), "{err}");
    }
}

#[test]
fn reset_then_retry_reaches_completion() {
    let dir = TempDir::new().unwrap();
    let tracker = open_tracker(&dir);
    seed(&tracker, 2);

    tracker.mark_failed("item_0", "out of memory").unwrap();
    assert!(matches!(
        tracker.mark_completed("item_0", "late win", None).unwrap_err(),
        TrackerError::Conflict(_)
    ));

    assert!(tracker.reset_item("item_0").unwrap());
    assert_eq!(
        tracker.get_resume_checkpoint().unwrap().as_deref(),
        Some("item_0")
    );

    tracker.mark_completed("item_0", "late win", Some(40)).unwrap();
    let progress = tracker.progress().unwrap();
    assert_eq!(progress.completed_files, 1);
    assert_eq!(progress.failed_files, 0);
}

#[test]
fn interrupted_processing_item_is_retried_from_scratch() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("workspace.json");
    {
        let tracker = ItemTracker::open(&path).unwrap();
        seed(&tracker, 3);
        tracker.mark_completed("item_0", "done", None).unwrap();
        tracker.mark_processing("item_1").unwrap();
        // Simulated crash: the worker never reports a terminal outcome.
    }

    let resumed = ItemTracker::open(&path).unwrap();
    assert_eq!(
        resumed.get_resume_checkpoint().unwrap().as_deref(),
        Some("item_1")
    );
    assert_eq!(
        resumed.get_remaining_items().unwrap(),
        vec!["item_1", "item_2"]
    );
    assert_eq!(
        resumed.snapshot().unwrap().items["item_1"].status(),
        ItemStatus::Processing
    );
}

#[test]
fn observers_see_every_durable_mutation() {
    let dir = TempDir::new().unwrap();
    let tracker = open_tracker(&dir);
    let seen: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    tracker.add_change_callback(move |ids| sink.lock().unwrap().push(ids.to_vec()));

    let inserted = tracker.add_items(vec![photo("a"), photo("b")]).unwrap();
    assert_eq!(inserted, vec!["a", "b"]);
    tracker.mark_completed("a", "done", None).unwrap();

    let events = seen.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0], vec!["a".to_string(), "b".to_string()]);
    assert_eq!(events[1], vec!["a".to_string()]);
}

#[test]
fn panicking_observer_leaves_state_durable() {
    let dir = TempDir::new().unwrap();
    let tracker = open_tracker(&dir);
    seed(&tracker, 1);

    tracker.add_change_callback(|_| panic!("observer bug"));
    tracker.mark_completed("item_0", "survived", Some(75)).unwrap();

    // The mutation was durable before the observer ran; later
    // operations are unaffected.
    let snapshot = tracker.snapshot().unwrap();
    assert_eq!(snapshot.workflow_progress.completed_files, 1);
    assert_eq!(snapshot.items["item_0"].description.as_deref(), Some("survived"));
}
