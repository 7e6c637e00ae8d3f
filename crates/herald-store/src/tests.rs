//! Tests for task snapshot persistence and reconcile primitives.

use super::*;

fn fetched(id: &str) -> FetchedTask {
    FetchedTask {
        id: id.to_string(),
        title: format!("title for {id}"),
        priority: Priority::High,
        department: "support".to_string(),
        issue_type: "Task".to_string(),
        resolution: String::new(),
        assignee: String::new(),
    }
}

#[test]
fn upsert_inserts_then_preserves_immutable_fields() {
    let store = TaskStore::in_memory().expect("store");
    store
        .upsert_fetched("ops", &fetched("OPS-1"), 1_000)
        .expect("insert");
    store.mark_sent("OPS-1", 2_000).expect("mark sent");

    let mut refreshed = fetched("OPS-1");
    refreshed.title = "renamed".to_string();
    refreshed.resolution = "Done".to_string();
    store
        .upsert_fetched("ops", &refreshed, 9_000)
        .expect("update");

    let task = store
        .task_by_id("OPS-1")
        .expect("lookup")
        .expect("task exists");
    assert_eq!(task.title, "renamed");
    assert_eq!(task.resolution, "Done");
    assert_eq!(task.date_added_unix_ms, 1_000, "date_added is written once");
    assert_eq!(task.last_sent_unix_ms, Some(2_000), "last_sent survives refresh");
    assert!(!task.archived);
}

#[test]
fn upsert_unarchives_reappearing_task() {
    let store = TaskStore::in_memory().expect("store");
    store
        .upsert_fetched("ops", &fetched("OPS-1"), 1_000)
        .expect("insert");
    store
        .archive_missing("ops", &[], 2_000)
        .expect("archive all");
    let archived = store.task_by_id("OPS-1").expect("lookup").expect("task");
    assert!(archived.archived);
    assert_eq!(archived.archived_date_unix_ms, Some(2_000));

    store
        .upsert_fetched("ops", &fetched("OPS-1"), 3_000)
        .expect("reappear");
    let task = store.task_by_id("OPS-1").expect("lookup").expect("task");
    assert!(!task.archived);
    assert_eq!(task.archived_date_unix_ms, None);
    assert_eq!(task.date_added_unix_ms, 1_000);
}

#[test]
fn archive_missing_excludes_only_fetched_ids() {
    let store = TaskStore::in_memory().expect("store");
    for id in ["OPS-1", "OPS-2", "OPS-3"] {
        store.upsert_fetched("ops", &fetched(id), 1_000).expect("insert");
    }
    store
        .upsert_fetched("infra", &fetched("INF-1"), 1_000)
        .expect("insert other source");

    let archived = store
        .archive_missing("ops", &["OPS-2".to_string()], 5_000)
        .expect("archive");
    assert_eq!(archived, 2);

    assert!(store.task_by_id("OPS-1").unwrap().unwrap().archived);
    assert!(!store.task_by_id("OPS-2").unwrap().unwrap().archived);
    assert!(store.task_by_id("OPS-3").unwrap().unwrap().archived);
    assert!(
        !store.task_by_id("INF-1").unwrap().unwrap().archived,
        "archival is scoped to one source"
    );
}

#[test]
fn empty_fetch_archives_every_unarchived_task_for_source() {
    let store = TaskStore::in_memory().expect("store");
    for id in ["OPS-1", "OPS-2"] {
        store.upsert_fetched("ops", &fetched(id), 1_000).expect("insert");
    }
    let archived = store.archive_missing("ops", &[], 5_000).expect("archive");
    assert_eq!(archived, 2, "empty exclude list means archive all, not none");
}

#[test]
fn archive_missing_skips_already_archived_rows() {
    let store = TaskStore::in_memory().expect("store");
    store.upsert_fetched("ops", &fetched("OPS-1"), 1_000).expect("insert");
    store.archive_missing("ops", &[], 2_000).expect("first");
    let archived_again = store.archive_missing("ops", &[], 9_000).expect("second");
    assert_eq!(archived_again, 0);
    let task = store.task_by_id("OPS-1").unwrap().unwrap();
    assert_eq!(task.archived_date_unix_ms, Some(2_000), "archival date not refreshed");
}

#[test]
fn watermark_advances_monotonically() {
    let store = TaskStore::in_memory().expect("store");
    assert_eq!(store.comment_watermark("OPS-1").expect("lookup"), None);

    assert!(store.advance_comment_watermark("OPS-1", 101, 1_000).expect("first"));
    assert_eq!(store.comment_watermark("OPS-1").expect("lookup"), Some(101));

    assert!(!store.advance_comment_watermark("OPS-1", 101, 2_000).expect("same"));
    assert!(!store.advance_comment_watermark("OPS-1", 90, 3_000).expect("lower"));
    assert_eq!(store.comment_watermark("OPS-1").expect("lookup"), Some(101));

    assert!(store.advance_comment_watermark("OPS-1", 105, 4_000).expect("higher"));
    assert_eq!(store.comment_watermark("OPS-1").expect("lookup"), Some(105));
}

#[test]
fn unarchived_done_tasks_filters_by_department_and_resolution() {
    let store = TaskStore::in_memory().expect("store");
    let mut done = fetched("OPS-1");
    done.resolution = "Done".to_string();
    store.upsert_fetched("ops", &done, 1_000).expect("insert");

    let mut open = fetched("OPS-2");
    open.resolution = String::new();
    store.upsert_fetched("ops", &open, 1_000).expect("insert");

    let mut other_dept = fetched("OPS-3");
    other_dept.resolution = "Done".to_string();
    other_dept.department = "platform".to_string();
    store.upsert_fetched("ops", &other_dept, 1_000).expect("insert");

    let candidates = store.unarchived_done_tasks("support").expect("query");
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, "OPS-1");
}

#[test]
fn sweep_deletes_expired_tasks_and_orphaned_side_records() {
    let store = TaskStore::in_memory().expect("store");
    let mut done = fetched("OPS-1");
    done.resolution = "Done".to_string();
    store.upsert_fetched("ops", &done, 1_000).expect("insert");
    store.archive_missing("ops", &[], 2_000).expect("archive");
    store
        .advance_comment_watermark("OPS-1", 10, 2_000)
        .expect("watermark");
    store
        .record_action("OPS-1", "complete", "casey", 2_000)
        .expect("audit");

    // Still inside the retention window.
    let report = store.sweep_expired(1_500).expect("sweep");
    assert_eq!(report, SweepReport::default());

    let report = store.sweep_expired(3_000).expect("sweep");
    assert_eq!(report.tasks_deleted, 1);
    assert_eq!(report.watermarks_deleted, 1);
    assert_eq!(report.audits_deleted, 1);
    assert_eq!(store.task_count().expect("count"), 0);
}

#[test]
fn sweep_keeps_archived_but_unresolved_tasks() {
    let store = TaskStore::in_memory().expect("store");
    store.upsert_fetched("ops", &fetched("OPS-1"), 1_000).expect("insert");
    store.archive_missing("ops", &[], 2_000).expect("archive");
    let report = store.sweep_expired(10_000).expect("sweep");
    assert_eq!(report.tasks_deleted, 0, "resolution gate holds");
}

#[test]
fn store_persists_across_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("herald.db");
    {
        let store = TaskStore::open(&path).expect("open");
        store.upsert_fetched("ops", &fetched("OPS-1"), 1_000).expect("insert");
    }
    let store = TaskStore::open(&path).expect("reopen");
    assert!(store.task_by_id("OPS-1").expect("lookup").is_some());
}

#[test]
fn priority_parsing_and_markers() {
    assert_eq!(Priority::parse("Blocker"), Priority::Blocker);
    assert_eq!(Priority::parse("CRITICAL"), Priority::High);
    assert_eq!(Priority::parse("weird"), Priority::Unknown);
    assert_eq!(Priority::Unknown.emoji(), "");
    assert!(Priority::Blocker.rank() < Priority::Low.rank());
}
