use crate::engine::SqlitePollStore;
use crate::{NewJob, PollStore};
use chrono::{Duration, Utc};
use oxpoll_common::types::PollResultRow;
use serde_json::json;
use tempfile::TempDir;

fn setup() -> (TempDir, SqlitePollStore) {
    oxpoll_common::id::init(1, 1);
    let dir = TempDir::new().unwrap();
    let store = SqlitePollStore::new(dir.path()).unwrap();
    (dir, store)
}

fn make_job(index: usize) -> NewJob {
    NewJob {
        ip: format!("10.0.0.{index}"),
        port: 161,
        system_type: "snmp".to_string(),
        credentials: json!({ "community": "public", "version": "v2c" }),
    }
}

#[test]
fn insert_and_list_jobs() {
    let (_dir, store) = setup();

    let inserted = store.insert_job(&make_job(5)).unwrap();
    assert_eq!(inserted.ip, "10.0.0.5");
    assert_eq!(inserted.credentials["community"], "public");

    let jobs = store.list_jobs(10, 0).unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, inserted.id);
    assert_eq!(jobs[0].system_type, "snmp");
    assert_eq!(store.count_jobs().unwrap(), 1);
}

#[test]
fn job_pages_are_ordered_and_bounded() {
    let (_dir, store) = setup();

    for index in 1..=12 {
        store.insert_job(&make_job(index)).unwrap();
    }

    let page1 = store.select_job_page(0, 5).unwrap();
    let page2 = store.select_job_page(5, 5).unwrap();
    let page3 = store.select_job_page(10, 5).unwrap();

    assert_eq!(page1.len(), 5);
    assert_eq!(page2.len(), 5);
    assert_eq!(page3.len(), 2);

    // Stable ordering by ID across pages, no overlap
    assert!(page1.last().unwrap().id < page2[0].id);
    assert!(page2.last().unwrap().id < page3[0].id);
}

#[test]
fn empty_page_past_end() {
    let (_dir, store) = setup();
    store.insert_job(&make_job(1)).unwrap();

    let page = store.select_job_page(10, 5).unwrap();
    assert!(page.is_empty());
}

#[test]
fn bulk_insert_and_query_results() {
    let (_dir, store) = setup();
    let job = store.insert_job(&make_job(1)).unwrap();

    let now = Utc::now();
    let rows: Vec<PollResultRow> = (0..3)
        .map(|i| PollResultRow {
            id: oxpoll_common::id::next_id(),
            job_id: job.id,
            result: json!({ "cpu.usage": 40.0 + i as f64 }),
            collected_at: now - Duration::seconds(10 - i),
        })
        .collect();

    let ids = store.bulk_insert_results(&rows).unwrap();
    assert_eq!(ids.len(), 3);

    let stored = store.query_results_for_job(job.id, 10).unwrap();
    assert_eq!(stored.len(), 3);
    // Newest first
    assert!(stored[0].collected_at >= stored[1].collected_at);
    assert_eq!(stored[0].result["cpu.usage"], 42.0);
}

#[test]
fn bulk_insert_empty_batch_is_noop() {
    let (_dir, store) = setup();
    let ids = store.bulk_insert_results(&[]).unwrap();
    assert!(ids.is_empty());
}

#[test]
fn out_of_range_port_is_rejected_on_read() {
    let (dir, store) = setup();
    store.insert_job(&make_job(1)).unwrap();

    // Corrupt the row from a second connection; the read path must
    // surface the bad port instead of truncating it.
    let conn = rusqlite::Connection::open(dir.path().join("oxpoll.db")).unwrap();
    conn.execute("UPDATE poll_jobs SET port = 70000", []).unwrap();
    drop(conn);

    assert!(store.list_jobs(10, 0).is_err());
}

#[test]
fn results_are_scoped_to_job() {
    let (_dir, store) = setup();
    let job_a = store.insert_job(&make_job(1)).unwrap();
    let job_b = store.insert_job(&make_job(2)).unwrap();

    let row = PollResultRow {
        id: oxpoll_common::id::next_id(),
        job_id: job_a.id,
        result: json!({ "up": true }),
        collected_at: Utc::now(),
    };
    store.bulk_insert_results(&[row]).unwrap();

    assert_eq!(store.query_results_for_job(job_a.id, 10).unwrap().len(), 1);
    assert!(store.query_results_for_job(job_b.id, 10).unwrap().is_empty());
}
