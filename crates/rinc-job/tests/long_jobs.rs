mod common;

use chrono::{Duration, Utc};
use common::{job, FakeCluster};
use rinc_common::collection;
use rinc_job::config::Config;
use rinc_job::report::{LongJobsReporter, Reporter};
use rinc_storage::{DocumentStore, MemoryDocumentStore};
use serde_json::json;
use std::sync::Arc;

const CONFIG: &str = r#"
    [long_jobs]
    enable = true
    older_than = "7d"

    [[long_jobs.alerts]]
    when = "len(jobs) > 0"
    message = "{{len .Jobs}} stale jobs"
    severity = "warning"
"#;

#[tokio::test]
async fn stale_job_is_reported_and_alerted() {
    let now = Utc::now();
    let cluster = Arc::new(FakeCluster {
        jobs: vec![
            job("j1", "default", now - Duration::days(10)),
            job("fresh", "default", now - Duration::days(1)),
        ],
        ..Default::default()
    });
    let store = Arc::new(MemoryDocumentStore::new());
    let config = Config::parse(CONFIG).unwrap();

    let mut reporter = LongJobsReporter::new(cluster, store.clone(), config.long_jobs);
    reporter.report(now).await.unwrap();

    assert_eq!(store.insertion_order(), [collection::LONG_JOBS, collection::ALERTS]);

    let doc = &store.all(collection::LONG_JOBS)[0].body;
    assert_eq!(doc["olderThan"], 7 * 86_400);
    assert_eq!(doc["jobs"].as_array().unwrap().len(), 1);
    assert_eq!(doc["jobs"][0]["name"], "j1");
    assert_eq!(doc["jobs"][0]["age"], 10 * 86_400);

    let alerts = &store.all(collection::ALERTS)[0].body;
    assert_eq!(alerts["sourceKind"], "longjobs");
    assert_eq!(
        alerts["alerts"],
        json!([{"message": "1 stale jobs", "severity": "warning"}])
    );
}

#[tokio::test]
async fn finished_and_suspended_jobs_are_skipped() {
    let now = Utc::now();
    let old = now - Duration::days(30);
    let mut done = job("done", "ops", old);
    done.finished = true;
    let mut paused = job("paused", "ops", old);
    paused.suspended = true;
    let cluster = Arc::new(FakeCluster {
        jobs: vec![done, paused, job("stuck", "ops", old), job("other-ns", "dev", old)],
        ..Default::default()
    });

    let mut config = Config::parse(CONFIG).unwrap().long_jobs;
    config.namespace = "ops".into();
    let store = Arc::new(MemoryDocumentStore::new());
    let reporter = LongJobsReporter::new(cluster.clone(), store.clone(), config.clone());
    let names: Vec<_> = reporter
        .collect(now)
        .await
        .unwrap()
        .jobs
        .into_iter()
        .map(|j| j.name)
        .collect();
    assert_eq!(names, ["stuck"]);

    config.include_suspended = true;
    let reporter = LongJobsReporter::new(cluster, store, config);
    let metrics = reporter.collect(now).await.unwrap();
    assert_eq!(metrics.jobs.len(), 2);
    assert!(metrics.jobs.iter().any(|j| j.name == "paused" && j.suspended));
}

#[tokio::test]
async fn every_page_is_collected() {
    let now = Utc::now();
    let jobs = (0..65)
        .map(|i| job(&format!("job-{i}"), "batch", now - Duration::days(8)))
        .collect();
    let cluster = Arc::new(FakeCluster {
        jobs,
        ..Default::default()
    });
    let reporter = LongJobsReporter::new(
        cluster.clone(),
        Arc::new(MemoryDocumentStore::new()),
        Config::parse(CONFIG).unwrap().long_jobs,
    );

    let metrics = reporter.collect(now).await.unwrap();
    assert_eq!(metrics.jobs.len(), 65);
    // 30 + 30 + 5
    assert_eq!(cluster.calls(), 3);
}

#[tokio::test]
async fn failed_page_stores_nothing() {
    let now = Utc::now();
    let jobs = (0..40)
        .map(|i| job(&format!("job-{i}"), "batch", now - Duration::days(8)))
        .collect();
    let cluster = Arc::new(FakeCluster {
        jobs,
        fail_at_cursor: Some("30".into()),
        ..Default::default()
    });
    let store = Arc::new(MemoryDocumentStore::new());
    let mut reporter = LongJobsReporter::new(
        cluster,
        store.clone(),
        Config::parse(CONFIG).unwrap().long_jobs,
    );

    let err = reporter.report(now).await.unwrap_err();
    assert!(format!("{err:#}").contains("listing jobs"), "{err:#}");
    assert_eq!(store.count(collection::LONG_JOBS).unwrap(), 0);
    assert_eq!(store.count(collection::ALERTS).unwrap(), 0);
}

#[tokio::test]
async fn documents_land_in_sqlite() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = Arc::new(rinc_storage::SqliteDocumentStore::open(&dir.path().join("rinc.db")).unwrap());
    let now = Utc::now();
    let cluster = Arc::new(FakeCluster {
        jobs: vec![job("j1", "default", now - Duration::days(10))],
        ..Default::default()
    });

    let mut reporter =
        LongJobsReporter::new(cluster, store.clone(), Config::parse(CONFIG).unwrap().long_jobs);
    reporter.report(now).await.unwrap();

    let alerts = store.recent(collection::ALERTS, 1).unwrap();
    assert_eq!(alerts[0].body["alerts"][0]["message"], "1 stale jobs");
    assert_eq!(store.count(collection::LONG_JOBS).unwrap(), 1);
}
