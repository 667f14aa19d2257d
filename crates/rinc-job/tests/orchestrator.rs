mod common;

use chrono::Utc;
use common::{Script, ScriptedReporter};
use rinc_job::config::ReporterErrorPolicy;
use rinc_job::error::RunError;
use rinc_job::Job;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn job(policy: ReporterErrorPolicy, scripts: &[(&'static str, Script)]) -> (Job, Arc<Mutex<Vec<&'static str>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let job = scripts.iter().fold(Job::new(policy), |job, &(kind, script)| {
        job.with_reporter(ScriptedReporter {
            kind,
            script,
            log: log.clone(),
        })
    });
    (job, log)
}

#[tokio::test]
async fn reporters_run_in_order() {
    let (mut job, log) = job(
        ReporterErrorPolicy::Abort,
        &[
            ("longjobs", Script::Succeed),
            ("resource", Script::Succeed),
            ("imagetag", Script::Succeed),
            ("ceph", Script::Succeed),
        ],
    );
    assert_eq!(job.kinds(), ["longjobs", "resource", "imagetag", "ceph"]);

    job.generate_all(Utc::now(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(*log.lock().unwrap(), ["longjobs", "resource", "imagetag", "ceph"]);
}

#[tokio::test]
async fn abort_stops_at_first_failure() {
    let (mut job, log) = job(
        ReporterErrorPolicy::Abort,
        &[
            ("longjobs", Script::Succeed),
            ("resource", Script::Fail),
            ("imagetag", Script::Succeed),
        ],
    );

    let err = job
        .generate_all(Utc::now(), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        RunError::Failed { kind, source } => {
            assert_eq!(kind, "resource");
            assert!(source.to_string().contains("resource exploded"));
        }
        other => panic!("expected Failed, got {other:?}"),
    }
    assert_eq!(*log.lock().unwrap(), ["longjobs", "resource"]);
}

#[tokio::test]
async fn continue_runs_everything_and_lists_failures() {
    let (mut job, log) = job(
        ReporterErrorPolicy::Continue,
        &[
            ("longjobs", Script::Fail),
            ("resource", Script::Succeed),
            ("ceph", Script::Fail),
        ],
    );

    let err = job
        .generate_all(Utc::now(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(&err, RunError::Incomplete { kinds } if kinds == &["longjobs", "ceph"]));
    assert_eq!(err.to_string(), "2 reports failed: longjobs, ceph");
    assert_eq!(*log.lock().unwrap(), ["longjobs", "resource", "ceph"]);
}

#[tokio::test]
async fn cancelled_token_stops_before_next_reporter() {
    let (mut job, log) = job(
        ReporterErrorPolicy::Continue,
        &[("longjobs", Script::Succeed), ("resource", Script::Succeed)],
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = job.generate_all(Utc::now(), &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn deadline_cancels_hanging_reporter() {
    let (mut job, log) = job(
        ReporterErrorPolicy::Continue,
        &[("imagetag", Script::Hang), ("ceph", Script::Succeed)],
    );

    let err = job
        .run(Duration::from_secs(600), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Cancelled { kind: "imagetag" }));
    assert_eq!(*log.lock().unwrap(), ["imagetag"]);
}

#[tokio::test]
async fn shutdown_signal_cancels_the_run() {
    let (mut job, _log) = job(ReporterErrorPolicy::Abort, &[("ceph", Script::Hang)]);
    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = job
        .run(Duration::from_secs(3600), &shutdown)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}
