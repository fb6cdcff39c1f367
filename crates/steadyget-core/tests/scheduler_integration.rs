use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use steadyget_core::types::{EngineConfig, ProgressEvent, ProgressMode, TransferStatus};
use steadyget_core::{ProgressSink, RunSummary, Scheduler, Verdict};
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> EngineConfig {
    EngineConfig {
        retry_delay_secs: 0,
        min_rate: 0,
        use_validator: false,
        max_connect_retries: 1,
        progress_mode: ProgressMode::Silent,
        ..Default::default()
    }
}

async fn serve(server: &MockServer, route: &str, content: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(content))
        .mount(server)
        .await;
}

#[derive(Default)]
struct Recorder {
    lines: Mutex<Vec<String>>,
    events: Mutex<usize>,
}

impl ProgressSink for Recorder {
    fn on_progress(&self, _event: &ProgressEvent) {
        *self.events.lock() += 1;
    }

    fn on_message(&self, _task_id: usize, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

#[tokio::test]
async fn test_results_follow_submission_order() {
    let server = MockServer::start().await;
    for name in ["a", "b", "d", "e"] {
        serve(&server, &format!("/{}", name), name).await;
    }
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let entries: Vec<_> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|name| {
            (
                format!("{}/{}", server.uri(), name),
                dir.path().join(name),
                name.to_string(),
            )
        })
        .collect();

    let config = EngineConfig {
        worker_count: 2,
        ..test_config()
    };
    let results = Scheduler::from_entries(entries, config).run().await.unwrap();

    assert_eq!(results.len(), 5);
    for (i, outcome) in results.iter().enumerate() {
        assert_eq!(outcome.task_id, i);
    }
    let flags: Vec<bool> = results.iter().map(|r| r.success).collect();
    assert_eq!(flags, vec![true, true, false, true, true]);
    assert_eq!(results[2].message, "retry count exceeded (hard error)");

    for name in ["a", "b", "d", "e"] {
        let content = tokio::fs::read_to_string(dir.path().join(name)).await.unwrap();
        assert_eq!(content, name);
    }
    assert!(!dir.path().join("c").exists());

    let summary = RunSummary::from_outcomes(&results);
    assert_eq!(summary.verdict(), Verdict::SomeFailed);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn test_more_workers_than_tasks() {
    let server = MockServer::start().await;
    serve(&server, "/only", "only").await;

    let dir = tempdir().unwrap();
    let config = EngineConfig {
        worker_count: 8,
        ..test_config()
    };
    let results = Scheduler::from_entries(
        vec![(format!("{}/only", server.uri()), dir.path().join("only"), "only")],
        config,
    )
    .run()
    .await
    .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].success);
}

#[tokio::test]
async fn test_cancel_lets_running_task_finish() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("slow")
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let entries: Vec<_> = (0..4)
        .map(|i| {
            (
                format!("{}/file{}", server.uri(), i),
                dir.path().join(format!("file{}", i)),
                format!("file{}", i),
            )
        })
        .collect();

    let scheduler = Scheduler::from_entries(entries, test_config());
    let handle = scheduler.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.cancel();
    });

    let results = scheduler.run().await.unwrap();

    assert_eq!(results.len(), 4);
    assert!(results[0].success, "in-flight task should finish");
    for outcome in &results[1..] {
        assert_eq!(outcome.status, TransferStatus::Idle);
        assert!(!outcome.was_attempted());
    }

    let summary = RunSummary::from_outcomes(&results);
    assert_eq!(summary.not_attempted, 3);
    assert_eq!(summary.verdict(), Verdict::Cancelled);

    let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        let name = entry.file_name().to_string_lossy().to_string();
        assert!(!name.ends_with(".download"), "stray temp file {}", name);
    }
}

#[tokio::test]
async fn test_message_mode_reports_to_observer() {
    let server = MockServer::start().await;
    serve(&server, "/a", "hello").await;

    let dir = tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = EngineConfig {
        progress_mode: ProgressMode::Messages,
        ..test_config()
    };

    let results = Scheduler::from_entries(
        vec![(format!("{}/a", server.uri()), dir.path().join("a"), "a")],
        config,
    )
    .with_observer(recorder.clone())
    .run()
    .await
    .unwrap();

    assert!(results[0].success);
    let lines = recorder.lines.lock().clone();
    assert_eq!(lines, vec!["a: Starting", "a: Downloading", "a: Done"]);
    assert!(*recorder.events.lock() > 0);
}

#[tokio::test]
async fn test_all_failed_verdict() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = EngineConfig {
        worker_count: 2,
        max_connect_retries: 0,
        ..test_config()
    };
    let results = Scheduler::from_entries(
        vec![
            (format!("{}/x", server.uri()), dir.path().join("x"), "x"),
            (format!("{}/y", server.uri()), dir.path().join("y"), "y"),
        ],
        config,
    )
    .run()
    .await
    .unwrap();

    assert_eq!(RunSummary::from_outcomes(&results).verdict(), Verdict::AllFailed);
}
