use reqwest::header::HeaderMap;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use steadyget_core::engine::{TransferEngine, STATUS_DONE, STATUS_VALIDATION_FAILED};
use steadyget_core::types::{DownloadOutcome, EngineConfig, ProgressMode, TransferStatus};
use steadyget_core::{build_client, multipart_etag, DownloadTask, Validator};
use tempfile::tempdir;
use tokio::sync::Mutex;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config() -> EngineConfig {
    EngineConfig {
        retry_delay_secs: 0,
        min_rate: 0,
        use_validator: false,
        progress_mode: ProgressMode::Silent,
        ..Default::default()
    }
}

fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

async fn download(url: String, dest: &Path, config: EngineConfig) -> DownloadOutcome {
    let client = build_client(&config).unwrap();
    let task = DownloadTask::new(0, url, dest, "test");
    TransferEngine::new(task, Arc::new(config), client).run().await
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

#[tokio::test]
async fn test_plain_download_is_published() {
    let server = MockServer::start().await;
    let content = body(5000);

    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("out").join("file.bin");

    let outcome = download(format!("{}/file.bin", server.uri()), &dest, test_config()).await;

    assert!(outcome.success, "unexpected failure: {}", outcome.message);
    assert_eq!(outcome.status, TransferStatus::Done);
    assert_eq!(outcome.message, STATUS_DONE);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);
    assert!(!dir.path().join("out").join("file.bin.download").exists());
}

#[tokio::test]
async fn test_slow_stream_resumes_with_ranges() {
    let server = MockServer::start().await;
    let content = body(3000);

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Accept-Ranges", "bytes")
                .set_body_bytes(content.clone()),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(header("Range", "bytes=1000-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Accept-Ranges", "bytes")
                .set_body_bytes(content[1000..].to_vec()),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(header("Range", "bytes=2000-"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("Accept-Ranges", "bytes")
                .set_body_bytes(content[2000..].to_vec()),
        )
        .with_priority(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("file.bin");

    // Every chunk is "too slow", so each connection yields one chunk
    let config = EngineConfig {
        chunk_size: 1000,
        min_rate: u64::MAX,
        ..test_config()
    };
    let outcome = download(server.uri(), &dest, config).await;

    assert!(outcome.success, "unexpected failure: {}", outcome.message);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn test_ignored_range_restarts_from_zero() {
    let server = MockServer::start().await;
    let content = body(2000);

    // Claims range support but always answers with the full body
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Accept-Ranges", "bytes")
                .set_body_bytes(content.clone()),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("file.bin");

    let config = EngineConfig {
        chunk_size: 1000,
        min_rate: u64::MAX,
        max_connect_retries: 5,
        ..test_config()
    };
    let outcome = download(server.uri(), &dest, config).await;

    // Each attempt restarts, so the body never completes
    assert!(!outcome.success);
    assert_eq!(outcome.message, "retry count exceeded (soft error)");
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_soft_errors_exhaust_budget() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body(3000)))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("file.bin");

    let config = EngineConfig {
        chunk_size: 1000,
        min_rate: u64::MAX,
        max_connect_retries: 2,
        ..test_config()
    };
    let outcome = download(server.uri(), &dest, config).await;

    assert!(!outcome.success);
    assert_eq!(outcome.status, TransferStatus::Failed);
    assert_eq!(outcome.message, "retry count exceeded (soft error)");
    assert_eq!(request_count(&server).await, 3);
    assert!(!dest.exists());
    assert!(!dir.path().join("file.bin.download").exists());
}

#[tokio::test]
async fn test_http_error_is_hard() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("missing.bin");

    let config = EngineConfig {
        max_connect_retries: 1,
        ..test_config()
    };
    let outcome = download(server.uri(), &dest, config).await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, "retry count exceeded (hard error)");
    assert_eq!(request_count(&server).await, 2);
    assert!(!dest.exists());
    assert!(!dir.path().join("missing.bin.download").exists());
}

#[tokio::test]
async fn test_matching_etag_is_accepted() {
    let server = MockServer::start().await;
    let content = body(2500);
    let etag = multipart_etag(&mut content.as_slice(), 1000).unwrap();
    assert!(etag.ends_with("-3\""));

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", etag.as_str())
                .set_body_bytes(content.clone()),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("file.bin");

    let config = EngineConfig {
        use_validator: true,
        validator_chunk_size: 1000,
        ..test_config()
    };
    let outcome = download(server.uri(), &dest, config).await;

    assert!(outcome.success, "unexpected failure: {}", outcome.message);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);
}

#[tokio::test]
async fn test_wrong_etag_fails_validation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"00000000000000000000000000000000\"")
                .set_body_bytes(body(100)),
        )
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("file.bin");

    let config = EngineConfig {
        use_validator: true,
        max_validate_retries: 2,
        ..test_config()
    };
    let outcome = download(server.uri(), &dest, config).await;

    assert!(!outcome.success);
    assert_eq!(outcome.message, STATUS_VALIDATION_FAILED);
    assert_eq!(request_count(&server).await, 3);
    assert!(!dest.exists());
}

#[tokio::test]
async fn test_custom_validator_sees_whole_body() {
    let server = MockServer::start().await;
    let content = body(4096);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("file.bin");
    let config = EngineConfig {
        use_validator: true,
        ..test_config()
    };

    let expected = content.clone();
    let validator: Arc<dyn Validator> =
        Arc::new(move |content: &mut dyn Read, _: &HeaderMap, _: usize| {
            let mut seen = Vec::new();
            content.read_to_end(&mut seen)?;
            Ok::<bool, io::Error>(seen == expected)
        });

    let client = build_client(&config).unwrap();
    let task = DownloadTask::new(0, server.uri(), dest.as_path(), "test");
    let outcome = TransferEngine::new(task, Arc::new(config), client)
        .with_validator(validator)
        .run()
        .await;

    assert!(outcome.success, "unexpected failure: {}", outcome.message);
}

#[tokio::test]
async fn test_shared_file_destination_is_written_in_place() {
    let server = MockServer::start().await;
    let content = body(1500);

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(content.clone()))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let dest = dir.path().join("handle.bin");
    let file = tokio::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(&dest)
        .await
        .unwrap();
    let shared = Arc::new(Mutex::new(file));

    let config = test_config();
    let client = build_client(&config).unwrap();
    let task = DownloadTask::new(0, server.uri(), steadyget_core::Destination::File(shared), "handle");
    let outcome = TransferEngine::new(task, Arc::new(config), client).run().await;

    assert!(outcome.success, "unexpected failure: {}", outcome.message);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);
    assert!(!dir.path().join("handle.bin.download").exists());
}

#[tokio::test]
async fn test_invalid_url_fails_without_requests() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("file.bin");

    let outcome = download("ftp://example.com/file.bin".to_string(), &dest, test_config()).await;

    assert!(!outcome.success);
    assert!(outcome.message.starts_with("Invalid URL"));
    assert!(!dir.path().join("file.bin.download").exists());
}
