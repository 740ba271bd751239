//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use skimmer::config::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use skimmer::crawler::{
    crawl, Coordinator, FailureReason, FetchResult, Fetcher, HttpFetcher,
};
use skimmer::storage::{file_name_for, RunStatus, SqliteStorage, Storage};
use skimmer::{canonicalize, SkimmerError};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

/// Creates a test configuration writing into `dir`
fn create_test_config(dir: &TempDir, seeds: Vec<String>) -> Config {
    Config {
        seeds,
        crawler: CrawlerConfig {
            max_concurrency: 4,
            max_depth: 2,
            max_attempts: 3,
            timeout_ms: 2_000,
            backoff_base_ms: 10,
            backoff_cap_ms: 50,
            shutdown_grace_ms: 100,
            max_links_per_page: None,
            abort_on_write_error: false,
        },
        user_agent: user_agent(),
        output: OutputConfig {
            database_path: dir.path().join("crawl.db").display().to_string(),
            summary_path: dir.path().join("summary.md").display().to_string(),
            artifact_dir: None,
        },
    }
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

async fn mount_page(server: &MockServer, route: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
}

fn open_storage(dir: &TempDir) -> SqliteStorage {
    SqliteStorage::new(&dir.path().join("crawl.db")).expect("Failed to open database")
}

#[tokio::test]
async fn test_full_crawl_respects_depth_and_records_run() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        html(r#"<html><head><title>Home</title></head><body>
            <a href="/a">A</a><a href="/b">B</a><a href="/a#again">A again</a>
        </body></html>"#),
    )
    .await;
    mount_page(
        &server,
        "/a",
        html(r#"<html><head><title>Page A</title></head><body>
            <a href="/">Home</a><a href="/c">C</a>
        </body></html>"#),
    )
    .await;
    mount_page(
        &server,
        "/b",
        ResponseTemplate::new(200).set_body_raw(b"plain text".to_vec(), "text/plain"),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(html("<p>too deep</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, vec![format!("{}/", base)]);
    config.crawler.max_depth = 1;

    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let seeds = coordinator.config().seeds.clone();
    let summary = coordinator.start(seeds).await.expect("Crawl failed");

    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.abandoned, 0);
    assert_eq!(summary.total_discovered, 3);
    assert!(!summary.was_cancelled);

    let storage = open_storage(&dir);
    let run = storage.get_latest_run().unwrap().expect("No run recorded");
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.summary.succeeded, 3);
    assert!(run.finished_at.is_some());
    assert_eq!(storage.count_artifacts(Some(run.id)).unwrap(), 3);

    let page_a = storage
        .get_artifact(run.id, canonicalize(&format!("{}/a", base)).as_str())
        .unwrap()
        .expect("Page A not stored");
    assert_eq!(page_a.depth, 1);
    assert_eq!(page_a.title.as_deref(), Some("Page A"));
    assert_eq!(
        page_a.parent_url.as_deref(),
        Some(canonicalize(&format!("{}/", base)).as_str())
    );

    let page_b = storage
        .get_artifact(run.id, canonicalize(&format!("{}/b", base)).as_str())
        .unwrap()
        .expect("Page B not stored");
    assert_eq!(page_b.body_size, 10);
    assert_eq!(page_b.content_type.as_deref(), Some("text/plain"));

    let markdown = std::fs::read_to_string(dir.path().join("summary.md")).unwrap();
    assert!(markdown.contains("# Skimmer Crawl Summary"));
}

#[tokio::test]
async fn test_transient_failures_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_page(&server, "/flaky", html("<p>finally</p>")).await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, vec![format!("{}/flaky", server.uri())]);

    let summary = crawl(config).await.expect("Crawl failed");

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.retries, 2);
    assert_eq!(summary.abandoned, 0);
}

#[tokio::test]
async fn test_retries_exhausted_and_permanent_failures() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        vec![
            format!("{}/down", server.uri()),
            format!("{}/gone", server.uri()),
        ],
    );

    let summary = crawl(config).await.expect("Crawl failed");

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.abandoned, 2);
    assert_eq!(summary.failures.retry_exhausted, 1);
    assert_eq!(summary.failures.permanent_fetch, 1);
    assert_eq!(summary.retries, 2);

    let storage = open_storage(&dir);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(storage.count_artifacts(Some(run.id)).unwrap(), 0);

    let markdown = std::fs::read_to_string(dir.path().join("summary.md")).unwrap();
    assert!(markdown.contains("Failure Breakdown"));
}

#[tokio::test]
async fn test_depth_zero_fetches_seeds_only() {
    let server = MockServer::start().await;

    mount_page(&server, "/", html(r#"<a href="/next">Next</a>"#)).await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html("<p>next</p>"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, vec![format!("{}/", server.uri())]);
    config.crawler.max_depth = 0;

    let summary = crawl(config).await.expect("Crawl failed");

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.total_discovered, 1);
}

#[tokio::test]
async fn test_artifact_files_written() {
    let server = MockServer::start().await;

    mount_page(&server, "/", html(r#"<a href="/data.json">data</a>"#)).await;
    mount_page(
        &server,
        "/data.json",
        ResponseTemplate::new(200).set_body_raw(br#"{"ok":true}"#.to_vec(), "application/json"),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let artifact_dir = dir.path().join("artifacts");
    let mut config = create_test_config(&dir, vec![format!("{}/", server.uri())]);
    config.output.artifact_dir = Some(artifact_dir.display().to_string());

    let summary = crawl(config).await.expect("Crawl failed");
    assert_eq!(summary.succeeded, 2);

    let data_id = canonicalize(&format!("{}/data.json", server.uri()));
    let data_file = artifact_dir.join(file_name_for(&data_id, Some("application/json")));
    assert!(data_file.to_string_lossy().ends_with(".json"));
    assert_eq!(std::fs::read(&data_file).unwrap(), br#"{"ok":true}"#.to_vec());

    let root_id = canonicalize(&format!("{}/", server.uri()));
    assert!(artifact_dir
        .join(file_name_for(&root_id, Some("text/html")))
        .exists());

    // Files and database rows are written side by side
    let storage = open_storage(&dir);
    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(storage.count_artifacts(Some(run.id)).unwrap(), 2);
}

#[tokio::test]
async fn test_aborted_crawl_records_partial_counts() {
    let server = MockServer::start().await;

    mount_page(&server, "/", html(r#"<a href="/blocked">blocked</a>"#)).await;
    mount_page(&server, "/blocked", html("<p>blocked</p>")).await;

    let dir = TempDir::new().unwrap();
    let artifact_dir = dir.path().join("artifacts");

    // A directory where the artifact file should go makes the write fail
    let blocked = canonicalize(&format!("{}/blocked", server.uri()));
    std::fs::create_dir_all(artifact_dir.join(file_name_for(&blocked, Some("text/html"))))
        .unwrap();

    let mut config = create_test_config(&dir, vec![format!("{}/", server.uri())]);
    config.crawler.abort_on_write_error = true;
    config.output.artifact_dir = Some(artifact_dir.display().to_string());

    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let seeds = coordinator.config().seeds.clone();
    let result = coordinator.start(seeds).await;

    assert!(matches!(
        result,
        Err(SkimmerError::PersistenceAborted { ref url, .. }) if url == blocked.as_str()
    ));

    let run = open_storage(&dir).get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.summary.succeeded, 1);
    assert_eq!(run.summary.abandoned, 1);
    assert_eq!(run.summary.failures.persistence, 1);
    assert_eq!(run.summary.total_discovered, 2);

    let markdown = std::fs::read_to_string(dir.path().join("summary.md")).unwrap();
    assert!(markdown.contains("Failure Breakdown"));
}

#[tokio::test]
async fn test_cancel_stops_slow_crawl() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/slow",
        html("<p>slow</p>").set_delay(Duration::from_secs(10)),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir, vec![]);
    config.crawler.timeout_ms = 30_000;

    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let cancel = coordinator.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
    });

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        coordinator.start([format!("{}/slow", server.uri())]),
    )
    .await
    .expect("Cancelled crawl did not stop")
    .expect("Crawl failed");

    assert!(summary.was_cancelled);
    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.cancelled, 1);

    let run = open_storage(&dir).get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
}

#[tokio::test]
async fn test_http_fetcher_classifies_responses() {
    let server = MockServer::start().await;

    mount_page(&server, "/ok", html("<p>ok</p>")).await;
    mount_page(&server, "/missing", ResponseTemplate::new(404)).await;
    mount_page(&server, "/busy", ResponseTemplate::new(503)).await;
    mount_page(
        &server,
        "/slow",
        html("<p>slow</p>").set_delay(Duration::from_secs(2)),
    )
    .await;

    let fetcher = HttpFetcher::new(&user_agent()).unwrap();
    let timeout = Duration::from_secs(1);
    let id = |route: &str| canonicalize(&format!("{}{}", server.uri(), route));

    match fetcher.fetch(&id("/ok"), timeout).await {
        FetchResult::Success(content) => {
            assert_eq!(content.status, 200);
            assert_eq!(content.body, b"<p>ok</p>".to_vec());
            assert_eq!(content.content_type.as_deref(), Some("text/html"));
        }
        other => panic!("expected success, got {:?}", other),
    }

    assert!(matches!(
        fetcher.fetch(&id("/missing"), timeout).await,
        FetchResult::PermanentFailure(FailureReason::ClientError(404))
    ));
    assert!(matches!(
        fetcher.fetch(&id("/busy"), timeout).await,
        FetchResult::RetryableFailure(FailureReason::ServerError(503))
    ));
    assert!(matches!(
        fetcher
            .fetch(&id("/slow"), Duration::from_millis(200))
            .await,
        FetchResult::RetryableFailure(FailureReason::Timeout)
    ));
}

#[tokio::test]
async fn test_http_fetcher_sends_user_agent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .and(wiremock::matchers::header(
            "user-agent",
            user_agent().header_value().as_str(),
        ))
        .respond_with(html("<p>hi</p>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HttpFetcher::new(&user_agent()).unwrap();
    let result = fetcher
        .fetch(
            &canonicalize(&format!("{}/", server.uri())),
            Duration::from_secs(2),
        )
        .await;

    assert!(result.is_success());
}

#[tokio::test]
async fn test_connection_refused_is_retryable() {
    let fetcher = HttpFetcher::new(&user_agent()).unwrap();

    let result = fetcher
        .fetch(&canonicalize("http://127.0.0.1:1/"), Duration::from_secs(2))
        .await;

    assert!(matches!(result, FetchResult::RetryableFailure(_)));
}
