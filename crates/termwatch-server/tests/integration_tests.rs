//! Integration tests for the Termwatch service

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use termwatch_domain::{ExtractionRecord, TermMatch};
use termwatch_server::{
    build_state,
    config::{FeedMode, ServiceConfig},
    handlers::{create_router, ErrorResponse, HealthCheckResponse, StartExtractionResponse},
};
use tower::ServiceExt; // for oneshot

const ALERTS: &str = r#"[
    {
        "id": "alert-1",
        "contents": [
            {"text": "Streik bei IG Metall angekündigt", "type": "title", "language": "de"},
            {"text": "Metall workers of IG announce a strike", "type": "body", "language": "en"}
        ],
        "date": "2024-03-01T08:30:00",
        "inputType": "news"
    },
    {
        "id": "alert-2",
        "contents": [{"text": "Factory fire near the harbour", "type": "title", "language": "en"}]
    }
]"#;

const TERMS: &str = r#"[
    {"id": 10, "text": "IG Metall", "language": "de", "keepOrder": true},
    {"id": 11, "text": "fire", "language": "en", "keepOrder": false}
]"#;

/// Helper to write static feed files and build a config around them
fn create_test_config(dir: &Path) -> ServiceConfig {
    let alerts_file = dir.join("alerts.json");
    let terms_file = dir.join("terms.json");
    std::fs::write(&alerts_file, ALERTS).unwrap();
    std::fs::write(&terms_file, TERMS).unwrap();

    let mut config = ServiceConfig::default_test_config();
    config.feeds.mode = FeedMode::Static;
    config.feeds.alerts_file = Some(alerts_file);
    config.feeds.terms_file = Some(terms_file);
    config.output.results_path = dir.join("out").join("extracted_alerts.jsonl");
    config
}

async fn create_test_app(config: &ServiceConfig) -> Router {
    create_router(build_state(config).await.unwrap())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn wait_until_idle(app: &Router) -> Value {
    for _ in 0..200 {
        let (_, status) = send(app, "GET", "/extraction-status", None).await;
        if status["status"] == "Idle" {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("extraction run did not finish");
}

fn read_records(path: &Path) -> Vec<ExtractionRecord> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(&create_test_config(dir.path())).await;

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);

    let health: HealthCheckResponse = serde_json::from_value(body).unwrap();
    assert_eq!(health.status, "healthy");
    assert!(health.timestamp > 1_600_000_000.0);
}

#[tokio::test]
async fn test_initial_status_is_idle() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(&create_test_config(dir.path())).await;

    let (status, body) = send(&app, "GET", "/extraction-status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Idle");
    assert!(body.get("runId").is_none());
    assert!(body.get("lastRun").is_none());
}

#[tokio::test]
async fn test_bounded_run_writes_one_record_per_iteration() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let app = create_test_app(&config).await;

    let (status, body) = send(
        &app,
        "POST",
        "/start-extraction",
        Some(r#"{"pollIntervalMs": 100, "totalIterations": 3}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let started: StartExtractionResponse = serde_json::from_value(body).unwrap();
    assert_eq!(started.poll_interval_ms, 100);
    assert_eq!(started.total_iterations, Some(3));
    assert!(!started.keep_order);
    assert!(started.by_term_language);

    let finished = wait_until_idle(&app).await;
    assert_eq!(finished["lastRun"]["runId"], started.run_id.as_str());
    assert_eq!(finished["lastRun"]["end"], "Completed");
    assert_eq!(finished["lastRun"]["metrics"]["iterationsCompleted"], 3);

    let records = read_records(&config.output.results_path);
    assert_eq!(records.len(), 3);
    for (index, record) in records.iter().enumerate() {
        assert_eq!(record.run_id, started.run_id);
        assert_eq!(record.iteration, index as u64 + 1);
        assert_eq!(record.alerts.len(), 2);
        assert_eq!(record.terms.len(), 2);
        assert_eq!(
            record.matches,
            vec![TermMatch::new("alert-1", 10), TermMatch::new("alert-2", 11)]
        );
    }
}

#[tokio::test]
async fn test_keep_order_and_language_from_request() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let app = create_test_app(&config).await;

    let (status, _) = send(
        &app,
        "POST",
        "/start-extraction",
        Some(r#"{"pollIntervalMs": 100, "totalIterations": 1, "keepOrder": true, "language": "en"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    wait_until_idle(&app).await;

    // Only English content and terms take part
    let records = read_records(&config.output.results_path);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].matches, vec![TermMatch::new("alert-2", 11)]);
}

#[tokio::test]
async fn test_terms_only_see_their_own_language() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    // A French term finds nothing in German or English content
    std::fs::write(
        dir.path().join("terms.json"),
        r#"[{"id": 10, "text": "workers of IG", "language": "fr", "keepOrder": false}]"#,
    )
    .unwrap();
    config.matching.by_term_language = true;
    let app = create_test_app(&config).await;

    let (status, _) = send(
        &app,
        "POST",
        "/start-extraction",
        Some(r#"{"pollIntervalMs": 100, "totalIterations": 1}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    wait_until_idle(&app).await;

    let records = read_records(&config.output.results_path);
    assert_eq!(records.len(), 1);
    assert!(records[0].matches.is_empty());

    let (status, _) = send(
        &app,
        "POST",
        "/start-extraction",
        Some(r#"{"pollIntervalMs": 100, "totalIterations": 1, "byTermLanguage": false}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    wait_until_idle(&app).await;

    let records = read_records(&config.output.results_path);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].matches, vec![TermMatch::new("alert-1", 10)]);
}

#[tokio::test]
async fn test_start_stop_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let app = create_test_app(&create_test_config(dir.path())).await;

    let (status, body) = send(
        &app,
        "POST",
        "/start-extraction",
        Some(r#"{"pollIntervalMs": 1000, "totalIterations": null}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let run_id = body["runId"].as_str().unwrap().to_string();

    let (_, running) = send(&app, "GET", "/extraction-status", None).await;
    assert_eq!(running["status"], "Running");
    assert_eq!(running["runId"], run_id.as_str());

    // A second start is rejected while the first run is active
    let (status, body) = send(
        &app,
        "POST",
        "/start-extraction",
        Some(r#"{"pollIntervalMs": 500, "totalIterations": 3}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error: ErrorResponse = serde_json::from_value(body).unwrap();
    assert_eq!(error.error, "AlreadyRunning");

    let (status, body) = send(&app, "POST", "/stop-extraction", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["runId"], run_id.as_str());
    assert_eq!(body["message"], "Extraction process stopped successfully");

    let (_, idle) = send(&app, "GET", "/extraction-status", None).await;
    assert_eq!(idle["status"], "Idle");
    assert_eq!(idle["lastRun"]["end"], "Cancelled");

    // Stopping again reports that nothing runs
    let (status, body) = send(&app, "POST", "/stop-extraction", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "NotRunning");
}

#[tokio::test]
async fn test_invalid_requests_leave_worker_idle() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let app = create_test_app(&config).await;

    for body in [
        r#"{"pollIntervalMs": 99}"#,
        r#"{"pollIntervalMs": 1001}"#,
        r#"{"pollIntervalMs": 500, "totalIterations": 0}"#,
        r#"{"pollIntervalMs": 500, "language": "english"}"#,
    ] {
        let (status, response) = send(&app, "POST", "/start-extraction", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
        assert_eq!(response["error"], "InvalidConfig", "{}", body);
    }

    let (status, response) = send(&app, "POST", "/start-extraction", Some("[1, 2")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["error"], "BadRequest");

    let (_, idle) = send(&app, "GET", "/extraction-status", None).await;
    assert_eq!(idle["status"], "Idle");
    assert_eq!(read_records(&config.output.results_path).len(), 0);
}

#[test]
fn test_service_config_from_toml() {
    let toml = r#"
        bind_address = "0.0.0.0"
        bind_port = 9000

        [feeds]
        mode = "static"

        [matching]
        keep_order = true
    "#;

    let config = ServiceConfig::from_toml_str(toml).unwrap();
    assert_eq!(config.bind_addr(), "0.0.0.0:9000");
    assert_eq!(config.feeds.mode, FeedMode::Static);
    assert!(config.default_match_options().keep_order);
    assert_eq!(config.stop_grace_period(), Duration::from_secs(5)); // Default
}
