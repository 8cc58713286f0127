//! HTTP request handlers for the Termwatch service.
//!
//! Exposes start, stop and status of the extraction worker plus a health
//! check using axum.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router as AxumRouter,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use termwatch_domain::MatchOptions;
use termwatch_worker::{FinishedRun, WorkerConfig, WorkerController, WorkerError, WorkerState};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The single worker controller of this process
    pub controller: Arc<WorkerController>,
    /// Matching options for start requests that leave them out
    pub match_defaults: MatchOptions,
}

impl AppState {
    /// Create state around a controller with default matching options
    pub fn new(controller: WorkerController) -> Self {
        Self {
            controller: Arc::new(controller),
            match_defaults: MatchOptions::default(),
        }
    }

    /// Set the matching defaults
    pub fn with_match_defaults(mut self, match_defaults: MatchOptions) -> Self {
        self.match_defaults = match_defaults;
        self
    }
}

/// Start request
///
/// Numeric fields are signed so out-of-range values are reported as
/// configuration errors instead of decode failures.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExtractionRequest {
    /// Delay between iterations in milliseconds
    pub poll_interval_ms: i64,
    /// Iteration budget; absent or null runs until stopped
    #[serde(default)]
    pub total_iterations: Option<i64>,
    /// Overrides the configured ordered-matching default
    #[serde(default)]
    pub keep_order: Option<bool>,
    /// Overrides the configured language filter
    #[serde(default)]
    pub language: Option<String>,
    /// Overrides the configured per-term language matching
    #[serde(default)]
    pub by_term_language: Option<bool>,
}

impl StartExtractionRequest {
    /// Build the run configuration, filling gaps from `defaults`
    pub fn into_config(self, defaults: &MatchOptions) -> Result<WorkerConfig, WorkerError> {
        let poll_interval_ms = u64::try_from(self.poll_interval_ms).map_err(|_| {
            WorkerError::InvalidConfig(format!(
                "pollIntervalMs must be between 100 and 1000 (got {})",
                self.poll_interval_ms
            ))
        })?;

        let total_iterations = self
            .total_iterations
            .map(|n| {
                u64::try_from(n).map_err(|_| {
                    WorkerError::InvalidConfig(
                        "totalIterations must be a positive integer or null".to_string(),
                    )
                })
            })
            .transpose()?;

        let matching = MatchOptions {
            keep_order: self.keep_order.unwrap_or(defaults.keep_order),
            language: self.language.or_else(|| defaults.language.clone()),
            by_term_language: self.by_term_language.unwrap_or(defaults.by_term_language),
        };

        Ok(WorkerConfig::new(poll_interval_ms, total_iterations).with_matching(matching))
    }
}

/// Start response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartExtractionResponse {
    /// Human-readable summary
    pub message: String,
    /// Identifier of the new run
    pub run_id: String,
    /// Accepted poll interval
    pub poll_interval_ms: u64,
    /// Accepted iteration budget
    pub total_iterations: Option<u64>,
    /// Whether terms are matched in order
    pub keep_order: bool,
    /// Active language filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Whether each term only sees content in its own language
    pub by_term_language: bool,
}

/// Stop response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopExtractionResponse {
    /// Human-readable summary
    pub message: String,
    /// Run that was stopped
    pub run_id: String,
    /// Successful iterations of the stopped run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations_completed: Option<u64>,
}

/// Status response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Idle or Running
    pub status: WorkerState,
    /// Active run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Successful iterations of the active run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations_completed: Option<u64>,
    /// Failed iterations of the active run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations_failed: Option<u64>,
    /// Start time of the active run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Whether the active run has been asked to stop
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stop_requested: bool,
    /// Most recently finished run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<FinishedRun>,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthCheckResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,
    /// Unix time in seconds
    pub timestamp: f64,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error kind (e.g. "AlreadyRunning")
    pub error: String,
    /// Error message
    pub message: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    /// Worker lifecycle or configuration error
    Worker(WorkerError),
    /// Request body could not be decoded
    BadRequest(String),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Worker(WorkerError::InvalidConfig(_)) => "InvalidConfig",
            AppError::Worker(WorkerError::AlreadyRunning(_)) => "AlreadyRunning",
            AppError::Worker(WorkerError::NotRunning) => "NotRunning",
            AppError::Worker(WorkerError::StartFailed(_)) => "StartFailed",
            AppError::Worker(WorkerError::StopFailed { .. }) => "StopFailed",
            AppError::BadRequest(_) => "BadRequest",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Worker(WorkerError::StartFailed(_))
            | AppError::Worker(WorkerError::StopFailed { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.kind().to_string();
        let message = match self {
            AppError::Worker(e) => e.to_string(),
            AppError::BadRequest(msg) => msg,
        };

        let body = Json(ErrorResponse { error, message });
        (status, body).into_response()
    }
}

impl From<WorkerError> for AppError {
    fn from(e: WorkerError) -> Self {
        AppError::Worker(e)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// POST /start-extraction - Start a run in the background
async fn start_extraction(
    State(state): State<AppState>,
    request: Result<Json<StartExtractionRequest>, JsonRejection>,
) -> Result<Json<StartExtractionResponse>, AppError> {
    let Json(request) = request?;
    let config = request.into_config(&state.match_defaults)?;

    let ticket = state.controller.start(config)?;
    let config = ticket.config;

    Ok(Json(StartExtractionResponse {
        message: format!(
            "Extraction started with frequency {}ms and {} checks",
            config.poll_interval_ms,
            config.budget_label()
        ),
        run_id: ticket.run_id,
        poll_interval_ms: config.poll_interval_ms,
        total_iterations: config.total_iterations,
        keep_order: config.matching.keep_order,
        language: config.matching.language,
        by_term_language: config.matching.by_term_language,
    }))
}

/// POST /stop-extraction - Cancel the active run and wait for it
async fn stop_extraction(
    State(state): State<AppState>,
) -> Result<Json<StopExtractionResponse>, AppError> {
    let report = state.controller.stop().await?;

    Ok(Json(StopExtractionResponse {
        message: "Extraction process stopped successfully".to_string(),
        run_id: report.run_id,
        iterations_completed: report.finished.map(|run| run.metrics.iterations_completed),
    }))
}

/// GET /extraction-status - Current worker state
async fn extraction_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.controller.status();

    Json(StatusResponse {
        status: status.state,
        run_id: status.run_id,
        iterations_completed: status.iterations_completed,
        iterations_failed: status.iterations_failed,
        started_at: status.started_at,
        stop_requested: status.stop_requested,
        last_run: status.last_run,
    })
}

/// GET /health - Liveness check
async fn health_check() -> Json<HealthCheckResponse> {
    let now = Utc::now();

    Json(HealthCheckResponse {
        status: "healthy".to_string(),
        timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
    })
}

/// Create the axum router with all routes
pub fn create_router(state: AppState) -> AxumRouter {
    AxumRouter::new()
        .route("/start-extraction", post(start_extraction))
        .route("/stop-extraction", post(stop_extraction))
        .route("/extraction-status", get(extraction_status))
        .route("/health", get(health_check))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use termwatch_feeds::{StaticAlertSource, StaticTermSource};
    use termwatch_worker::{ExtractionLoop, MemorySink};
    use tower::ServiceExt; // for oneshot

    fn create_test_state() -> AppState {
        let pipeline = ExtractionLoop::new(
            Arc::new(StaticAlertSource::default()),
            Arc::new(StaticTermSource::default()),
            Arc::new(MemorySink::new()),
        );
        AppState::new(WorkerController::new(pipeline))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn error_kind(response: Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        error.error
    }

    #[test]
    fn test_request_defaults() {
        let request: StartExtractionRequest =
            serde_json::from_str(r#"{"pollIntervalMs": 500}"#).unwrap();
        let defaults = MatchOptions::ordered()
            .with_language("de")
            .with_term_language();

        let config = request.into_config(&defaults).unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert!(config.is_unbounded());
        assert_eq!(config.matching, defaults);
    }

    #[test]
    fn test_request_overrides_defaults() {
        let request: StartExtractionRequest = serde_json::from_str(
            r#"{"pollIntervalMs": 200, "totalIterations": 4, "keepOrder": false, "language": "en"}"#,
        )
        .unwrap();

        let config = request
            .into_config(&MatchOptions::ordered().with_language("de"))
            .unwrap();
        assert_eq!(config.total_iterations, Some(4));
        assert!(!config.matching.keep_order);
        assert_eq!(config.matching.language.as_deref(), Some("en"));
    }

    #[test]
    fn test_request_switches_term_language_off() {
        let request: StartExtractionRequest =
            serde_json::from_str(r#"{"pollIntervalMs": 200, "byTermLanguage": false}"#).unwrap();

        let config = request
            .into_config(&MatchOptions::default().with_term_language())
            .unwrap();
        assert!(!config.matching.by_term_language);
        assert!(config.matching.language.is_none());
    }

    #[test]
    fn test_negative_values_are_config_errors() {
        let request: StartExtractionRequest =
            serde_json::from_str(r#"{"pollIntervalMs": -5}"#).unwrap();
        assert!(matches!(
            request.into_config(&MatchOptions::default()),
            Err(WorkerError::InvalidConfig(_))
        ));

        let request: StartExtractionRequest =
            serde_json::from_str(r#"{"pollIntervalMs": 500, "totalIterations": -1}"#).unwrap();
        assert!(matches!(
            request.into_config(&MatchOptions::default()),
            Err(WorkerError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(create_test_state());

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_start_rejects_out_of_range_interval() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(post_json("/start-extraction", r#"{"pollIntervalMs": 50}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(response).await, "InvalidConfig");
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let app = create_router(create_test_state());

        let response = app
            .oneshot(post_json("/start-extraction", "{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(response).await, "BadRequest");
    }

    #[tokio::test]
    async fn test_stop_when_idle() {
        let app = create_router(create_test_state());

        let request = Request::builder()
            .method("POST")
            .uri("/stop-extraction")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_kind(response).await, "NotRunning");
    }

    #[test]
    fn test_error_status_mapping() {
        let failed = AppError::from(WorkerError::StartFailed("no runtime".to_string()));
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.kind(), "StartFailed");

        let timeout = AppError::from(WorkerError::StopFailed {
            run_id: "run".to_string(),
            grace_period: std::time::Duration::from_secs(5),
        });
        assert_eq!(timeout.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let busy = AppError::from(WorkerError::AlreadyRunning("run".to_string()));
        assert_eq!(busy.status(), StatusCode::BAD_REQUEST);
        assert_eq!(busy.kind(), "AlreadyRunning");
    }
}
