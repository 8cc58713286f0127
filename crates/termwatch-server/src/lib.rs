//! Termwatch Server
//!
//! HTTP front door for the extraction worker: wires feeds, sink and
//! controller together from a [`config::ServiceConfig`] and serves the
//! start, stop, status and health endpoints.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;

use config::{ConfigError, FeedMode, FeedsConfig, ServiceConfig};
use handlers::{create_router, AppState};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use termwatch_domain::{AlertTextSource, QueryTermSource, SinkError};
use termwatch_feeds::{
    wire, FeedEndpoint, FeedError, HttpAlertSource, HttpTermSource, StaticAlertSource,
    StaticTermSource,
};
use termwatch_worker::{ExtractionLoop, JsonlSink, WorkerController, WorkerState};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Feed client could not be created
    #[error("Feed setup error: {0}")]
    Feed(#[from] FeedError),

    /// Results file could not be opened
    #[error("Results sink error: {0}")]
    Sink(#[from] SinkError),

    /// Static feed file could not be loaded
    #[error("Failed to load feed file {path}: {message}")]
    FeedFile {
        /// File that failed
        path: String,
        /// What went wrong
        message: String,
    },

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Build the alert and term sources described by `feeds`
pub fn build_sources(
    feeds: &FeedsConfig,
) -> Result<(Arc<dyn AlertTextSource>, Arc<dyn QueryTermSource>), ServerError> {
    match feeds.mode {
        FeedMode::Http => {
            let endpoint = |url: &str| {
                FeedEndpoint::new(url, feeds.api_key.as_str())
                    .with_timeout(Duration::from_secs(feeds.timeout_secs))
                    .with_max_attempts(feeds.max_attempts)
            };
            let alerts = HttpAlertSource::new(endpoint(&feeds.alerts_url))?;
            let terms = HttpTermSource::new(endpoint(&feeds.terms_url))?;
            Ok((Arc::new(alerts), Arc::new(terms)))
        }
        FeedMode::Static => {
            let alerts = match &feeds.alerts_file {
                Some(path) => wire::decode_alerts(read_feed_file(path)?)
                    .map_err(|e| feed_file_error(path, e))?,
                None => Vec::new(),
            };
            let terms = match &feeds.terms_file {
                Some(path) => wire::decode_terms(read_feed_file(path)?)
                    .map_err(|e| feed_file_error(path, e))?,
                None => Vec::new(),
            };
            info!(
                "Using static feeds ({} alerts, {} terms)",
                alerts.len(),
                terms.len()
            );
            Ok((
                Arc::new(StaticAlertSource::new(alerts)),
                Arc::new(StaticTermSource::new(terms)),
            ))
        }
    }
}

fn read_feed_file(path: &Path) -> Result<serde_json::Value, ServerError> {
    let contents = std::fs::read_to_string(path).map_err(|e| feed_file_error(path, e))?;
    serde_json::from_str(&contents).map_err(|e| feed_file_error(path, e))
}

fn feed_file_error(path: &Path, error: impl std::fmt::Display) -> ServerError {
    ServerError::FeedFile {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}

/// Build the application state: sources, results sink and controller
pub async fn build_state(config: &ServiceConfig) -> Result<AppState, ServerError> {
    config.validate()?;

    let (alerts, terms) = build_sources(&config.feeds)?;
    let sink = JsonlSink::open(&config.output.results_path).await?;
    info!("Writing results to {}", sink.path().display());

    let controller = WorkerController::new(ExtractionLoop::new(alerts, terms, Arc::new(sink)))
        .with_grace_period(config.stop_grace_period());

    Ok(AppState::new(controller).with_match_defaults(config.default_match_options()))
}

/// Start the Termwatch HTTP server
///
/// Serves until Ctrl+C, then stops any active run before returning.
pub async fn start_server(config: ServiceConfig) -> Result<(), ServerError> {
    info!("Starting Termwatch");
    info!("Bind address: {}", config.bind_addr());
    info!("Feed mode: {:?}", config.feeds.mode);
    info!(
        "Stop grace period: {}ms",
        config.worker.stop_grace_period_ms
    );

    let state = build_state(&config).await?;
    let controller = state.controller.clone();
    let app = create_router(state);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Termwatch listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    if controller.status().state == WorkerState::Running {
        info!("Stopping active extraction run before exit");
        if let Err(e) = controller.stop().await {
            tracing::error!("Failed to stop extraction run on shutdown: {}", e);
        }
    }

    info!("Termwatch stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_sources_default_to_empty_pages() {
        let config = ServiceConfig::default_test_config();
        assert!(build_sources(&config.feeds).is_ok());
    }

    #[test]
    fn test_missing_feed_file() {
        let mut config = ServiceConfig::default_test_config();
        config.feeds.alerts_file = Some("/nonexistent/alerts.json".into());

        assert!(matches!(
            build_sources(&config.feeds),
            Err(ServerError::FeedFile { .. })
        ));
    }

    #[test]
    fn test_http_sources_need_api_key() {
        let config = ServiceConfig::default();
        assert!(matches!(
            build_sources(&config.feeds),
            Err(ServerError::Feed(FeedError::MissingSetting("api_key")))
        ));
    }

    #[tokio::test]
    async fn test_build_state_rejects_invalid_config() {
        let config = ServiceConfig::default();
        assert!(matches!(
            build_state(&config).await,
            Err(ServerError::Config(ConfigError::MissingField(_)))
        ));
    }
}
