//! Soil Telemetry API Server
//!
//! HTTP query boundary over the readings store, plus the process wiring that
//! runs the ingestion loop next to it.

use axum::{
    extract::State,
    http::{header, Method},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use ingestion::{FileSnapshotPublisher, IngestionLoop, IntervalTrigger};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use soil_sensor::{SimulatedSensor, TimedSensor};
use std::future::Future;
use std::sync::Arc;
use storage::Store;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod query;
mod routes;

pub use crate::config::AppConfig;
pub use query::{QueryService, StatsResult};
pub use routes::sensors::{dispatch, ApiResponse};

/// Application state shared across handlers
pub struct AppState {
    pub query: QueryService,
    /// Snapshot file served at /latest_reading.json
    pub snapshot: Option<FileSnapshotPublisher>,
    /// Prometheus recorder, absent when another recorder is installed
    pub metrics: Option<PrometheusHandle>,
    pub version: String,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self {
            query: QueryService::new(store),
            snapshot: None,
            metrics: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            start_time: std::time::Instant::now(),
        }
    }

    pub fn with_snapshot(mut self, snapshot: FileSnapshotPublisher) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub version: String,
    pub uptime_seconds: u64,
    pub database: DatabaseHealth,
}

#[derive(Debug, Serialize)]
pub struct DatabaseHealth {
    pub status: String,
    pub reading_count: Option<u64>,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET]);

    Router::new()
        .route("/api/v1/health", get(health_handler))
        .route("/api/sensor", get(routes::sensors::sensor_api))
        .route("/cgi-bin/api.py", get(routes::sensors::sensor_api))
        .route("/latest_reading.json", get(routes::sensors::latest_snapshot))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check handler
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match state.query.store().count().await {
        Ok(count) => DatabaseHealth {
            status: "ok".to_string(),
            reading_count: Some(count),
        },
        Err(e) => {
            warn!(error = %e, "Health check could not reach the store");
            DatabaseHealth {
                status: e.to_string(),
                reading_count: None,
            }
        }
    };
    let status = if database.reading_count.is_some() {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: state.query.store().now().timestamp(),
        version: state.version.clone(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        database,
    })
}

/// Prometheus text exposition of ingestion counters
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

/// Initialize logging; `RUST_LOG` wins over the configured level
pub fn init_logging(
    config: &crate::config::LogConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}

/// Install the global Prometheus recorder
pub fn init_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "Metrics recorder not installed");
            None
        }
    }
}

/// Serve the router until `shutdown` resolves
pub async fn run_server(
    addr: &str,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_router(state);

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

/// Run one ingestion cycle and report whether a reading was stored
pub async fn run_once(config: &AppConfig) -> Result<bool, Box<dyn std::error::Error>> {
    let store = Store::open(&config.store_config()).await?;
    let mut ingest = IngestionLoop::new(
        TimedSensor::new(
            SimulatedSensor::new(config.ingest.simulation_seed),
            config.sensor_timeout(),
        ),
        store.clone(),
        config.retention(),
        FileSnapshotPublisher::new(&config.snapshot.path),
    );

    let stored = ingest.tick().await.is_stored();
    store.close().await;
    Ok(stored)
}

/// Run the ingestion loop and the API server until ctrl-c
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = Store::open(&config.store_config()).await?;
    let snapshot = FileSnapshotPublisher::new(&config.snapshot.path);

    let mut state = AppState::new(store.clone()).with_snapshot(snapshot.clone());
    if let Some(handle) = init_metrics() {
        state = state.with_metrics(handle);
    }

    let mut ingest = IngestionLoop::new(
        TimedSensor::new(
            SimulatedSensor::new(config.ingest.simulation_seed),
            config.sensor_timeout(),
        ),
        store.clone(),
        config.retention(),
        snapshot,
    );
    let trigger = IntervalTrigger::new(config.poll_interval());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ingest_task = tokio::spawn(async move { ingest.run(trigger, shutdown_rx).await });

    let server = run_server(&config.server.bind_addr, Arc::new(state), async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
        }
        info!("Shutdown requested");
    })
    .await;

    // The loop finishes any in-flight cycle before observing this
    let _ = shutdown_tx.send(true);
    let summary = ingest_task.await?;
    info!(
        cycles = summary.cycles,
        stored = summary.stored,
        "Ingestion finished"
    );
    store.close().await;

    server
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use ingestion::SnapshotPublisher;
    use serde_json::{json, Value};
    use storage::ManualClock;
    use tower::ServiceExt;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap()
    }

    async fn store() -> Store {
        Store::in_memory()
            .await
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(now())))
    }

    async fn seeded_store() -> Store {
        let store = store().await;
        store.insert(20.0, 300, Some(now())).await.unwrap();
        store
            .insert(22.0, 310, Some(now() - Duration::hours(1)))
            .await
            .unwrap();
        store
            .insert(25.0, 330, Some(now() - Duration::hours(25)))
            .await
            .unwrap();
        store
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn app(store: Store) -> Router {
        create_router(Arc::new(AppState::new(store)))
    }

    #[tokio::test]
    async fn test_default_action_is_latest() {
        let (status, body) = get(app(seeded_store().await), "/api/sensor").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["temperature"], 20.0);
        assert_eq!(body["moisture"], 300);
        assert_eq!(body["temperature_f"], 68.0);
        assert_eq!(body["timestamp"], "2024-06-02T12:00:00Z");
    }

    #[tokio::test]
    async fn test_latest_on_empty_store_is_null() {
        let (status, body) = get(app(store().await), "/api/sensor?action=latest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
    }

    #[tokio::test]
    async fn test_history_and_stats() {
        let app = app(seeded_store().await);

        let (_, history) = get(app.clone(), "/api/sensor?action=history&period=24").await;
        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["temperature"], 22.0);
        assert_eq!(history[1]["temperature"], 20.0);

        let (_, stats) = get(app, "/api/sensor?action=stats&period=24").await;
        assert_eq!(
            stats,
            json!({
                "count": 2,
                "temperature": { "average": 21.0, "minimum": 20.0, "maximum": 22.0 },
                "moisture": { "average": 305, "minimum": 300, "maximum": 310 }
            })
        );
    }

    #[tokio::test]
    async fn test_bad_period_behaves_like_default() {
        let app = app(seeded_store().await);

        for action in ["history", "stats"] {
            let (_, expected) = get(app.clone(), &format!("/api/sensor?action={action}")).await;
            for period in ["abc", "0", "-4", ""] {
                let uri = format!("/cgi-bin/api.py?action={action}&period={period}");
                let (status, body) = get(app.clone(), &uri).await;
                assert_eq!(status, StatusCode::OK);
                assert_eq!(body, expected, "period={period:?}");
            }
        }
    }

    #[tokio::test]
    async fn test_repeated_period_falls_back_to_default() {
        let app = app(seeded_store().await);

        let (_, expected) = get(app.clone(), "/api/sensor?action=stats&period=24").await;
        let (status, body) = get(app, "/api/sensor?action=stats&period=1&period=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, expected);
    }

    #[tokio::test]
    async fn test_repeated_action_is_invalid() {
        let (status, body) = get(
            app(seeded_store().await),
            "/api/sensor?action=latest&action=history",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "error": "Invalid action parameter" }));
    }

    #[tokio::test]
    async fn test_stats_on_empty_store() {
        let (_, body) = get(app(store().await), "/api/sensor?action=stats").await;
        assert_eq!(body, json!({ "count": 0 }));
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let (status, body) = get(app(store().await), "/api/sensor?action=purge").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "error": "Invalid action parameter" }));
    }

    #[tokio::test]
    async fn test_storage_failure_is_error_body() {
        let store = store().await;
        store.close().await;

        let (status, body) = get(app(store), "/api/sensor?action=history").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get(app(seeded_store().await), "/api/v1/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"]["reading_count"], 3);
    }

    #[tokio::test]
    async fn test_snapshot_route() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = FileSnapshotPublisher::new(dir.path().join("latest_reading.json"));
        let store = seeded_store().await;
        let state = Arc::new(AppState::new(store.clone()).with_snapshot(snapshot.clone()));

        let (_, body) = get(create_router(state.clone()), "/latest_reading.json").await;
        assert_eq!(body, Value::Null);

        let latest = store.latest().await.unwrap().unwrap();
        snapshot.publish(&latest).await.unwrap();
        let (_, body) = get(create_router(state), "/latest_reading.json").await;
        assert_eq!(body["moisture"], 300);
        assert_eq!(body["temperature_f"], 68.0);
    }

    #[tokio::test]
    async fn test_dispatch_without_transport() {
        let service = QueryService::new(seeded_store().await);
        let response = dispatch(&service, Some("history"), Some("48")).await;
        match response {
            ApiResponse::History(readings) => assert_eq!(readings.len(), 3),
            other => panic!("unexpected response {other:?}"),
        }
    }
}
