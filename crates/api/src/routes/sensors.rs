//! Sensor Routes
//!
//! The query boundary: `action` selects latest/history/stats, `period` is
//! the window in hours. Every application outcome is a 200 with a JSON body.

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use storage::PresentedReading;
use tracing::{debug, warn};

use crate::query::{parse_period, QueryService, StatsResult};
use crate::AppState;

/// Query parameters for the sensor endpoint, kept as raw strings so bad input never rejects
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SensorQuery {
    pub action: Option<String>,
    pub period: Option<String>,
}

impl SensorQuery {
    /// Collect the known keys; unknown keys are ignored.
    ///
    /// A key given more than once collapses into one comma-joined value, which
    /// is never a valid action or period.
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "action" => &mut query.action,
                "period" => &mut query.period,
                _ => continue,
            };
            if let Some(existing) = slot.as_mut() {
                existing.push(',');
                existing.push_str(&value);
            } else {
                *slot = Some(value);
            }
        }
        query
    }
}

/// Body of every boundary response
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ApiResponse {
    /// `null` when the store is empty
    Latest(Option<PresentedReading>),
    History(Vec<PresentedReading>),
    Stats(StatsResult),
    Error { error: String },
}

impl ApiResponse {
    pub fn error(message: impl Into<String>) -> Self {
        ApiResponse::Error {
            error: message.into(),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let body = serde_json::to_string_pretty(&self).unwrap_or_else(|e| {
            serde_json::json!({ "error": format!("Server error: {e}") }).to_string()
        });
        ([(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

/// Route one request to the matching query
pub async fn dispatch(
    service: &QueryService,
    action: Option<&str>,
    period: Option<&str>,
) -> ApiResponse {
    let hours = parse_period(period);
    let action = action.unwrap_or("latest");
    debug!(action, hours, "Sensor API request");

    let result = match action {
        "latest" => service.get_latest().await.map(ApiResponse::Latest),
        "history" => service.get_history(hours).await.map(ApiResponse::History),
        "stats" => service.get_stats(hours).await.map(ApiResponse::Stats),
        _ => return ApiResponse::error("Invalid action parameter"),
    };

    result.unwrap_or_else(|e| {
        warn!(action, hours, error = %e, "Sensor query failed");
        ApiResponse::error(e.to_string())
    })
}

/// GET /api/sensor (also served at the legacy CGI path)
pub async fn sensor_api(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> ApiResponse {
    let params = SensorQuery::from_pairs(pairs);
    dispatch(
        &state.query,
        params.action.as_deref(),
        params.period.as_deref(),
    )
    .await
}

/// GET /latest_reading.json: the snapshot written by the ingestion loop
pub async fn latest_snapshot(State(state): State<Arc<AppState>>) -> ApiResponse {
    let Some(snapshot) = &state.snapshot else {
        return ApiResponse::error("Snapshot publishing is not configured");
    };

    match snapshot.load().await {
        Ok(reading) => ApiResponse::Latest(reading),
        Err(e) => {
            warn!(path = %snapshot.path().display(), error = %e, "Failed to read snapshot");
            ApiResponse::error(e.to_string())
        }
    }
}
