//! Read-only queries over the readings table

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use storage::{round_dp, Aggregate, PresentedReading, StorageError, Store};
use thiserror::Error;
use tracing::debug;

/// Window used when `period` is absent, unparsable or not positive
pub const DEFAULT_PERIOD_HOURS: i64 = 24;

/// Query failures; absence of data is never one of these
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{0}")]
    Storage(#[from] StorageError),
}

/// Forgiving `period` parameter: anything but a positive integer means the default
pub fn parse_period(raw: Option<&str>) -> i64 {
    raw.and_then(|s| s.trim().parse::<i64>().ok())
        .filter(|hours| *hours > 0)
        .unwrap_or(DEFAULT_PERIOD_HOURS)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TemperatureStats {
    pub average: f64,
    pub minimum: f64,
    pub maximum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MoistureStats {
    pub average: i64,
    pub minimum: i64,
    pub maximum: i64,
}

/// Window statistics; only `count` is present for an empty window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatsResult {
    pub count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<TemperatureStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moisture: Option<MoistureStats>,
}

impl From<Aggregate> for StatsResult {
    fn from(aggregate: Aggregate) -> Self {
        match aggregate {
            Aggregate::EmptyWindow => Self {
                count: 0,
                temperature: None,
                moisture: None,
            },
            Aggregate::Window(stats) => Self {
                count: stats.count,
                temperature: Some(TemperatureStats {
                    average: round_dp(stats.temperature_avg, 1),
                    minimum: round_dp(stats.temperature_min, 1),
                    maximum: round_dp(stats.temperature_max, 1),
                }),
                moisture: Some(MoistureStats {
                    average: round_dp(stats.moisture_avg, 0) as i64,
                    minimum: stats.moisture_min,
                    maximum: stats.moisture_max,
                }),
            },
        }
    }
}

/// Presentation layer over [`Store`]: unit conversion and rounding live here
#[derive(Clone)]
pub struct QueryService {
    store: Store,
}

impl QueryService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Most recent reading; `None` for an empty store
    pub async fn get_latest(&self) -> Result<Option<PresentedReading>, QueryError> {
        let latest = self.store.latest().await?;
        Ok(latest.as_ref().map(PresentedReading::from))
    }

    /// Readings from the last `hours`, oldest first
    pub async fn get_history(&self, hours: i64) -> Result<Vec<PresentedReading>, QueryError> {
        let since = self.window_start(hours);
        let readings = self.store.range(since).await?;
        debug!(hours, %since, count = readings.len(), "History query");
        Ok(readings.iter().map(PresentedReading::from).collect())
    }

    /// Aggregate statistics over the last `hours`
    pub async fn get_stats(&self, hours: i64) -> Result<StatsResult, QueryError> {
        let since = self.window_start(hours);
        let aggregate = self.store.aggregate(since).await?;
        debug!(hours, %since, count = aggregate.count(), "Stats query");
        Ok(aggregate.into())
    }

    fn window_start(&self, hours: i64) -> DateTime<Utc> {
        let hours = if hours > 0 { hours } else { DEFAULT_PERIOD_HOURS };
        let now = self.store.now();
        Duration::try_hours(hours)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use storage::ManualClock;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 2, 12, 0, 0).unwrap()
    }

    async fn service() -> QueryService {
        let store = Store::in_memory()
            .await
            .unwrap()
            .with_clock(Arc::new(ManualClock::new(now())));
        QueryService::new(store)
    }

    async fn seed_scenario(service: &QueryService) {
        let store = service.store();
        store.insert(20.0, 300, Some(now())).await.unwrap();
        store
            .insert(22.0, 310, Some(now() - Duration::hours(1)))
            .await
            .unwrap();
        store
            .insert(25.0, 330, Some(now() - Duration::hours(25)))
            .await
            .unwrap();
    }

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period(None), 24);
        assert_eq!(parse_period(Some("48")), 48);
        assert_eq!(parse_period(Some(" 6 ")), 6);
        assert_eq!(parse_period(Some("abc")), 24);
        assert_eq!(parse_period(Some("")), 24);
        assert_eq!(parse_period(Some("0")), 24);
        assert_eq!(parse_period(Some("-5")), 24);
        assert_eq!(parse_period(Some("2.5")), 24);
    }

    #[tokio::test]
    async fn test_empty_store() {
        let service = service().await;

        assert_eq!(service.get_latest().await.unwrap(), None);
        assert!(service.get_history(24).await.unwrap().is_empty());

        let stats = service.get_stats(24).await.unwrap();
        assert_eq!(stats.count, 0);
        assert_eq!(
            serde_json::to_value(stats).unwrap(),
            serde_json::json!({ "count": 0 })
        );
    }

    #[tokio::test]
    async fn test_history_window() {
        let service = service().await;
        seed_scenario(&service).await;

        let history = service.get_history(24).await.unwrap();
        let temps: Vec<_> = history.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![22.0, 20.0]);
        assert_eq!(history[0].timestamp, now() - Duration::hours(1));
        assert_eq!(history[0].temperature_f, 71.6);
        assert_eq!(history[1].moisture, 300);
    }

    #[tokio::test]
    async fn test_stats_window() {
        let service = service().await;
        seed_scenario(&service).await;

        let stats = service.get_stats(24).await.unwrap();
        assert_eq!(
            serde_json::to_value(stats).unwrap(),
            serde_json::json!({
                "count": 2,
                "temperature": { "average": 21.0, "minimum": 20.0, "maximum": 22.0 },
                "moisture": { "average": 305, "minimum": 300, "maximum": 310 }
            })
        );
    }

    #[tokio::test]
    async fn test_stats_averages_round_half_to_even() {
        let service = service().await;
        let store = service.store();
        store.insert(21.0, 300, Some(now())).await.unwrap();
        store
            .insert(21.5, 301, Some(now() - Duration::minutes(5)))
            .await
            .unwrap();

        let stats = service.get_stats(24).await.unwrap();
        assert_eq!(stats.temperature.unwrap().average, 21.2);
        assert_eq!(stats.moisture.unwrap().average, 300);
    }

    #[tokio::test]
    async fn test_non_positive_hours_use_default() {
        let service = service().await;
        seed_scenario(&service).await;

        assert_eq!(
            service.get_history(0).await.unwrap(),
            service.get_history(24).await.unwrap()
        );
        assert_eq!(
            service.get_stats(-3).await.unwrap(),
            service.get_stats(24).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_huge_period_covers_everything() {
        let service = service().await;
        seed_scenario(&service).await;

        assert_eq!(service.get_history(i64::MAX).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_latest_round_trip() {
        let service = service().await;
        service
            .store()
            .insert(23.456, 612, Some(now()))
            .await
            .unwrap();

        let latest = service.get_latest().await.unwrap().unwrap();
        assert_eq!(latest.temperature, 23.5);
        assert_eq!(latest.temperature_f, round_dp(23.456 * 9.0 / 5.0 + 32.0, 1));
        assert_eq!(latest.moisture, 612);
    }

    #[tokio::test]
    async fn test_storage_failure_is_an_error() {
        let service = service().await;
        service.store().close().await;

        assert!(service.get_latest().await.is_err());
        assert!(service.get_stats(24).await.is_err());
    }
}
