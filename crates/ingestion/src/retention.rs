//! Retention horizon

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use storage::{StorageError, Store};

/// Default maximum age of a stored reading
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Retires expired rows after each successful insert
pub trait Retention: Send + Sync {
    /// Delete what has expired as of `now`, returning the number of rows removed
    fn apply(
        &self,
        store: &Store,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;
}

/// Rows older than `now - window` become eligible for deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: Duration,
}

impl RetentionPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_days(days: u32) -> Self {
        Self::new(Duration::days(i64::from(days)))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// `now - window`, saturating at the earliest representable time
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl Retention for RetentionPolicy {
    async fn apply(&self, store: &Store, now: DateTime<Utc>) -> Result<u64, StorageError> {
        store.delete_older_than(self.cutoff(now)).await
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_days(DEFAULT_RETENTION_DAYS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_cutoff_is_thirty_days() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();
        let cutoff = RetentionPolicy::default().cutoff(now);
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_cutoff_saturates() {
        let policy = RetentionPolicy::from_days(u32::MAX);
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(policy.cutoff(now), DateTime::<Utc>::MIN_UTC);
    }

    #[tokio::test]
    async fn test_apply_deletes_only_expired() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let store = Store::in_memory().await.unwrap();
        store
            .insert(14.0, 450, Some(now - Duration::days(31)))
            .await
            .unwrap();
        store
            .insert(15.0, 460, Some(now - Duration::days(1)))
            .await
            .unwrap();

        let removed = RetentionPolicy::default().apply(&store, now).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
