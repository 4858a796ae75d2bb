//! Retention durations for soft-deleted values

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Source of per-purpose retention durations
pub trait RetentionStore: Send + Sync {
    /// How long a value of `column_id` removed from `purpose_id` is kept
    fn retention_duration(&self, column_id: Uuid, purpose_id: Uuid) -> Option<Duration>;

    /// Latest expiry across `purposes`, or `None` if none retain the value
    fn retain_until(&self, column_id: Uuid, purposes: &[Uuid], deleted_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        purposes
            .iter()
            .filter_map(|p| self.retention_duration(column_id, *p))
            .filter(|d| *d > Duration::zero())
            .max()
            .map(|d| deleted_at + d)
    }
}

/// Process-local retention configuration
///
/// Column-specific durations take precedence over purpose-wide defaults.
#[derive(Debug, Default)]
pub struct InMemoryRetentionStore {
    durations: RwLock<HashMap<(Option<Uuid>, Uuid), Duration>>,
}

impl InMemoryRetentionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default duration for `purpose_id`
    pub fn set_purpose_default(&self, purpose_id: Uuid, duration: Duration) {
        if let Ok(mut durations) = self.durations.write() {
            durations.insert((None, purpose_id), duration);
        }
    }

    /// Sets the duration for `purpose_id` on one column
    pub fn set_column_duration(&self, column_id: Uuid, purpose_id: Uuid, duration: Duration) {
        if let Ok(mut durations) = self.durations.write() {
            durations.insert((Some(column_id), purpose_id), duration);
        }
    }
}

impl RetentionStore for InMemoryRetentionStore {
    fn retention_duration(&self, column_id: Uuid, purpose_id: Uuid) -> Option<Duration> {
        let durations = self.durations.read().ok()?;
        durations
            .get(&(Some(column_id), purpose_id))
            .or_else(|| durations.get(&(None, purpose_id)))
            .copied()
    }
}
