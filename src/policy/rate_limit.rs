//! Sliding-window execution rate limiting
//!
//! Executions are counted in fixed buckets (one second by default). The
//! window covers the `max_execution_duration_seconds / bucket` most recent
//! buckets; a call is admitted only while the window total is below
//! `max_executions`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::clock::Clock;

use super::access_policy::AccessPolicy;
use super::errors::{PolicyError, PolicyResult};
use super::thresholds::GateOutcome;

const SWEEP_INTERVAL: u64 = 1024;

/// Identity of one execution-rate window.
///
/// Every accessor, mutator and token resolution governed by the same
/// policy draws on one shared window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub policy_id: Uuid,
}

/// Shared store of execution-rate windows
pub trait RateLimitStore: Send + Sync {
    /// Atomically reserves one execution in bucket `bucket` for `key`.
    ///
    /// Buckets older than `bucket - window_buckets + 1` no longer count.
    /// Returns false, without recording anything, when the window already
    /// holds `max` executions.
    fn try_reserve(&self, key: &RateLimitKey, bucket: i64, window_buckets: i64, max: u64) -> PolicyResult<bool>;
}

/// Process-local rate limit store
///
/// Windows are created lazily on first use and dropped once all of their
/// buckets have expired.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    windows: Mutex<HashMap<RateLimitKey, VecDeque<(i64, u64)>>>,
    reservations: AtomicU64,
}

impl InMemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live windows
    pub fn len(&self) -> usize {
        self.windows.lock().map(|w| w.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(buckets: &mut VecDeque<(i64, u64)>, oldest: i64) {
        while buckets.front().map(|(b, _)| *b < oldest).unwrap_or(false) {
            buckets.pop_front();
        }
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn try_reserve(&self, key: &RateLimitKey, bucket: i64, window_buckets: i64, max: u64) -> PolicyResult<bool> {
        let mut windows = self
            .windows
            .lock()
            .map_err(|_| PolicyError::RateLimitStore("rate limit store lock poisoned".into()))?;
        let oldest = bucket - window_buckets + 1;

        if self.reservations.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            windows.retain(|_, buckets| {
                Self::prune(buckets, oldest - window_buckets);
                !buckets.is_empty()
            });
        }

        let buckets = windows.entry(*key).or_default();
        Self::prune(buckets, oldest);

        let used: u64 = buckets.iter().map(|(_, count)| count).sum();
        if used >= max {
            return Ok(false);
        }

        match buckets.back_mut() {
            Some((last, count)) if *last == bucket => *count += 1,
            _ => buckets.push_back((bucket, 1)),
        }
        Ok(true)
    }
}

/// Execution-rate gate
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
    bucket_seconds: u64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>, bucket_seconds: u64) -> Self {
        Self {
            store,
            clock,
            bucket_seconds: bucket_seconds.max(1),
        }
    }

    fn bucket_of(&self, at: DateTime<Utc>) -> i64 {
        at.timestamp().div_euclid(self.bucket_seconds as i64)
    }

    /// Checks and records one execution under `policy`
    pub fn check(&self, policy: &AccessPolicy) -> PolicyResult<GateOutcome> {
        let thresholds = &policy.thresholds;
        if !thresholds.has_rate_limit() {
            return Ok(GateOutcome::Admitted);
        }

        let key = RateLimitKey { policy_id: policy.id };
        let window_buckets = (thresholds.max_execution_duration_seconds / self.bucket_seconds).max(1) as i64;
        let bucket = self.bucket_of(self.clock.now());

        if self
            .store
            .try_reserve(&key, bucket, window_buckets, thresholds.max_executions)?
        {
            Ok(GateOutcome::Admitted)
        } else {
            Ok(thresholds.rate_exceeded())
        }
    }
}
