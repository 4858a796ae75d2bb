//! Engine counters
//!
//! Monotonic counters only, reset on process start. Increments use
//! relaxed atomics; readers see eventually consistent values.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters of one engine instance
#[derive(Debug, Default)]
pub struct EngineMetrics {
    accessor_executions: AtomicU64,
    mutator_executions: AtomicU64,
    /// Invocations that ended in an error
    rejected_executions: AtomicU64,
    rows_emitted: AtomicU64,
    /// Candidate rows suppressed by access policy
    rows_denied: AtomicU64,
    rate_degradations: AtomicU64,
    result_degradations: AtomicU64,
    tokens_minted: AtomicU64,
    tokens_reused: AtomicU64,
    rows_mutated: AtomicU64,
    row_mutation_failures: AtomicU64,
}

/// Point-in-time copy of [`EngineMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub accessor_executions: u64,
    pub mutator_executions: u64,
    pub rejected_executions: u64,
    pub rows_emitted: u64,
    pub rows_denied: u64,
    pub rate_degradations: u64,
    pub result_degradations: u64,
    pub tokens_minted: u64,
    pub tokens_reused: u64,
    pub rows_mutated: u64,
    pub row_mutation_failures: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_accessor_execution(&self) {
        bump(&self.accessor_executions, 1);
    }

    pub fn record_mutator_execution(&self) {
        bump(&self.mutator_executions, 1);
    }

    pub fn record_rejection(&self) {
        bump(&self.rejected_executions, 1);
    }

    pub fn add_rows_emitted(&self, rows: u64) {
        bump(&self.rows_emitted, rows);
    }

    pub fn add_rows_denied(&self, rows: u64) {
        bump(&self.rows_denied, rows);
    }

    pub fn record_rate_degradation(&self) {
        bump(&self.rate_degradations, 1);
    }

    pub fn record_result_degradation(&self) {
        bump(&self.result_degradations, 1);
    }

    pub fn record_token_minted(&self) {
        bump(&self.tokens_minted, 1);
    }

    pub fn record_token_reused(&self) {
        bump(&self.tokens_reused, 1);
    }

    pub fn record_row_mutated(&self) {
        bump(&self.rows_mutated, 1);
    }

    pub fn record_row_mutation_failure(&self) {
        bump(&self.row_mutation_failures, 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            accessor_executions: load(&self.accessor_executions),
            mutator_executions: load(&self.mutator_executions),
            rejected_executions: load(&self.rejected_executions),
            rows_emitted: load(&self.rows_emitted),
            rows_denied: load(&self.rows_denied),
            rate_degradations: load(&self.rate_degradations),
            result_degradations: load(&self.result_degradations),
            tokens_minted: load(&self.tokens_minted),
            tokens_reused: load(&self.tokens_reused),
            rows_mutated: load(&self.rows_mutated),
            row_mutation_failures: load(&self.row_mutation_failures),
        }
    }

    /// Snapshot rendered as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_starts_at_zero() {
        assert_eq!(EngineMetrics::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_counters_and_json() {
        let metrics = EngineMetrics::new();
        metrics.record_accessor_execution();
        metrics.add_rows_emitted(10);
        metrics.add_rows_denied(2);
        metrics.record_rate_degradation();

        let parsed: serde_json::Value = serde_json::from_str(&metrics.to_json()).unwrap();
        assert_eq!(parsed["accessor_executions"], 1);
        assert_eq!(parsed["rows_emitted"], 10);
        assert_eq!(parsed["rows_denied"], 2);
        assert_eq!(parsed["rate_degradations"], 1);
        assert_eq!(parsed["tokens_minted"], 0);
    }

    #[test]
    fn test_concurrent_increments() {
        let metrics = Arc::new(EngineMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    for _ in 0..250 {
                        metrics.record_token_minted();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().tokens_minted, 2000);
    }
}
