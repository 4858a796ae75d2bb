//! Execution thresholds and gate outcomes

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

use super::errors::{PolicyError, PolicyResult};

/// Which threshold a call exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdExceeded {
    /// Execution-rate gate
    Rate,
    /// Result-volume gate
    Result,
}

impl ThresholdExceeded {
    pub fn message(&self) -> &'static str {
        match self {
            ThresholdExceeded::Rate => "access policy rate threshold exceeded",
            ThresholdExceeded::Result => "access policy result threshold exceeded",
        }
    }
}

/// Outcome of one threshold gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    Admitted,
    /// Call succeeds with no rows and no indication of why
    DeniedSilently,
    /// Call fails with a client error
    DeniedAnnounced(ThresholdExceeded),
}

impl GateOutcome {
    pub fn is_admitted(&self) -> bool {
        matches!(self, GateOutcome::Admitted)
    }

    fn denied(announce: bool, reason: ThresholdExceeded) -> Self {
        if announce {
            GateOutcome::DeniedAnnounced(reason)
        } else {
            GateOutcome::DeniedSilently
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GateOutcome::Admitted => "admitted",
            GateOutcome::DeniedSilently => "denied_silently",
            GateOutcome::DeniedAnnounced(_) => "denied_announced",
        }
    }
}

/// Per-policy limits on execution rate and result volume.
///
/// A zero `max_executions` or `max_results_per_execution` disables the
/// corresponding gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicyThresholds {
    #[serde(default)]
    pub announce_max_execution_failure: bool,
    #[serde(default)]
    pub announce_max_result_failure: bool,
    #[serde(default)]
    pub max_executions: u64,
    #[serde(default)]
    pub max_execution_duration_seconds: u64,
    #[serde(default)]
    pub max_results_per_execution: u64,
}

impl AccessPolicyThresholds {
    pub fn has_rate_limit(&self) -> bool {
        self.max_executions > 0 && self.max_execution_duration_seconds > 0
    }

    pub fn has_result_limit(&self) -> bool {
        self.max_results_per_execution > 0
    }

    pub fn validate(&self, config: &EngineConfig) -> PolicyResult<()> {
        if self.max_executions == 0 {
            return Ok(());
        }

        let duration = self.max_execution_duration_seconds;
        if duration < config.min_execution_duration_seconds
            || duration > config.max_execution_duration_seconds
        {
            return Err(PolicyError::InvalidThresholds(format!(
                "max_execution_duration_seconds {} must be within [{}, {}]",
                duration, config.min_execution_duration_seconds, config.max_execution_duration_seconds
            )));
        }
        if duration % config.rate_limit_bucket_seconds != 0 {
            return Err(PolicyError::InvalidThresholds(format!(
                "max_execution_duration_seconds {} must be a multiple of {}",
                duration, config.rate_limit_bucket_seconds
            )));
        }
        Ok(())
    }

    /// Same limits with both failures degrading silently
    pub fn silenced(&self) -> Self {
        Self {
            announce_max_execution_failure: false,
            announce_max_result_failure: false,
            ..*self
        }
    }

    /// Outcome when the rate window is already full
    pub fn rate_exceeded(&self) -> GateOutcome {
        GateOutcome::denied(self.announce_max_execution_failure, ThresholdExceeded::Rate)
    }

    /// Result-volume gate for an execution involving `rows` rows in total
    pub fn result_gate(&self, rows: usize) -> GateOutcome {
        if !self.has_result_limit() || (rows as u64) <= self.max_results_per_execution {
            return GateOutcome::Admitted;
        }
        GateOutcome::denied(self.announce_max_result_failure, ThresholdExceeded::Result)
    }
}
