//! Engine lifecycle events

use std::fmt;

use super::logger::Severity;

/// Observable events of the execution engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Accessor execution
    AccessorExecuteBegin,
    AccessorExecuteComplete,
    /// Invocation failed with an error
    AccessorExecuteRejected,

    // Mutator execution
    MutatorExecuteBegin,
    MutatorExecuteComplete,
    MutatorExecuteRejected,
    /// One target row failed to write
    RowMutationFailed,

    // Thresholds
    RateThresholdExceeded,
    ResultThresholdExceeded,

    // Tokens
    TokenMinted,
    TokenResolved,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::AccessorExecuteBegin => "ACCESSOR_EXECUTE_BEGIN",
            Event::AccessorExecuteComplete => "ACCESSOR_EXECUTE_COMPLETE",
            Event::AccessorExecuteRejected => "ACCESSOR_EXECUTE_REJECTED",
            Event::MutatorExecuteBegin => "MUTATOR_EXECUTE_BEGIN",
            Event::MutatorExecuteComplete => "MUTATOR_EXECUTE_COMPLETE",
            Event::MutatorExecuteRejected => "MUTATOR_EXECUTE_REJECTED",
            Event::RowMutationFailed => "ROW_MUTATION_FAILED",
            Event::RateThresholdExceeded => "RATE_THRESHOLD_EXCEEDED",
            Event::ResultThresholdExceeded => "RESULT_THRESHOLD_EXCEEDED",
            Event::TokenMinted => "TOKEN_MINTED",
            Event::TokenResolved => "TOKEN_RESOLVED",
        }
    }

    /// Completion and failure events paired with a `*_BEGIN` event
    pub fn outcomes(&self) -> Option<(Event, Event)> {
        match self {
            Event::AccessorExecuteBegin => Some((Event::AccessorExecuteComplete, Event::AccessorExecuteRejected)),
            Event::MutatorExecuteBegin => Some((Event::MutatorExecuteComplete, Event::MutatorExecuteRejected)),
            _ => None,
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::AccessorExecuteRejected | Event::MutatorExecuteRejected | Event::RowMutationFailed => {
                Severity::Error
            }
            Event::RateThresholdExceeded | Event::ResultThresholdExceeded => Severity::Warn,
            Event::TokenMinted | Event::TokenResolved => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
