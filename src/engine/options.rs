//! Invocation options, cancellation and responses

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value as Json;
use uuid::Uuid;

use crate::pagination::{Cursor, PageBounds, PaginationOptions};

use super::errors::{EngineError, EngineResult};

/// Shared flag a caller flips to abandon an invocation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fails with [`EngineError::Cancelled`] once cancelled
    pub fn check(&self) -> EngineResult<()> {
        if self.is_cancelled() {
            Err(EngineError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Per-invocation options
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// No pagination options means an un-paginated call
    pub pagination: PaginationOptions,
    /// Falls back to the configured region
    pub region: Option<String>,
    pub access_primary_db_only: bool,
    /// Attach a debug object (only when enabled in config)
    pub debug: bool,
    pub cancellation: CancellationToken,
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paginate(mut self, pagination: PaginationOptions) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn access_primary_db_only(mut self) -> Self {
        self.access_primary_db_only = true;
        self
    }

    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

/// Result of one accessor execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessorResponse {
    /// One JSON object per emitted row
    pub data: Vec<String>,
    pub next: Cursor,
    pub prev: Cursor,
    pub has_next: bool,
    pub has_prev: bool,
    /// Un-paginated call stopped before the end of the candidate set
    pub truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<Json>,
}

impl AccessorResponse {
    pub(crate) fn new(data: Vec<String>, bounds: PageBounds, truncated: bool) -> Self {
        Self {
            data,
            next: bounds.next,
            prev: bounds.prev,
            has_next: bounds.has_next,
            has_prev: bounds.has_prev,
            truncated,
            debug: None,
        }
    }

    /// Response of a silently degraded call
    pub(crate) fn empty() -> Self {
        Self::new(Vec::new(), PageBounds::empty(), false)
    }
}

/// Result of one mutator execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MutatorResponse {
    /// Users the mutation applied to, ascending
    pub user_ids: Vec<Uuid>,
}
