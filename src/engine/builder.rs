//! Engine construction and shared helpers

use std::sync::Arc;

use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::consent::{InMemoryRetentionStore, RetentionStore};
use crate::model::{Column, DataLifeCycleState, UserRecord};
use crate::observability::{log_event_with_fields, EngineMetrics, Event};
use crate::policy::{
    AccessPolicy, AccessPolicyContext, BuiltinPolicyEvaluator, GateOutcome, InMemoryRateLimitStore,
    PolicyEngine, PolicyEvaluator, RateLimitStore, RateLimiter,
};
use crate::storage::UserStore;
use crate::transform::{BuiltinTransformerEvaluator, InMemoryTokenStore, TokenStore, TransformerEvaluator};

use super::errors::{EngineError, EngineResult};

/// Accessor and mutator execution engine
///
/// Invocations are independent; the rate-limit store, the user store and
/// the token store are the only state shared between them.
pub struct Engine {
    pub(super) config: EngineConfig,
    pub(super) catalog: Arc<dyn Catalog>,
    pub(super) users: Arc<dyn UserStore>,
    pub(super) tokens: Arc<dyn TokenStore>,
    pub(super) retention: Arc<dyn RetentionStore>,
    pub(super) policy_evaluator: Arc<dyn PolicyEvaluator>,
    pub(super) transformer_evaluator: Arc<dyn TransformerEvaluator>,
    pub(super) clock: Arc<dyn Clock>,
    pub(super) rate_limiter: RateLimiter,
    pub(super) metrics: Arc<EngineMetrics>,
}

/// Builds an [`Engine`] with in-memory defaults for every optional
/// collaborator
pub struct EngineBuilder {
    config: EngineConfig,
    catalog: Arc<dyn Catalog>,
    users: Arc<dyn UserStore>,
    tokens: Arc<dyn TokenStore>,
    retention: Arc<dyn RetentionStore>,
    rate_limits: Arc<dyn RateLimitStore>,
    policy_evaluator: Arc<dyn PolicyEvaluator>,
    transformer_evaluator: Arc<dyn TransformerEvaluator>,
    clock: Arc<dyn Clock>,
    metrics: Arc<EngineMetrics>,
}

impl EngineBuilder {
    pub fn new(catalog: Arc<dyn Catalog>, users: Arc<dyn UserStore>) -> Self {
        Self {
            config: EngineConfig::default(),
            catalog,
            users,
            tokens: Arc::new(InMemoryTokenStore::new()),
            retention: Arc::new(InMemoryRetentionStore::new()),
            rate_limits: Arc::new(InMemoryRateLimitStore::new()),
            policy_evaluator: Arc::new(BuiltinPolicyEvaluator),
            transformer_evaluator: Arc::new(BuiltinTransformerEvaluator),
            clock: Arc::new(SystemClock),
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn retention_store(mut self, retention: Arc<dyn RetentionStore>) -> Self {
        self.retention = retention;
        self
    }

    pub fn rate_limit_store(mut self, store: Arc<dyn RateLimitStore>) -> Self {
        self.rate_limits = store;
        self
    }

    pub fn policy_evaluator(mut self, evaluator: Arc<dyn PolicyEvaluator>) -> Self {
        self.policy_evaluator = evaluator;
        self
    }

    pub fn transformer_evaluator(mut self, evaluator: Arc<dyn TransformerEvaluator>) -> Self {
        self.transformer_evaluator = evaluator;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> Engine {
        let rate_limiter = RateLimiter::new(
            self.rate_limits,
            Arc::clone(&self.clock),
            self.config.rate_limit_bucket_seconds,
        );
        Engine {
            config: self.config,
            catalog: self.catalog,
            users: self.users,
            tokens: self.tokens,
            retention: self.retention,
            policy_evaluator: self.policy_evaluator,
            transformer_evaluator: self.transformer_evaluator,
            clock: self.clock,
            rate_limiter,
            metrics: self.metrics,
        }
    }
}

impl Engine {
    pub fn builder(catalog: Arc<dyn Catalog>, users: Arc<dyn UserStore>) -> EngineBuilder {
        EngineBuilder::new(catalog, users)
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(super) fn policy_engine(&self) -> PolicyEngine<'_> {
        PolicyEngine::new(self.catalog.policies(), self.policy_evaluator.as_ref())
    }

    pub(super) fn require_policy(&self, id: Uuid) -> EngineResult<AccessPolicy> {
        self.catalog
            .policies()
            .access_policy(id)
            .ok_or(EngineError::PolicyNotFound(id))
    }

    pub(super) fn require_column(&self, id: Uuid) -> EngineResult<Column> {
        self.catalog.column(id).ok_or(EngineError::ColumnNotFound(id))
    }

    /// Runs the execution-rate gate of `policy` for one execution of
    /// `object_id`.
    ///
    /// Returns false for a silent denial; announced denials are errors.
    pub(super) fn admit_execution(&self, policy: &AccessPolicy, object_id: Uuid) -> EngineResult<bool> {
        match self.rate_limiter.check(policy)? {
            GateOutcome::Admitted => Ok(true),
            outcome => {
                self.metrics.record_rate_degradation();
                log_event_with_fields(
                    Event::RateThresholdExceeded,
                    &[
                        ("object_id", &object_id.to_string()),
                        ("policy_id", &policy.id.to_string()),
                        ("outcome", outcome.as_str()),
                    ],
                );
                Self::gate_result(outcome)
            }
        }
    }

    /// Runs the result-volume gate for an execution involving `rows` rows
    pub(super) fn admit_results(&self, policy: &AccessPolicy, object_id: Uuid, rows: usize) -> EngineResult<bool> {
        match policy.thresholds.result_gate(rows) {
            GateOutcome::Admitted => Ok(true),
            outcome => {
                self.metrics.record_result_degradation();
                log_event_with_fields(
                    Event::ResultThresholdExceeded,
                    &[
                        ("object_id", &object_id.to_string()),
                        ("policy_id", &policy.id.to_string()),
                        ("rows", &rows.to_string()),
                        ("outcome", outcome.as_str()),
                    ],
                );
                Self::gate_result(outcome)
            }
        }
    }

    fn gate_result(outcome: GateOutcome) -> EngineResult<bool> {
        match outcome {
            GateOutcome::Admitted => Ok(true),
            GateOutcome::DeniedSilently => Ok(false),
            GateOutcome::DeniedAnnounced(reason) => Err(EngineError::ThresholdExceeded(reason)),
        }
    }

    /// Row profile handed to policies as `user`: the id plus the live values
    /// of `columns`
    pub(super) fn user_profile(record: &UserRecord, columns: &[Column]) -> Map<String, Json> {
        let mut profile = Map::new();
        profile.insert("id".to_string(), Json::String(record.id.to_string()));
        for column in columns {
            let value = record.column_value(column, DataLifeCycleState::Live);
            if !value.is_null() {
                profile.insert(column.name.clone(), value.to_json());
            }
        }
        profile
    }

    /// Evaluates `policy` for one row
    pub(super) fn allows_row(
        &self,
        policy: &AccessPolicy,
        context: &AccessPolicyContext,
        record: &UserRecord,
        columns: &[Column],
    ) -> EngineResult<bool> {
        let context = context.for_user(Self::user_profile(record, columns));
        Ok(self.policy_engine().evaluate(policy, &context)?)
    }
}
