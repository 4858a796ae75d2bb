//! Token resolution
//!
//! Tokens are resolved in batches. Each access policy appearing in a batch
//! is checked once: its rate gate, then the policy itself, then its result
//! gate against the number of distinct tokens it governs. Threshold
//! failures never surface as errors here; the affected tokens resolve to
//! nothing.

use std::collections::HashMap;

use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::model::DataLifeCycleState;
use crate::observability::{log_event_with_fields, Event};
use crate::policy::{AccessPolicy, AccessPolicyContext, Action, CallerContext};
use crate::transform::TokenRecord;

use super::builder::Engine;
use super::errors::{EngineError, EngineResult};

/// Object id recorded against token resolution in threshold logs
const TOKEN_RESOLUTION_OBJECT_ID: Uuid = Uuid::nil();

impl Engine {
    /// Resolves `token` to the value it stands for.
    ///
    /// Unknown tokens are an error; otherwise behaves like a batch of one
    /// (see [`Engine::resolve_tokens`]).
    pub fn resolve_token(
        &self,
        token: &str,
        caller: &CallerContext,
        client_context: &Map<String, Json>,
    ) -> EngineResult<Option<Json>> {
        if self.tokens.get(token)?.is_none() {
            return Err(EngineError::TokenNotFound);
        }
        let mut resolved = self.resolve_tokens(&[token], caller, client_context)?;
        Ok(resolved.pop().flatten())
    }

    /// Resolves `tokens`, one result per input in input order.
    ///
    /// A token resolves to `None` when it is unknown, when its policy denies
    /// action `resolve` or degrades on a threshold, or when a by-reference
    /// token's user or value is gone. By-reference tokens resolve to the
    /// column's current live value.
    pub fn resolve_tokens(
        &self,
        tokens: &[&str],
        caller: &CallerContext,
        client_context: &Map<String, Json>,
    ) -> EngineResult<Vec<Option<Json>>> {
        let mut records: HashMap<&str, TokenRecord> = HashMap::new();
        let mut policies: Vec<(Uuid, usize)> = Vec::new();
        for &token in tokens {
            if records.contains_key(token) {
                continue;
            }
            let record = match self.tokens.get(token)? {
                Some(record) => record,
                None => continue,
            };
            match policies.iter_mut().find(|(id, _)| *id == record.access_policy_id) {
                Some((_, count)) => *count += 1,
                None => policies.push((record.access_policy_id, 1)),
            }
            records.insert(token, record);
        }

        let context = AccessPolicyContext::new(caller, Action::Resolve, client_context.clone());
        let mut granted: HashMap<Uuid, bool> = HashMap::with_capacity(policies.len());
        for (policy_id, count) in policies {
            let allowed = self.admit_resolution(policy_id, count, &context)?;
            granted.insert(policy_id, allowed);
        }

        tokens
            .iter()
            .map(|token| match records.get(token) {
                Some(record) if granted.get(&record.access_policy_id).copied().unwrap_or(false) => {
                    self.token_value(record)
                }
                _ => Ok(None),
            })
            .collect()
    }

    fn admit_resolution(&self, policy_id: Uuid, tokens: usize, context: &AccessPolicyContext) -> EngineResult<bool> {
        let policy = self.require_policy(policy_id)?;
        let policy = AccessPolicy {
            thresholds: policy.thresholds.silenced(),
            ..policy
        };

        let allowed = self.admit_execution(&policy, TOKEN_RESOLUTION_OBJECT_ID)?
            && self.policy_engine().evaluate(&policy, context)?
            && self.admit_results(&policy, TOKEN_RESOLUTION_OBJECT_ID, tokens)?;
        log_event_with_fields(
            Event::TokenResolved,
            &[
                ("policy_id", &policy.id.to_string()),
                ("tokens", &tokens.to_string()),
                ("allowed", if allowed { "true" } else { "false" }),
            ],
        );
        Ok(allowed)
    }

    fn token_value(&self, record: &TokenRecord) -> EngineResult<Option<Json>> {
        if let Some(data) = &record.data {
            return Ok(Some(Json::String(data.clone())));
        }
        let provenance = match record.provenance {
            Some(provenance) => provenance,
            None => return Ok(None),
        };

        let column = self.require_column(provenance.column_id)?;
        let value = self
            .users
            .get_user(provenance.user_id)?
            .map(|user| user.column_value(&column, DataLifeCycleState::Live))
            .filter(|value| !value.is_null());
        Ok(value.map(|v| v.to_json()))
    }
}
