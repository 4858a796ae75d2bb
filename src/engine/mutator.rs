//! Mutator execution
//!
//! Request validation happens before any row is touched. Each approved user
//! is then written independently: a failing row keeps its previous state,
//! rows written before it stay written, and the first failure is returned.

use std::collections::BTreeSet;

use serde_json::{Map, Value as Json};
use uuid::Uuid;

use crate::model::{Column, Mutator, UserRecord};
use crate::mutation::{parse_row_data, MutationError, PreparedMutation};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::policy::{AccessPolicy, AccessPolicyContext, Action, CallerContext};
use crate::selector::SelectorBinder;
use crate::storage::UserWrite;
use crate::transform::{TransformExecutor, Transformed, Transformer};

use super::builder::Engine;
use super::errors::{EngineError, EngineResult};
use super::options::{ExecutionOptions, MutatorResponse};

impl Engine {
    /// Executes mutator `mutator_id` for `caller`.
    ///
    /// `row_data` maps every mutator column name to its change request.
    pub fn execute_mutator(
        &self,
        mutator_id: Uuid,
        caller: &CallerContext,
        client_context: &Map<String, Json>,
        selector_values: &[Json],
        row_data: &Map<String, Json>,
        options: &ExecutionOptions,
    ) -> EngineResult<MutatorResponse> {
        self.metrics.record_mutator_execution();
        let scope = ObservationScope::new(Event::MutatorExecuteBegin, &[("mutator_id", mutator_id.to_string())]);

        match self.run_mutator(mutator_id, caller, client_context, selector_values, row_data, options) {
            Ok(response) => {
                scope.complete(&[("users", &response.user_ids.len().to_string())]);
                Ok(response)
            }
            Err(e) => {
                self.metrics.record_rejection();
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    fn run_mutator(
        &self,
        mutator_id: Uuid,
        caller: &CallerContext,
        client_context: &Map<String, Json>,
        selector_values: &[Json],
        row_data: &Map<String, Json>,
        options: &ExecutionOptions,
    ) -> EngineResult<MutatorResponse> {
        let cancel = &options.cancellation;
        cancel.check()?;

        let mutator = self
            .catalog
            .mutator(mutator_id)
            .ok_or(EngineError::MutatorNotFound(mutator_id))?;
        let policy = self.require_policy(mutator.access_policy_id)?;

        let (columns, normalizers) = self.input_columns(&mutator)?;
        let mutations = self.prepare_mutations(&columns, &normalizers, row_data)?;
        let selector = SelectorBinder::new(&self.catalog.columns()).bind(&mutator.selector_config, selector_values)?;

        if !self.admit_execution(&policy, mutator.id)? {
            return Ok(MutatorResponse::default());
        }

        let effective = self.effective_mutator_policy(&mutator, &policy);
        let context = AccessPolicyContext::new(caller, Action::Execute, client_context.clone())
            .with_query(selector_values.to_vec())
            .with_row_data(row_data.clone());

        cancel.check()?;
        let candidate_ids = self.users.matching_ids(&selector)?;
        let mut approved = Vec::new();
        for id in candidate_ids {
            cancel.check()?;
            let record = match self.users.get_user(id)? {
                Some(record) => record,
                None => continue,
            };
            if self.allows_row(&effective, &context, &record, &columns)? {
                approved.push(record);
            } else {
                self.metrics.add_rows_denied(1);
            }
        }

        if !self.admit_results(&policy, mutator.id, approved.len())? {
            return Ok(MutatorResponse::default());
        }

        let unique_columns: Vec<&Column> = columns.iter().filter(|c| c.constraints.unique_required).collect();
        let mut user_ids = Vec::with_capacity(approved.len());
        for record in approved {
            cancel.check()?;
            let user_id = record.id;
            if let Err(e) = self.write_row(record, &mutations, &unique_columns) {
                self.metrics.record_row_mutation_failure();
                log_event_with_fields(
                    Event::RowMutationFailed,
                    &[
                        ("mutator_id", &mutator.id.to_string()),
                        ("user_id", &user_id.to_string()),
                        ("reason", &e.to_string()),
                    ],
                );
                return Err(e);
            }
            user_ids.push(user_id);
        }

        Ok(MutatorResponse { user_ids })
    }

    fn input_columns(&self, mutator: &Mutator) -> EngineResult<(Vec<Column>, Vec<Transformer>)> {
        let mut columns = Vec::with_capacity(mutator.columns.len());
        let mut normalizers = Vec::with_capacity(mutator.columns.len());
        for input in &mutator.columns {
            columns.push(self.require_column(input.column_id)?);
            normalizers.push(
                self.catalog
                    .transformer(input.normalizer_id)
                    .ok_or(EngineError::TransformerNotFound(input.normalizer_id))?,
            );
        }
        Ok((columns, normalizers))
    }

    /// Validates row data, checks purposes and normalizes every value
    fn prepare_mutations(
        &self,
        columns: &[Column],
        normalizers: &[Transformer],
        row_data: &Map<String, Json>,
    ) -> EngineResult<Vec<PreparedMutation>> {
        let transforms = TransformExecutor::new(
            self.transformer_evaluator.as_ref(),
            self.tokens.as_ref(),
            self.clock.as_ref(),
        );

        let requested = parse_row_data(columns, row_data)?;
        let mut prepared = Vec::with_capacity(requested.len());
        for (mutation, normalizer) in requested.iter().zip(normalizers) {
            let purposes: BTreeSet<Uuid> = mutation
                .purpose_additions
                .iter()
                .chain(&mutation.purpose_deletions)
                .copied()
                .collect();
            if let Some(missing) = purposes.into_iter().find(|p| self.catalog.purpose(*p).is_none()) {
                return Err(EngineError::PurposeNotFound(missing));
            }

            prepared.push(mutation.prepare(|text| {
                transforms
                    .execute(normalizer, None, text, None)
                    .map(Transformed::into_string)
                    .map_err(MutationError::from)
            })?);
        }
        Ok(prepared)
    }

    fn effective_mutator_policy(&self, mutator: &Mutator, policy: &AccessPolicy) -> AccessPolicy {
        let ids = self
            .catalog
            .global_mutator_policy_id()
            .into_iter()
            .chain(std::iter::once(policy.id));
        AccessPolicy::all_of(format!("{}-effective", mutator.name), ids)
    }

    /// Applies every mutation to one user and writes the row atomically
    fn write_row(
        &self,
        mut record: UserRecord,
        mutations: &[PreparedMutation],
        unique_columns: &[&Column],
    ) -> EngineResult<()> {
        let now = self.clock.now();
        let expected_updated = record.updated;

        let mut changed = false;
        for mutation in mutations {
            changed |= mutation.apply(&mut record, self.retention.as_ref(), now)?;
        }
        if !changed {
            return Ok(());
        }

        record.updated = now.max(expected_updated);
        self.users.write_user(UserWrite {
            record,
            expected_updated,
            unique_columns: unique_columns.to_vec(),
        })?;
        self.metrics.record_row_mutated();
        Ok(())
    }
}
