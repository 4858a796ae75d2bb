//! Accessor execution
//!
//! Request validation, then the rate gate (first page of a walk only), the
//! result gate over every row the selector and policies allow, one windowed
//! scan with per-row policy, and finally consent filtering and
//! transformation of the emitted rows. Page bounds come from the candidate
//! window, so rows suppressed by policy never change how a caller pages.

use std::collections::HashSet;

use serde_json::{json, Map, Value as Json};
use uuid::Uuid;

use crate::consent::ConsentFilter;
use crate::model::{Accessor, Column, ColumnOutputConfig, DataLifeCycleState, DataType, UserRecord, Value};
use crate::observability::{log_event_with_fields, Event, ObservationScope};
use crate::pagination::{
    Cursor, CursorCodec, CursorPosition, PageBounds, Paginator, SortKey, SortKeyValidator, WindowSelection,
    Windower,
};
use crate::policy::{AccessPolicy, AccessPolicyContext, Action, CallerContext, ALLOW_ALL_POLICY_ID};
use crate::selector::SelectorBinder;
use crate::storage::{sort_tuple, ScanQuery};
use crate::transform::{TokenProvenance, TransformExecutor, TransformType, Transformed, Transformer};

use super::builder::Engine;
use super::errors::{EngineError, EngineResult};
use super::options::{AccessorResponse, CancellationToken, ExecutionOptions};

/// One output column of an accessor, resolved from the catalog
struct OutputColumn {
    column: Column,
    transformer: Transformer,
    token_access_policy_id: Option<Uuid>,
}

impl Engine {
    /// Executes accessor `accessor_id` for `caller`.
    ///
    /// `client_context` is visible to policies as `client`; `selector_values`
    /// bind the selector's `?` placeholders in order.
    pub fn execute_accessor(
        &self,
        accessor_id: Uuid,
        caller: &CallerContext,
        client_context: &Map<String, Json>,
        selector_values: &[Json],
        options: &ExecutionOptions,
    ) -> EngineResult<AccessorResponse> {
        self.metrics.record_accessor_execution();
        let scope = ObservationScope::new(Event::AccessorExecuteBegin, &[("accessor_id", accessor_id.to_string())]);

        match self.run_accessor(accessor_id, caller, client_context, selector_values, options) {
            Ok(response) => {
                scope.complete(&[
                    ("rows", &response.data.len().to_string()),
                    ("has_next", if response.has_next { "true" } else { "false" }),
                ]);
                Ok(response)
            }
            Err(e) => {
                self.metrics.record_rejection();
                scope.fail(&e.to_string());
                Err(e)
            }
        }
    }

    fn run_accessor(
        &self,
        accessor_id: Uuid,
        caller: &CallerContext,
        client_context: &Map<String, Json>,
        selector_values: &[Json],
        options: &ExecutionOptions,
    ) -> EngineResult<AccessorResponse> {
        let cancel = &options.cancellation;
        cancel.check()?;

        let accessor = self
            .catalog
            .accessor(accessor_id)
            .ok_or(EngineError::AccessorNotFound(accessor_id))?;
        let policy = self.require_policy(accessor.access_policy_id)?;

        let outputs = self.output_columns(&accessor)?;
        let columns: Vec<Column> = outputs.iter().map(|o| o.column.clone()).collect();
        let state = accessor.data_life_cycle_state;

        let paginator = if options.pagination.is_empty() {
            Paginator::unpaginated(&self.config)
        } else {
            options.pagination.resolve(&self.config)?
        };
        let keys = SortKeyValidator::new(&columns, state).validate(&paginator.sort_keys)?;
        let position = CursorCodec::decode(&paginator.cursor, &keys, self.config.max_cursor_length)?;
        let selector = SelectorBinder::new(&self.catalog.columns()).bind(&accessor.selector_config, selector_values)?;

        // a walk is one execution: later pages ride on the first page's slot
        if paginator.is_initial_query() && !self.admit_execution(&policy, accessor.id)? {
            return Ok(AccessorResponse::empty());
        }

        let effective = self.effective_accessor_policy(&accessor, &policy, &outputs);
        let context = AccessPolicyContext::new(caller, Action::Execute, client_context.clone())
            .with_purposes(self.purpose_names(&accessor.purposes))
            .with_query(selector_values.to_vec());

        if policy.thresholds.has_result_limit() {
            let id_key = SortKeyValidator::new(&columns, state).validate(&["id".to_string()])?;
            let unbounded = CursorPosition::Unbounded;
            let everything = ScanQuery {
                selector: &selector,
                sort_keys: &id_key,
                ascending: true,
                after: &unbounded,
                limit: usize::MAX,
                state,
                access_primary_db_only: options.access_primary_db_only,
            };
            let allowed = self.count_allowed(&policy, &everything, &effective, &context, &columns, cancel)?;
            if !self.admit_results(&policy, accessor.id, allowed)? {
                return Ok(AccessorResponse::empty());
            }
        }

        let windower = Windower::new(&paginator);
        cancel.check()?;
        let mut candidates = self.users.scan(&ScanQuery {
            selector: &selector,
            sort_keys: &keys,
            ascending: paginator.scans_ascending(),
            after: &position,
            limit: windower.fetch_size(),
            state,
            access_primary_db_only: options.access_primary_db_only,
        })?;
        cancel.check()?;

        let selection = windower.select(&mut candidates, |record: &UserRecord| {
            self.allows_row(&effective, &context, record, &columns)
        })?;
        let denied = selection.denied as u64;
        self.metrics.add_rows_denied(denied);

        let consent = ConsentFilter::new(&accessor.purposes, state, self.clock.now());
        let transforms = TransformExecutor::new(
            self.transformer_evaluator.as_ref(),
            self.tokens.as_ref(),
            self.clock.as_ref(),
        );
        let mut data = Vec::with_capacity(selection.emitted.len());
        for &index in &selection.emitted {
            let row = self.render_row(&candidates[index], &outputs, &consent, &transforms)?;
            data.push(row);
        }
        self.metrics.add_rows_emitted(data.len() as u64);

        let (bounds, truncated) = if paginator.paginated {
            (self.page_bounds(&paginator, &keys, &candidates, &selection, state)?, false)
        } else {
            (PageBounds::empty(), selection.has_more)
        };

        let mut response = AccessorResponse::new(data, bounds, truncated);
        if options.debug && self.config.debug_enabled {
            response.debug = Some(json!({
                "candidates": selection.candidates,
                "emitted": selection.emitted.len(),
                "denied": denied,
                "sort_keys": keys.iter().map(|k| k.name.as_str()).collect::<Vec<_>>(),
                "sort_order": paginator.sort_order.as_str(),
                "direction": paginator.direction.as_str(),
                "paginated": paginator.paginated,
                "region": options.region.as_ref().or(self.config.region.as_ref()),
            }));
        }
        Ok(response)
    }

    /// Rows matching `query` that `effective` lets through, counted up to
    /// one past the policy's result threshold
    fn count_allowed(
        &self,
        policy: &AccessPolicy,
        query: &ScanQuery<'_>,
        effective: &AccessPolicy,
        context: &AccessPolicyContext,
        columns: &[Column],
        cancel: &CancellationToken,
    ) -> EngineResult<usize> {
        let max = usize::try_from(policy.thresholds.max_results_per_execution).unwrap_or(usize::MAX);
        cancel.check()?;
        let total = self.users.count(query.selector, query.state)?;
        if total <= max {
            return Ok(total);
        }

        let matching = self.users.scan(&ScanQuery { limit: total, ..*query })?;
        cancel.check()?;
        let mut allowed = 0;
        for record in &matching {
            if self.allows_row(effective, context, record, columns)? {
                allowed += 1;
                if allowed > max {
                    break;
                }
            }
        }
        Ok(allowed)
    }

    fn output_columns(&self, accessor: &Accessor) -> EngineResult<Vec<OutputColumn>> {
        accessor
            .columns
            .iter()
            .map(|output: &ColumnOutputConfig| {
                let column = self.require_column(output.column_id)?;
                let transformer = self
                    .catalog
                    .transformer(output.transformer_id)
                    .ok_or(EngineError::TransformerNotFound(output.transformer_id))?;
                Ok(OutputColumn {
                    column,
                    transformer,
                    token_access_policy_id: accessor.token_access_policy_id.or(output.token_access_policy_id),
                })
            })
            .collect()
    }

    fn purpose_names(&self, purposes: &[Uuid]) -> Vec<String> {
        purposes
            .iter()
            .filter_map(|id| self.catalog.purpose(*id))
            .map(|p| p.name)
            .collect()
    }

    /// AND of the global accessor policy, the accessor's policy and, unless
    /// overridden, the non-trivial policies of its output columns
    fn effective_accessor_policy(&self, accessor: &Accessor, policy: &AccessPolicy, outputs: &[OutputColumn]) -> AccessPolicy {
        let mut ids: Vec<Uuid> = self.catalog.global_accessor_policy_id().into_iter().collect();
        ids.push(policy.id);
        if !accessor.are_column_access_policies_overridden {
            ids.extend(
                outputs
                    .iter()
                    .filter_map(|o| o.column.access_policy_id)
                    .filter(|id| *id != ALLOW_ALL_POLICY_ID),
            );
        }
        let mut seen = HashSet::new();
        ids.retain(|id| seen.insert(*id));
        AccessPolicy::all_of(format!("{}-effective", accessor.name), ids)
    }

    fn page_bounds(
        &self,
        paginator: &Paginator,
        keys: &[SortKey],
        candidates: &[UserRecord],
        selection: &WindowSelection,
        state: DataLifeCycleState,
    ) -> EngineResult<PageBounds> {
        let cursor_at = |index: Option<usize>| -> EngineResult<Option<Cursor>> {
            match index {
                Some(i) => Ok(Some(CursorCodec::encode(keys, &sort_tuple(keys, &candidates[i], state))?)),
                None => Ok(None),
            }
        };
        Ok(paginator.bounds(cursor_at(selection.first)?, cursor_at(selection.last)?, selection.has_more))
    }

    /// Renders one emitted row as a JSON object string.
    ///
    /// Columns with no consented value are left out.
    fn render_row(
        &self,
        record: &UserRecord,
        outputs: &[OutputColumn],
        consent: &ConsentFilter<'_>,
        transforms: &TransformExecutor<'_>,
    ) -> EngineResult<String> {
        let mut row = Map::new();
        for output in outputs {
            let value = match consent.value(record, &output.column) {
                Some(value) if !value.is_null() => value,
                _ => continue,
            };
            let provenance = TokenProvenance {
                user_id: record.id,
                column_id: output.column.id,
            };
            let rendered = match value {
                Value::Array(items) => Json::Array(
                    items
                        .iter()
                        .map(|item| self.transform_value(item, output, provenance, transforms))
                        .collect::<EngineResult<_>>()?,
                ),
                scalar => self.transform_value(&scalar, output, provenance, transforms)?,
            };
            row.insert(output.column.name.clone(), rendered);
        }

        Ok(Json::Object(row).to_string())
    }

    fn transform_value(
        &self,
        value: &Value,
        output: &OutputColumn,
        provenance: TokenProvenance,
        transforms: &TransformExecutor<'_>,
    ) -> EngineResult<Json> {
        let transformer = &output.transformer;
        if transformer.transform_type == TransformType::Passthrough {
            return Ok(value.to_json());
        }

        if let Some(policy_id) = output.token_access_policy_id.filter(|_| transformer.transform_type.is_tokenizing()) {
            self.require_policy(policy_id)?;
        }

        let transformed = transforms.execute(
            transformer,
            output.token_access_policy_id,
            &value.to_text(),
            Some(provenance),
        )?;
        match &transformed {
            Transformed::Minted(_) => {
                self.metrics.record_token_minted();
                log_event_with_fields(
                    Event::TokenMinted,
                    &[
                        ("column", &output.column.name),
                        ("transformer", &transformer.name),
                    ],
                );
            }
            Transformed::Reused(_) => self.metrics.record_token_reused(),
            Transformed::Value(_) => {}
        }

        let text = transformed.into_string();
        Ok(match transformer.output_type {
            DataType::Boolean | DataType::Integer | DataType::Composite => match serde_json::from_str(&text) {
                Ok(json) => json,
                Err(_) => Json::String(text),
            },
            _ => Json::String(text),
        })
    }
}
