//! Accessor Pagination Tests
//!
//! Paging over the 35-user fixture:
//! - Forward and backward walks with boundary flags
//! - Stepping back from any page reproduces the previous page
//! - Rows suppressed by policy never change how pages advance
//! - Request validation and un-paginated truncation

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use common::{indices, no_context, rows, user_id, Fixture, USER_COUNT};
use userstore_engine::config::EngineConfig;
use userstore_engine::model::{Column, DataType, SelectorConfig, UserRecord, Value};
use userstore_engine::pagination::{Cursor, PaginationOptions, SortOrder};
use userstore_engine::policy::{
    AccessPolicy, AccessPolicyContext, AccessPolicyTemplate, BuiltinPolicyEvaluator, CallerContext, PolicyEvaluator,
    PolicyResult, PolicyType, ALLOW_ALL_TEMPLATE_ID, DENY_ALL_POLICY_ID,
};
use userstore_engine::storage::UserStore;
use userstore_engine::{AccessorResponse, Engine, EngineError, ExecutionOptions};

// =============================================================================
// Helper Functions
// =============================================================================

fn page(engine: &Engine, accessor_id: Uuid, pagination: PaginationOptions) -> AccessorResponse {
    engine
        .execute_accessor(
            accessor_id,
            &CallerContext::anonymous(),
            &no_context(),
            &[],
            &ExecutionOptions::new().paginate(pagination),
        )
        .unwrap()
}

fn page_err(engine: &Engine, accessor_id: Uuid, pagination: PaginationOptions) -> EngineError {
    engine
        .execute_accessor(
            accessor_id,
            &CallerContext::anonymous(),
            &no_context(),
            &[],
            &ExecutionOptions::new().paginate(pagination),
        )
        .unwrap_err()
}

fn range(from: u128, to: u128) -> Vec<u128> {
    (from..=to).collect()
}

/// Policy allowing only rows whose `boolean` column is true
fn even_users_policy(fixture: &Fixture) -> Uuid {
    let template = fixture
        .catalog
        .add_policy_template(AccessPolicyTemplate::new("CheckAttribute", "check_attribute"))
        .unwrap();
    fixture
        .catalog
        .put_access_policy(AccessPolicy::new("even_users", PolicyType::CompositeAnd).with_template(
            template,
            json!({"source": "user", "attribute": "boolean", "value": true}),
        ))
        .unwrap()
}

/// Built-in evaluator that counts template evaluations
#[derive(Default)]
struct CountingEvaluator {
    calls: AtomicUsize,
}

impl PolicyEvaluator for CountingEvaluator {
    fn evaluate(
        &self,
        template: &AccessPolicyTemplate,
        context: &AccessPolicyContext,
        parameters: &serde_json::Value,
    ) -> PolicyResult<bool> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        BuiltinPolicyEvaluator.evaluate(template, context, parameters)
    }
}

// =============================================================================
// Forward and Backward Walks
// =============================================================================

/// Forward paging yields 10/10/10/5 rows with correct boundary flags.
#[test]
fn test_forward_walk() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();

    let expected = [
        (range(1, 10), false, true),
        (range(11, 20), true, true),
        (range(21, 30), true, true),
        (range(31, 35), true, false),
    ];

    let mut cursor = Cursor::begin();
    for (rows, has_prev, has_next) in expected {
        let resp = page(&engine, accessor, PaginationOptions::new().limit(10).starting_after(cursor));
        assert_eq!(indices(&resp), rows);
        assert_eq!(resp.has_prev, has_prev);
        assert_eq!(resp.has_next, has_next);
        cursor = resp.next;
    }
    assert!(cursor.is_end());
}

/// Backward paging from the end yields 10/10/10/5 rows ending at the first user.
#[test]
fn test_backward_walk_from_end() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();

    let expected = [
        (range(26, 35), true, false),
        (range(16, 25), true, true),
        (range(6, 15), true, true),
        (range(1, 5), false, true),
    ];

    let mut cursor = Cursor::end();
    for (rows, has_prev, has_next) in expected {
        let resp = page(&engine, accessor, PaginationOptions::new().limit(10).ending_before(cursor));
        assert_eq!(indices(&resp), rows);
        assert_eq!(resp.has_prev, has_prev);
        assert_eq!(resp.has_next, has_next);
        cursor = resp.prev;
    }
    assert!(cursor.is_begin());
}

/// Four-key sort pages forward 10/10/10/5 and backward over the same rows.
#[test]
fn test_multi_key_walk_both_directions() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();
    let options = || PaginationOptions::new().limit(10).sort_key("string,boolean,integer,id");

    let mut order = Vec::new();
    let mut flags = Vec::new();
    let mut cursor = Cursor::begin();
    loop {
        let resp = page(&engine, accessor, options().starting_after(cursor));
        order.extend(indices(&resp));
        flags.push((resp.data.len(), resp.has_prev, resp.has_next));
        if !resp.has_next {
            break;
        }
        cursor = resp.next;
    }
    assert_eq!(
        flags,
        vec![(10, false, true), (10, true, true), (10, true, true), (5, true, false)]
    );
    assert_eq!(&order[..10], &[15, 5, 25, 35, 30, 10, 20, 1, 11, 21]);

    let mut cursor = Cursor::end();
    for (from, to) in [(25, 35), (15, 25), (5, 15), (0, 5)] {
        let resp = page(&engine, accessor, options().ending_before(cursor));
        assert_eq!(indices(&resp), order[from..to].to_vec());
        assert_eq!(resp.has_prev, from > 0);
        cursor = resp.prev;
    }
}

/// Stepping back from the second page reproduces the first.
#[test]
fn test_prev_of_next_page_reproduces_page() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();

    let p1 = page(&engine, accessor, PaginationOptions::new().limit(10));
    let p2 = page(&engine, accessor, PaginationOptions::new().limit(10).starting_after(p1.next.clone()));
    let p3 = page(&engine, accessor, PaginationOptions::new().limit(10).starting_after(p2.next.clone()));

    let back_to_p2 = page(&engine, accessor, PaginationOptions::new().limit(10).ending_before(p3.prev));
    assert_eq!(back_to_p2.data, p2.data);
    assert!(back_to_p2.has_prev);
    assert!(back_to_p2.has_next);

    let back_to_p1 = page(&engine, accessor, PaginationOptions::new().limit(10).ending_before(p2.prev));
    assert_eq!(back_to_p1.data, p1.data);
    assert!(!back_to_p1.has_prev);
    assert!(back_to_p1.prev.is_begin());
}

/// Cursors name every sort key of the boundary row.
#[test]
fn test_cursor_encodes_sort_tuple() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();

    let resp = page(&engine, accessor, PaginationOptions::new().limit(3));
    assert_eq!(resp.next.as_str(), format!("id:{}", user_id(3)));
    assert!(resp.prev.is_begin());

    let resp = page(
        &engine,
        accessor,
        PaginationOptions::new().limit(3).sort_key("integer,id"),
    );
    assert_eq!(resp.next.as_str(), format!("integer:1,id:{}", user_id(1)));
}

// =============================================================================
// Sort Keys and Order
// =============================================================================

/// Descending order walks ids from the top.
#[test]
fn test_descending_walk() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();

    let options = || PaginationOptions::new().limit(10).sort_order(SortOrder::Descending);
    let p1 = page(&engine, accessor, options());
    assert_eq!(indices(&p1), (26..=35).rev().collect::<Vec<_>>());
    assert!(!p1.has_prev);
    assert!(p1.has_next);

    let p2 = page(&engine, accessor, options().starting_after(p1.next.clone()));
    assert_eq!(indices(&p2), (16..=25).rev().collect::<Vec<_>>());

    let back = page(&engine, accessor, options().ending_before(p2.prev));
    assert_eq!(back.data, p1.data);
}

/// Multi-key sort orders by the leading column, then by id.
#[test]
fn test_sort_by_string_then_id() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();

    let options = || PaginationOptions::new().limit(10).sort_key("string,id");
    let p1 = page(&engine, accessor, options());
    assert_eq!(indices(&p1), vec![5, 10, 15, 20, 25, 30, 35, 1, 6, 11]);

    let p2 = page(&engine, accessor, options().starting_after(p1.next));
    assert_eq!(indices(&p2), vec![16, 21, 26, 31, 2, 7, 12, 17, 22, 27]);
}

/// Users without a value sort before every value.
#[test]
fn test_nulls_sort_first() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();

    let options = || PaginationOptions::new().limit(10).sort_key("integer,id");
    let p1 = page(&engine, accessor, options());
    assert_eq!(indices(&p1), vec![15, 30, 1, 2, 3, 4, 5, 6, 7, 8]);
    assert!(!rows(&p1)[0].contains_key("integer"));

    let p2 = page(&engine, accessor, options().starting_after(p1.next));
    assert_eq!(indices(&p2), vec![9, 10, 11, 12, 13, 14, 16, 17, 18, 19]);
}

// =============================================================================
// Policy Suppression
// =============================================================================

/// A deny-all accessor pages through every user with empty pages.
#[test]
fn test_deny_all_pages_advance() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.add_accessor(fixture.accessor(DENY_ALL_POLICY_ID));

    let mut cursor = Cursor::begin();
    let mut pages = 0;
    loop {
        let resp = page(&engine, accessor, PaginationOptions::new().limit(1).starting_after(cursor));
        pages += 1;
        assert!(resp.data.is_empty());
        if !resp.has_next {
            assert!(resp.next.is_end());
            break;
        }
        assert_eq!(resp.next.as_str(), format!("id:{}", user_id(pages)));
        cursor = resp.next;
    }
    assert_eq!(pages, USER_COUNT);
    assert_eq!(engine.metrics().snapshot().rows_denied, USER_COUNT as u64);
}

/// Rows denied by a per-row policy are skipped without moving page bounds.
#[test]
fn test_per_row_policy_keeps_bounds() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let policy = even_users_policy(&fixture);
    let accessor = fixture.add_accessor(fixture.accessor(policy));

    let p1 = page(&engine, accessor, PaginationOptions::new().limit(10));
    assert_eq!(indices(&p1), vec![2, 4, 6, 8, 10]);
    assert_eq!(p1.next.as_str(), format!("id:{}", user_id(10)));

    let p2 = page(&engine, accessor, PaginationOptions::new().limit(10).starting_after(p1.next));
    assert_eq!(indices(&p2), vec![12, 14, 16, 18, 20]);
}

/// A larger multiplier scans more candidates to fill the page.
#[test]
fn test_limit_multiplier_fills_page() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let policy = even_users_policy(&fixture);
    let accessor = fixture.add_accessor(fixture.accessor(policy));

    let resp = page(&engine, accessor, PaginationOptions::new().limit(10).limit_multiplier(2));
    assert_eq!(indices(&resp), (1..=10).map(|i| i * 2).collect::<Vec<_>>());
    assert!(resp.has_next);
    assert_eq!(resp.next.as_str(), format!("id:{}", user_id(20)));
}

/// Stepping back over a multiplied window reproduces the earlier page and
/// its bounds.
#[test]
fn test_multiplier_step_back_reproduces_page() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let policy = even_users_policy(&fixture);
    let accessor = fixture.add_accessor(fixture.accessor(policy));
    let options = || PaginationOptions::new().limit(2).limit_multiplier(3);

    let p1 = page(&engine, accessor, options());
    let p2 = page(&engine, accessor, options().starting_after(p1.next.clone()));
    let p3 = page(&engine, accessor, options().starting_after(p2.next.clone()));
    assert_eq!(indices(&p1), vec![2, 4]);
    assert_eq!(indices(&p2), vec![6, 8]);
    assert_eq!(indices(&p3), vec![10, 12]);

    let back_to_p1 = page(&engine, accessor, options().ending_before(p2.prev.clone()));
    assert_eq!(indices(&back_to_p1), vec![2, 4]);
    assert_eq!(back_to_p1.next, p1.next);
    assert_eq!(back_to_p1.prev, p1.prev);
    assert!(!back_to_p1.has_prev);

    let back_to_p2 = page(&engine, accessor, options().ending_before(p3.prev));
    assert_eq!(indices(&back_to_p2), vec![6, 8]);
    assert_eq!(back_to_p2.next, p2.next);
    assert!(back_to_p2.has_prev);
}

/// A policy reached through both the accessor and a column runs once per row.
#[test]
fn test_repeated_policy_evaluated_once() {
    let fixture = Fixture::new();
    let allow = |name: &str| {
        fixture
            .catalog
            .put_access_policy(
                AccessPolicy::new(name, PolicyType::CompositeAnd)
                    .with_template(ALLOW_ALL_TEMPLATE_ID, serde_json::Value::Null),
            )
            .unwrap()
    };
    let accessor_policy = allow("accessor_policy");
    let column_policy = allow("column_policy");

    let guarded = Column::new("guarded", DataType::String).with_access_policy(column_policy);
    let shared = Column::new("shared", DataType::String).with_access_policy(accessor_policy);
    for column in [&guarded, &shared] {
        fixture.catalog.add_column(column.clone()).unwrap();
    }

    let evaluator = Arc::new(CountingEvaluator::default());
    let engine = fixture.builder().policy_evaluator(evaluator.clone()).build();
    let accessor = fixture.add_accessor(fixture.accessor_for(&[&fixture.name, &guarded, &shared], accessor_policy));

    let resp = page(&engine, accessor, PaginationOptions::new().limit(1));
    assert_eq!(indices(&resp), vec![1]);
    assert_eq!(evaluator.calls.load(Ordering::Relaxed), 2);
}

// =============================================================================
// Un-paginated Calls
// =============================================================================

/// Calls without pagination options return one window sorted by id.
#[test]
fn test_unpaginated_returns_everything() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();

    let resp = engine
        .execute_accessor(accessor, &CallerContext::anonymous(), &no_context(), &[], &ExecutionOptions::new())
        .unwrap();
    assert_eq!(indices(&resp), range(1, 35));
    assert!(!resp.truncated);
    assert!(!resp.has_next);
    assert!(!resp.has_prev);
}

/// Un-paginated calls stop at the configured maximum and report truncation.
#[test]
fn test_unpaginated_truncates_at_max_limit() {
    let fixture = Fixture::with_config(EngineConfig {
        default_limit: 10,
        max_limit: 20,
        ..EngineConfig::default()
    });
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();

    let resp = engine
        .execute_accessor(accessor, &CallerContext::anonymous(), &no_context(), &[], &ExecutionOptions::new())
        .unwrap();
    assert_eq!(indices(&resp), range(1, 20));
    assert!(resp.truncated);
    assert!(resp.next.is_end());
}

// =============================================================================
// Selectors and Consent
// =============================================================================

/// Selector placeholders bind the caller's values.
#[test]
fn test_selector_values_filter_users() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let mut accessor = fixture.accessor(userstore_engine::policy::ALLOW_ALL_POLICY_ID);
    accessor.selector_config = SelectorConfig::new("{string} = ?");
    let accessor = fixture.add_accessor(accessor);

    let resp = engine
        .execute_accessor(
            accessor,
            &CallerContext::anonymous(),
            &no_context(),
            &[json!("foo")],
            &ExecutionOptions::new(),
        )
        .unwrap();
    assert_eq!(indices(&resp), vec![4, 9, 14, 19, 24, 29, 34]);
}

/// Missing selector values are a client error.
#[test]
fn test_selector_missing_value_is_bad_request() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let mut accessor = fixture.accessor(userstore_engine::policy::ALLOW_ALL_POLICY_ID);
    accessor.selector_config = SelectorConfig::new("{string} = ?");
    let accessor = fixture.add_accessor(accessor);

    let err = engine
        .execute_accessor(accessor, &CallerContext::anonymous(), &no_context(), &[], &ExecutionOptions::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::Selector(_)));
    assert_eq!(err.status_code(), 400);
}

/// Values not consented for the accessor's purposes are left out of the row.
#[test]
fn test_unconsented_values_are_omitted() {
    let fixture = Fixture::new();
    let extra = UserRecord::new(fixture.organization_id)
        .with_id(user_id(100))
        .with_value(&fixture.name, Value::String("user100".into()), [fixture.operational])
        .with_value(&fixture.string, Value::String("secret".into()), [fixture.marketing]);
    fixture.users.insert_user(extra).unwrap();

    let engine = fixture.engine();
    let mut accessor = fixture.accessor(userstore_engine::policy::ALLOW_ALL_POLICY_ID);
    accessor.selector_config = SelectorConfig::new("{id} = ?");
    let accessor = fixture.add_accessor(accessor);

    let resp = engine
        .execute_accessor(
            accessor,
            &CallerContext::anonymous(),
            &no_context(),
            &[json!(user_id(100).to_string())],
            &ExecutionOptions::new(),
        )
        .unwrap();
    let rows = rows(&resp);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], json!("user100"));
    assert!(!rows[0].contains_key("string"));
    assert!(!rows[0].contains_key("boolean"));
    assert!(!rows[0].contains_key("id"));
}

// =============================================================================
// Request Validation
// =============================================================================

/// Invalid pagination requests fail with 400 before any row is read.
#[test]
fn test_invalid_pagination_is_bad_request() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();

    let invalid = [
        PaginationOptions::new().limit(0),
        PaginationOptions::new().limit(1501),
        PaginationOptions::new().limit_multiplier(0),
        PaginationOptions::new().sort_key("id,string"),
        PaginationOptions::new().sort_key("string"),
        PaginationOptions::new().sort_key("unknown,id"),
        PaginationOptions::new().sort_key("string,string,id"),
        PaginationOptions::new().starting_after(Cursor::end()),
        PaginationOptions::new().ending_before(Cursor::begin()),
        PaginationOptions::new()
            .starting_after(Cursor::new(format!("id:{}", user_id(1))))
            .ending_before(Cursor::end()),
        PaginationOptions::new().starting_after(Cursor::new("garbage")),
        PaginationOptions::new().starting_after(Cursor::new(format!("string:bar,id:{}", user_id(1)))),
    ];
    for options in invalid {
        let err = page_err(&engine, accessor, options.clone());
        assert!(matches!(err, EngineError::Pagination(_)), "{:?} -> {:?}", options, err);
        assert_eq!(err.status_code(), 400);
    }
    assert_eq!(engine.metrics().snapshot().rows_emitted, 0);
}

/// Unknown accessors are reported as not found.
#[test]
fn test_unknown_accessor_is_not_found() {
    let fixture = Fixture::new();
    let engine = fixture.engine();

    let err = page_err(&engine, Uuid::new_v4(), PaginationOptions::new());
    assert!(matches!(err, EngineError::AccessorNotFound(_)));
    assert_eq!(err.status_code(), 404);
    assert_eq!(engine.metrics().snapshot().rejected_executions, 1);
}

// =============================================================================
// Execution Options
// =============================================================================

/// Debug output is attached only when the configuration enables it.
#[test]
fn test_debug_output_requires_config() {
    let fixture = Fixture::with_config(EngineConfig {
        debug_enabled: true,
        ..EngineConfig::default()
    });
    let accessor = fixture.allow_all_accessor();
    let options = ExecutionOptions::new()
        .paginate(PaginationOptions::new().limit(10))
        .debug();

    let resp = fixture
        .engine()
        .execute_accessor(accessor, &CallerContext::anonymous(), &no_context(), &[], &options)
        .unwrap();
    let debug = resp.debug.unwrap();
    assert_eq!(debug["candidates"], json!(10));
    assert_eq!(debug["emitted"], json!(10));
    assert_eq!(debug["sort_keys"], json!(["id"]));

    let quiet = Fixture::new();
    let accessor = quiet.allow_all_accessor();
    let resp = quiet
        .engine()
        .execute_accessor(accessor, &CallerContext::anonymous(), &no_context(), &[], &options)
        .unwrap();
    assert!(resp.debug.is_none());
}

/// A cancelled invocation fails without reading rows.
#[test]
fn test_cancelled_invocation() {
    let fixture = Fixture::new();
    let engine = fixture.engine();
    let accessor = fixture.allow_all_accessor();

    let token = userstore_engine::engine::CancellationToken::new();
    token.cancel();
    let err = engine
        .execute_accessor(
            accessor,
            &CallerContext::anonymous(),
            &no_context(),
            &[],
            &ExecutionOptions::new().cancellation(token),
        )
        .unwrap_err();
    assert_eq!(err, EngineError::Cancelled);
    assert_eq!(engine.metrics().snapshot().rows_emitted, 0);
}
