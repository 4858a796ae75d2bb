//! Access policies
//!
//! Composable allow/deny logic plus per-policy execution thresholds.
//!
//! # Principles
//!
//! 1. Policies compose components with AND/OR; components are either
//!    references to other policies or parameterized templates
//! 2. Policies are looked up by ID at execution time, so edits apply
//!    immediately to every accessor and mutator referencing them
//! 3. A deny outcome is not an error
//! 4. Threshold gates report `Admitted`, `DeniedSilently` or
//!    `DeniedAnnounced`; the engine decides what each means for a response
//!
//! # Rate limiting
//!
//! Execution counts live in a [`RateLimitStore`] keyed by policy id and
//! bucketed by second. Reserving a slot is a single atomic
//! check-and-increment.

mod access_policy;
mod context;
mod errors;
mod evaluator;
mod rate_limit;
mod thresholds;

pub use access_policy::{
    AccessPolicy, AccessPolicyTemplate, PolicyComponent, PolicyType, ALLOW_ALL_POLICY_ID,
    ALLOW_ALL_TEMPLATE_ID, DENY_ALL_POLICY_ID, DENY_ALL_TEMPLATE_ID,
};
pub use context::{AccessPolicyContext, Action, CallerContext, ServerContext};
pub use errors::{PolicyError, PolicyResult};
pub use evaluator::{BuiltinPolicyEvaluator, PolicyEngine, PolicyEvaluator, PolicySource};
pub use rate_limit::{InMemoryRateLimitStore, RateLimitKey, RateLimitStore, RateLimiter};
pub use thresholds::{AccessPolicyThresholds, GateOutcome, ThresholdExceeded};
