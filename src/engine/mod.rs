//! Accessor and mutator execution engine
//!
//! The composition root: wires the catalog, user store, policy evaluation,
//! rate limiting, consent, transformation and token storage into the three
//! public operations [`Engine::execute_accessor`],
//! [`Engine::execute_mutator`] and [`Engine::resolve_token`].
//!
//! # Invocation states
//!
//! ```text
//! Admitted -> SelectorBound -> Windowed -> RowsProcessed -> Responded
//!     |                                         |
//!     +-> Denied (announced) / Responded(empty) +-> (result gate) same
//! ```
//!
//! # Invariants
//!
//! 1. Nothing is retried inside the engine
//! 2. Page bounds depend only on the candidate window, never on policy
//! 3. An accessor page fully computes or fully fails
//! 4. Each mutated row is its own atomic unit

mod accessor;
mod builder;
mod errors;
mod mutator;
mod options;
mod tokens;

pub use builder::{Engine, EngineBuilder};
pub use errors::{EngineError, EngineResult};
pub use options::{AccessorResponse, CancellationToken, ExecutionOptions, MutatorResponse};
