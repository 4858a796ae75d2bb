//! userstore-engine - Policy-governed accessor and mutator execution
//!
//! Named read (accessor) and write (mutator) APIs over a `users` table,
//! with cursor pagination, per-row access policies, execution-rate and
//! result-volume thresholds, consent filtering and tokenization.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod consent;
pub mod engine;
pub mod model;
pub mod mutation;
pub mod observability;
pub mod pagination;
pub mod policy;
pub mod selector;
pub mod storage;
pub mod transform;

pub use engine::{AccessorResponse, Engine, EngineBuilder, EngineError, EngineResult, ExecutionOptions, MutatorResponse};
