//! Column transformers and tokenization
//!
//! Accessor output columns pass through a [`Transformer`] before they are
//! emitted; mutator input columns pass through one as a normalizer before
//! they are stored.
//!
//! # Transform types
//!
//! - `Passthrough`: value is emitted unchanged
//! - `Transform`: value is replaced by a derived, non-reversible string
//! - `TokenizeByValue`: value is replaced by a token that records the value
//! - `TokenizeByReference`: value is replaced by a token that records the
//!   (user, column) the value came from
//!
//! # Invariants
//!
//! 1. Every token is unique within its [`TokenStore`]
//! 2. With `reuse_existing_token`, identical (data, transformer, token policy)
//!    triples map to one token
//! 3. Without it, every invocation mints a fresh token

mod errors;
mod executor;
mod functions;
mod tokens;
mod transformer;

pub use errors::{TransformError, TransformResult};
pub use executor::{TransformExecutor, Transformed};
pub use functions::{BuiltinTransformerEvaluator, TransformerEvaluator};
pub use tokens::{InMemoryTokenStore, TokenProvenance, TokenRecord, TokenReuseKey, TokenStore};
pub use transformer::{TransformType, Transformer, PASSTHROUGH_TRANSFORMER_ID};
