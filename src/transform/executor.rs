//! Transformer execution with token minting and reuse

use uuid::Uuid;

use crate::clock::Clock;

use super::errors::{TransformError, TransformResult};
use super::functions::TransformerEvaluator;
use super::tokens::{TokenProvenance, TokenRecord, TokenReuseKey, TokenStore};
use super::transformer::{TransformType, Transformer};

const MAX_TOKEN_UNIQUENESS_TRIES: usize = 5;

/// Result of transforming one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transformed {
    /// Passthrough or derived value
    Value(String),
    /// Freshly minted token
    Minted(String),
    /// Existing token found by reuse lookup
    Reused(String),
}

impl Transformed {
    pub fn as_str(&self) -> &str {
        match self {
            Transformed::Value(s) | Transformed::Minted(s) | Transformed::Reused(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Transformed::Value(s) | Transformed::Minted(s) | Transformed::Reused(s) => s,
        }
    }
}

/// Runs transformers for one invocation
pub struct TransformExecutor<'a> {
    evaluator: &'a dyn TransformerEvaluator,
    tokens: &'a dyn TokenStore,
    clock: &'a dyn Clock,
}

impl<'a> TransformExecutor<'a> {
    pub fn new(evaluator: &'a dyn TransformerEvaluator, tokens: &'a dyn TokenStore, clock: &'a dyn Clock) -> Self {
        Self {
            evaluator,
            tokens,
            clock,
        }
    }

    /// Transforms `data` with `transformer`.
    ///
    /// Tokenizing transformers need `token_access_policy_id`; by-reference
    /// tokenizers also need the value's `provenance`.
    pub fn execute(
        &self,
        transformer: &Transformer,
        token_access_policy_id: Option<Uuid>,
        data: &str,
        provenance: Option<TokenProvenance>,
    ) -> TransformResult<Transformed> {
        match transformer.transform_type {
            TransformType::Passthrough => Ok(Transformed::Value(data.to_string())),
            TransformType::Transform => Ok(Transformed::Value(self.evaluator.transform(transformer, data)?)),
            TransformType::TokenizeByValue | TransformType::TokenizeByReference => {
                let policy_id = token_access_policy_id
                    .ok_or_else(|| TransformError::TokenPolicyRequired(transformer.name.clone()))?;
                self.tokenize(transformer, policy_id, data, provenance)
            }
        }
    }

    fn tokenize(
        &self,
        transformer: &Transformer,
        access_policy_id: Uuid,
        data: &str,
        provenance: Option<TokenProvenance>,
    ) -> TransformResult<Transformed> {
        let (data, provenance) = match transformer.transform_type {
            TransformType::TokenizeByReference => {
                let provenance = provenance.ok_or_else(|| {
                    TransformError::InvalidTransformer(format!(
                        "by-reference transformer '{}' used without a source column",
                        transformer.name
                    ))
                })?;
                (None, Some(provenance))
            }
            _ => (Some(data.to_string()), None),
        };

        let template = TokenRecord {
            token: String::new(),
            data,
            provenance,
            transformer_id: transformer.id,
            transformer_version: transformer.version,
            access_policy_id,
            created: self.clock.now(),
        };

        if transformer.reuse_existing_token {
            if let Some(key) = template.reuse_key() {
                if let Some(existing) = self.tokens.find_reusable(&key)? {
                    return Ok(Transformed::Reused(existing.token));
                }
            }
        }

        let input = template.data.clone().unwrap_or_default();
        for _ in 0..MAX_TOKEN_UNIQUENESS_TRIES {
            let token = self.evaluator.transform(transformer, &input)?;
            let record = TokenRecord {
                token: token.clone(),
                ..template.clone()
            };
            if self.tokens.save(record)? {
                return Ok(Transformed::Minted(token));
            }
        }

        Err(TransformError::TokenCollision {
            transformer: transformer.name.clone(),
            attempts: MAX_TOKEN_UNIQUENESS_TRIES,
        })
    }
}
