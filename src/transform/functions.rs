//! Transformer function evaluation

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::{TransformError, TransformResult};
use super::transformer::Transformer;

const RANDOM_TOKEN_BYTES: usize = 24;

/// Executes a transformer body against one input
pub trait TransformerEvaluator: Send + Sync {
    /// Derives the output (or a token candidate) for `input`
    fn transform(&self, transformer: &Transformer, input: &str) -> TransformResult<String>;
}

/// Evaluator for the built-in transformer functions
///
/// | Function        | Output                                         |
/// |-----------------|------------------------------------------------|
/// | `identity`      | input unchanged                                |
/// | `sha256`        | lowercase hex digest                           |
/// | `mask_email`    | `a****@example.com`                            |
/// | `last_four`     | every character but the last four as `*`       |
/// | `lowercase`     | lowercased input                               |
/// | `uppercase`     | uppercased input                               |
/// | `trim`          | input without surrounding whitespace           |
/// | `uuid`          | random v4 uuid (token generator)               |
/// | `random_string` | random URL-safe base64 string (token generator) |
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinTransformerEvaluator;

fn mask(s: &str) -> String {
    "*".repeat(s.chars().count())
}

fn mask_email(input: &str) -> String {
    match input.split_once('@') {
        Some((local, domain)) => {
            let mut chars = local.chars();
            match chars.next() {
                Some(first) => format!("{}{}@{}", first, mask(chars.as_str()), domain),
                None => format!("@{}", domain),
            }
        }
        None => mask(input),
    }
}

fn last_four(input: &str) -> String {
    let len = input.chars().count();
    let keep = len.min(4);
    input
        .chars()
        .enumerate()
        .map(|(i, c)| if i < len - keep { '*' } else { c })
        .collect()
}

fn random_string() -> String {
    let mut bytes = [0u8; RANDOM_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl TransformerEvaluator for BuiltinTransformerEvaluator {
    fn transform(&self, transformer: &Transformer, input: &str) -> TransformResult<String> {
        let output = match transformer.function.as_str() {
            "identity" => input.to_string(),
            "sha256" => format!("{:x}", Sha256::digest(input.as_bytes())),
            "mask_email" => mask_email(input),
            "last_four" => last_four(input),
            "lowercase" => input.to_lowercase(),
            "uppercase" => input.to_uppercase(),
            "trim" => input.trim().to_string(),
            "uuid" => Uuid::new_v4().to_string(),
            "random_string" => random_string(),
            other => return Err(TransformError::UnknownFunction(other.to_string())),
        };
        Ok(output)
    }
}
