//! Transformer definitions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::DataType;

use super::errors::{TransformError, TransformResult};

/// Well-known passthrough transformer
pub const PASSTHROUGH_TRANSFORMER_ID: Uuid = Uuid::from_u128(0xc0b5_b2a1_0b1d_4f0c_8b0a_9d3e_7f52_11a0);

/// What a transformer does to a value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformType {
    #[default]
    Passthrough,
    Transform,
    TokenizeByValue,
    TokenizeByReference,
}

impl TransformType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformType::Passthrough => "passthrough",
            TransformType::Transform => "transform",
            TransformType::TokenizeByValue => "tokenize_by_value",
            TransformType::TokenizeByReference => "tokenize_by_reference",
        }
    }

    pub fn is_tokenizing(&self) -> bool {
        matches!(self, TransformType::TokenizeByValue | TransformType::TokenizeByReference)
    }
}

/// A named function applied to column values on the way out (or in)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformer {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub version: i32,
    pub transform_type: TransformType,
    pub input_type: DataType,
    pub output_type: DataType,
    #[serde(default)]
    pub reuse_existing_token: bool,
    /// Name of the evaluator function
    pub function: String,
}

impl Transformer {
    pub fn new(
        name: impl Into<String>,
        transform_type: TransformType,
        input_type: DataType,
        function: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: 0,
            transform_type,
            input_type,
            output_type: DataType::String,
            reuse_existing_token: false,
            function: function.into(),
        }
    }

    pub fn passthrough() -> Self {
        Self {
            id: PASSTHROUGH_TRANSFORMER_ID,
            output_type: DataType::String,
            ..Self::new("PassthroughUnchangedData", TransformType::Passthrough, DataType::String, "identity")
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn reusing_tokens(mut self) -> Self {
        self.reuse_existing_token = true;
        self
    }

    /// True if the transformer can take values of `data_type`.
    ///
    /// Passthrough takes anything; string transformers also take the
    /// string-backed types.
    pub fn accepts(&self, data_type: DataType) -> bool {
        if self.transform_type == TransformType::Passthrough || self.input_type == data_type {
            return true;
        }
        self.input_type == DataType::String && matches!(data_type, DataType::Email | DataType::Ssn)
    }

    pub fn validate(&self) -> TransformResult<()> {
        if self.name.trim().is_empty() {
            return Err(TransformError::InvalidTransformer("name must not be empty".into()));
        }
        if self.function.trim().is_empty() {
            return Err(TransformError::InvalidTransformer(format!(
                "transformer '{}' has no function",
                self.name
            )));
        }
        if self.reuse_existing_token && !self.transform_type.is_tokenizing() {
            return Err(TransformError::InvalidTransformer(format!(
                "reuse_existing_token is only valid for tokenizing transformers ('{}' is {})",
                self.name,
                self.transform_type.as_str()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse_requires_tokenizing() {
        let transformer = Transformer::new("Hash", TransformType::Transform, DataType::String, "sha256").reusing_tokens();
        assert!(matches!(transformer.validate(), Err(TransformError::InvalidTransformer(_))));

        let tokenizer = Transformer::new("Tok", TransformType::TokenizeByValue, DataType::String, "uuid").reusing_tokens();
        assert!(tokenizer.validate().is_ok());
    }

    #[test]
    fn test_accepts() {
        let hash = Transformer::new("Hash", TransformType::Transform, DataType::String, "sha256");
        assert!(hash.accepts(DataType::Email));
        assert!(hash.accepts(DataType::String));
        assert!(!hash.accepts(DataType::Integer));
        assert!(Transformer::passthrough().accepts(DataType::Composite));
    }
}
