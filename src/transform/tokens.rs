//! Token records and storage

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::errors::{TransformError, TransformResult};

/// Origin of a by-reference token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenProvenance {
    pub user_id: Uuid,
    pub column_id: Uuid,
}

/// Key under which a reusable token is found again
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TokenReuseKey {
    /// SHA-256 of (data, transformer, access policy)
    ByValue(String),
    ByReference {
        provenance: TokenProvenance,
        transformer_id: Uuid,
        access_policy_id: Uuid,
    },
}

impl TokenReuseKey {
    pub fn by_value(data: &str, transformer_id: Uuid, access_policy_id: Uuid) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        hasher.update([0u8]);
        hasher.update(transformer_id.as_bytes());
        hasher.update(access_policy_id.as_bytes());
        TokenReuseKey::ByValue(format!("{:x}", hasher.finalize()))
    }
}

/// A minted token and what it stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub token: String,
    /// Tokenized value (by-value tokens)
    pub data: Option<String>,
    /// Source of the value (by-reference tokens)
    pub provenance: Option<TokenProvenance>,
    pub transformer_id: Uuid,
    pub transformer_version: i32,
    /// Policy evaluated when the token is resolved
    pub access_policy_id: Uuid,
    pub created: DateTime<Utc>,
}

impl TokenRecord {
    pub fn reuse_key(&self) -> Option<TokenReuseKey> {
        match (&self.data, self.provenance) {
            (_, Some(provenance)) => Some(TokenReuseKey::ByReference {
                provenance,
                transformer_id: self.transformer_id,
                access_policy_id: self.access_policy_id,
            }),
            (Some(data), None) => Some(TokenReuseKey::by_value(
                data,
                self.transformer_id,
                self.access_policy_id,
            )),
            (None, None) => None,
        }
    }
}

/// Persistent token storage
pub trait TokenStore: Send + Sync {
    /// Stores `record`; returns false if its token is already taken
    fn save(&self, record: TokenRecord) -> TransformResult<bool>;

    fn get(&self, token: &str) -> TransformResult<Option<TokenRecord>>;

    /// Earliest token minted under `key`
    fn find_reusable(&self, key: &TokenReuseKey) -> TransformResult<Option<TokenRecord>>;
}

/// Process-local token store
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    by_token: RwLock<HashMap<String, TokenRecord>>,
    by_reuse_key: RwLock<HashMap<TokenReuseKey, String>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_token.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> TransformError {
    TransformError::TokenStore("lock poisoned".into())
}

impl TokenStore for InMemoryTokenStore {
    fn save(&self, record: TokenRecord) -> TransformResult<bool> {
        let mut by_token = self.by_token.write().map_err(|_| poisoned())?;
        if by_token.contains_key(&record.token) {
            return Ok(false);
        }

        if let Some(key) = record.reuse_key() {
            let mut by_reuse_key = self.by_reuse_key.write().map_err(|_| poisoned())?;
            by_reuse_key.entry(key).or_insert_with(|| record.token.clone());
        }
        by_token.insert(record.token.clone(), record);
        Ok(true)
    }

    fn get(&self, token: &str) -> TransformResult<Option<TokenRecord>> {
        let by_token = self.by_token.read().map_err(|_| poisoned())?;
        Ok(by_token.get(token).cloned())
    }

    fn find_reusable(&self, key: &TokenReuseKey) -> TransformResult<Option<TokenRecord>> {
        let token = {
            let by_reuse_key = self.by_reuse_key.read().map_err(|_| poisoned())?;
            match by_reuse_key.get(key) {
                Some(token) => token.clone(),
                None => return Ok(None),
            }
        };
        self.get(&token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::now_micros;

    fn record(token: &str, data: &str, policy: Uuid, transformer: Uuid) -> TokenRecord {
        TokenRecord {
            token: token.to_string(),
            data: Some(data.to_string()),
            provenance: None,
            transformer_id: transformer,
            transformer_version: 0,
            access_policy_id: policy,
            created: now_micros(),
        }
    }

    #[test]
    fn test_duplicate_token_rejected() {
        let store = InMemoryTokenStore::new();
        let (policy, transformer) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(store.save(record("t1", "a", policy, transformer)).unwrap());
        assert!(!store.save(record("t1", "b", policy, transformer)).unwrap());
        assert_eq!(store.get("t1").unwrap().unwrap().data.as_deref(), Some("a"));
    }

    #[test]
    fn test_reuse_lookup_keeps_first_token() {
        let store = InMemoryTokenStore::new();
        let (policy, transformer) = (Uuid::new_v4(), Uuid::new_v4());
        store.save(record("t1", "a", policy, transformer)).unwrap();
        store.save(record("t2", "a", policy, transformer)).unwrap();

        let key = TokenReuseKey::by_value("a", transformer, policy);
        assert_eq!(store.find_reusable(&key).unwrap().unwrap().token, "t1");

        let other_policy = TokenReuseKey::by_value("a", transformer, Uuid::new_v4());
        assert!(store.find_reusable(&other_policy).unwrap().is_none());
    }
}
