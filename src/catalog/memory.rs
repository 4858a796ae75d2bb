//! In-memory catalog

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::model::{Accessor, Column, Mutator};
use crate::policy::{AccessPolicy, AccessPolicyTemplate, PolicyComponent, PolicySource};
use crate::selector::SelectorParser;
use crate::transform::{TransformError, Transformer};

use super::errors::{CatalogError, CatalogResult};
use super::{Catalog, Purpose};

/// Catalog held in process memory
///
/// Starts out with the built-in AllowAll/DenyAll policies and templates and
/// the passthrough transformer.
#[derive(Debug)]
pub struct InMemoryCatalog {
    config: EngineConfig,
    columns: RwLock<HashMap<Uuid, Column>>,
    purposes: RwLock<HashMap<Uuid, Purpose>>,
    accessors: RwLock<HashMap<Uuid, Accessor>>,
    mutators: RwLock<HashMap<Uuid, Mutator>>,
    transformers: RwLock<HashMap<Uuid, Transformer>>,
    policies: RwLock<HashMap<Uuid, AccessPolicy>>,
    templates: RwLock<HashMap<Uuid, AccessPolicyTemplate>>,
    global_accessor_policy: RwLock<Option<Uuid>>,
    global_mutator_policy: RwLock<Option<Uuid>>,
}

fn poisoned() -> CatalogError {
    CatalogError::Unavailable("lock poisoned".into())
}

fn read<K: Eq + Hash, V: Clone>(map: &RwLock<HashMap<K, V>>, key: &K) -> Option<V> {
    map.read().ok().and_then(|m| m.get(key).cloned())
}

fn insert<K: Eq + Hash, V>(map: &RwLock<HashMap<K, V>>, key: K, value: V) -> CatalogResult<()> {
    map.write().map_err(|_| poisoned())?.insert(key, value);
    Ok(())
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl InMemoryCatalog {
    pub fn new(config: EngineConfig) -> Self {
        let builtin_templates = [AccessPolicyTemplate::allow_all(), AccessPolicyTemplate::deny_all()];
        let builtin_policies = [AccessPolicy::allow_all(), AccessPolicy::deny_all()];
        let passthrough = Transformer::passthrough();

        Self {
            config,
            columns: RwLock::default(),
            purposes: RwLock::default(),
            accessors: RwLock::default(),
            mutators: RwLock::default(),
            transformers: RwLock::new(HashMap::from([(passthrough.id, passthrough)])),
            policies: RwLock::new(builtin_policies.into_iter().map(|p| (p.id, p)).collect()),
            templates: RwLock::new(builtin_templates.into_iter().map(|t| (t.id, t)).collect()),
            global_accessor_policy: RwLock::new(None),
            global_mutator_policy: RwLock::new(None),
        }
    }

    pub fn add_column(&self, column: Column) -> CatalogResult<Uuid> {
        column.validate()?;
        {
            let columns = self.columns.read().map_err(|_| poisoned())?;
            if columns.values().any(|c| c.id != column.id && c.name.eq_ignore_ascii_case(&column.name)) {
                return Err(CatalogError::DuplicateName {
                    kind: "column",
                    name: column.name,
                });
            }
        }
        let id = column.id;
        insert(&self.columns, id, column)?;
        Ok(id)
    }

    pub fn add_purpose(&self, purpose: Purpose) -> CatalogResult<Uuid> {
        let id = purpose.id;
        insert(&self.purposes, id, purpose)?;
        Ok(id)
    }

    pub fn add_transformer(&self, transformer: Transformer) -> CatalogResult<Uuid> {
        transformer.validate()?;
        let id = transformer.id;
        insert(&self.transformers, id, transformer)?;
        Ok(id)
    }

    pub fn add_policy_template(&self, template: AccessPolicyTemplate) -> CatalogResult<Uuid> {
        let id = template.id;
        insert(&self.templates, id, template)?;
        Ok(id)
    }

    /// Creates or replaces an access policy.
    ///
    /// Replacing bumps the version; referencing objects see the new
    /// definition on their next execution.
    pub fn put_access_policy(&self, mut policy: AccessPolicy) -> CatalogResult<Uuid> {
        policy.validate(&self.config)?;
        for component in &policy.components {
            match component {
                PolicyComponent::Policy { policy_id } if read(&self.policies, policy_id).is_none() => {
                    return Err(CatalogError::PolicyNotFound(*policy_id))
                }
                PolicyComponent::Template { template_id, .. } if read(&self.templates, template_id).is_none() => {
                    return Err(CatalogError::Policy(crate::policy::PolicyError::TemplateNotFound(*template_id)))
                }
                _ => {}
            }
        }

        let mut policies = self.policies.write().map_err(|_| poisoned())?;
        if let Some(existing) = policies.get(&policy.id) {
            policy.version = existing.version + 1;
        }
        let id = policy.id;
        policies.insert(id, policy);
        Ok(id)
    }

    pub fn set_global_accessor_policy(&self, policy_id: Option<Uuid>) -> CatalogResult<()> {
        self.require_policy(policy_id)?;
        *self.global_accessor_policy.write().map_err(|_| poisoned())? = policy_id;
        Ok(())
    }

    pub fn set_global_mutator_policy(&self, policy_id: Option<Uuid>) -> CatalogResult<()> {
        self.require_policy(policy_id)?;
        *self.global_mutator_policy.write().map_err(|_| poisoned())? = policy_id;
        Ok(())
    }

    fn require_policy(&self, policy_id: Option<Uuid>) -> CatalogResult<()> {
        match policy_id {
            Some(id) if read(&self.policies, &id).is_none() => Err(CatalogError::PolicyNotFound(id)),
            _ => Ok(()),
        }
    }

    fn require_column(&self, id: Uuid) -> CatalogResult<Column> {
        read(&self.columns, &id).ok_or(CatalogError::ColumnNotFound(id))
    }

    fn require_transformer(&self, id: Uuid) -> CatalogResult<Transformer> {
        read(&self.transformers, &id).ok_or(CatalogError::TransformerNotFound(id))
    }

    /// Registers an accessor after checking every reference it makes
    pub fn add_accessor(&self, accessor: Accessor) -> CatalogResult<Uuid> {
        accessor.validate()?;
        SelectorParser::parse(&accessor.selector_config.where_clause)?;
        self.require_policy(Some(accessor.access_policy_id))?;
        self.require_policy(accessor.token_access_policy_id)?;
        for purpose in &accessor.purposes {
            if read(&self.purposes, purpose).is_none() {
                return Err(CatalogError::PurposeNotFound(*purpose));
            }
        }

        for output in &accessor.columns {
            let column = self.require_column(output.column_id)?;
            let transformer = self.require_transformer(output.transformer_id)?;
            if !transformer.accepts(column.data_type) {
                return Err(TransformError::InputTypeMismatch {
                    transformer: transformer.name,
                    column: column.name,
                    expected: transformer.input_type.as_str(),
                    found: column.data_type.as_str(),
                }
                .into());
            }
            self.require_policy(output.token_access_policy_id)?;
            if transformer.transform_type.is_tokenizing()
                && output.token_access_policy_id.is_none()
                && accessor.token_access_policy_id.is_none()
            {
                return Err(TransformError::TokenPolicyRequired(transformer.name).into());
            }
        }

        let id = accessor.id;
        insert(&self.accessors, id, accessor)?;
        Ok(id)
    }

    /// Registers a mutator after checking every reference it makes
    pub fn add_mutator(&self, mutator: Mutator) -> CatalogResult<Uuid> {
        mutator.validate()?;
        SelectorParser::parse(&mutator.selector_config.where_clause)?;
        self.require_policy(Some(mutator.access_policy_id))?;

        for input in &mutator.columns {
            let column = self.require_column(input.column_id)?;
            let normalizer = self.require_transformer(input.normalizer_id)?;
            if normalizer.transform_type.is_tokenizing() {
                return Err(TransformError::InvalidTransformer(format!(
                    "normalizer '{}' for column '{}' must not tokenize",
                    normalizer.name, column.name
                ))
                .into());
            }
            if !normalizer.accepts(column.data_type) {
                return Err(TransformError::InputTypeMismatch {
                    transformer: normalizer.name,
                    column: column.name,
                    expected: normalizer.input_type.as_str(),
                    found: column.data_type.as_str(),
                }
                .into());
            }
        }

        let id = mutator.id;
        insert(&self.mutators, id, mutator)?;
        Ok(id)
    }
}

impl PolicySource for InMemoryCatalog {
    fn access_policy(&self, id: Uuid) -> Option<AccessPolicy> {
        read(&self.policies, &id)
    }

    fn policy_template(&self, id: Uuid) -> Option<AccessPolicyTemplate> {
        read(&self.templates, &id)
    }
}

impl Catalog for InMemoryCatalog {
    fn accessor(&self, id: Uuid) -> Option<Accessor> {
        read(&self.accessors, &id)
    }

    fn mutator(&self, id: Uuid) -> Option<Mutator> {
        read(&self.mutators, &id)
    }

    fn column(&self, id: Uuid) -> Option<Column> {
        read(&self.columns, &id)
    }

    fn columns(&self) -> Vec<Column> {
        let mut columns: Vec<Column> = self
            .columns
            .read()
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default();
        columns.sort_by(|a, b| a.name.cmp(&b.name));
        columns
    }

    fn transformer(&self, id: Uuid) -> Option<Transformer> {
        read(&self.transformers, &id)
    }

    fn purpose(&self, id: Uuid) -> Option<Purpose> {
        read(&self.purposes, &id)
    }

    fn global_accessor_policy_id(&self) -> Option<Uuid> {
        self.global_accessor_policy.read().ok().and_then(|id| *id)
    }

    fn global_mutator_policy_id(&self) -> Option<Uuid> {
        self.global_mutator_policy.read().ok().and_then(|id| *id)
    }

    fn policies(&self) -> &dyn PolicySource {
        self
    }
}
