//! Access policy definitions

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;

use super::errors::{PolicyError, PolicyResult};
use super::thresholds::AccessPolicyThresholds;

/// Built-in policy that allows every access
pub const ALLOW_ALL_POLICY_ID: Uuid = Uuid::from_u128(0x3f380e42_0b21_4570_a312_91e1b80386fa);

/// Built-in policy that denies every access
pub const DENY_ALL_POLICY_ID: Uuid = Uuid::from_u128(0xc9c14750_b8f3_4507_bd3f_5c6562f0a6e6);

/// Template whose function always allows
pub const ALLOW_ALL_TEMPLATE_ID: Uuid = Uuid::from_u128(0x1e742248_fdde_4c88_9ea7_2c2106ec7aa8);

/// Template whose function always denies
pub const DENY_ALL_TEMPLATE_ID: Uuid = Uuid::from_u128(0x4e8f2b0c_5a1d_4f0e_9c3b_7d2a6e1f8b90);

/// How a policy combines its components
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyType {
    #[default]
    CompositeAnd,
    CompositeOr,
}

/// One component of an access policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyComponent {
    /// Another access policy, by ID
    Policy { policy_id: Uuid },
    /// A template invoked with parameters
    Template {
        template_id: Uuid,
        #[serde(default)]
        parameters: serde_json::Value,
    },
}

/// Parameterizable policy function
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicyTemplate {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub version: i32,
    /// Function body handed to the policy evaluator
    pub function: String,
}

impl AccessPolicyTemplate {
    pub fn new(name: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: 0,
            function: function.into(),
        }
    }

    pub fn allow_all() -> Self {
        Self {
            id: ALLOW_ALL_TEMPLATE_ID,
            ..Self::new("AllowAll", "allow_all")
        }
    }

    pub fn deny_all() -> Self {
        Self {
            id: DENY_ALL_TEMPLATE_ID,
            ..Self::new("DenyAll", "deny_all")
        }
    }
}

/// Composite allow/deny logic plus execution thresholds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPolicy {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub version: i32,
    #[serde(default)]
    pub policy_type: PolicyType,
    pub components: Vec<PolicyComponent>,
    #[serde(default)]
    pub thresholds: AccessPolicyThresholds,
}

impl AccessPolicy {
    pub fn new(name: impl Into<String>, policy_type: PolicyType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: 0,
            policy_type,
            components: Vec::new(),
            thresholds: AccessPolicyThresholds::default(),
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_template(mut self, template_id: Uuid, parameters: serde_json::Value) -> Self {
        self.components.push(PolicyComponent::Template {
            template_id,
            parameters,
        });
        self
    }

    pub fn with_policy(mut self, policy_id: Uuid) -> Self {
        self.components.push(PolicyComponent::Policy { policy_id });
        self
    }

    pub fn with_thresholds(mut self, thresholds: AccessPolicyThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn allow_all() -> Self {
        Self::new("AllowAll", PolicyType::CompositeAnd)
            .with_id(ALLOW_ALL_POLICY_ID)
            .with_template(ALLOW_ALL_TEMPLATE_ID, serde_json::Value::Null)
    }

    pub fn deny_all() -> Self {
        Self::new("DenyAll", PolicyType::CompositeAnd)
            .with_id(DENY_ALL_POLICY_ID)
            .with_template(DENY_ALL_TEMPLATE_ID, serde_json::Value::Null)
    }

    /// Ad-hoc AND of several policies, used to compose per-call policies
    pub fn all_of(name: impl Into<String>, policy_ids: impl IntoIterator<Item = Uuid>) -> Self {
        policy_ids
            .into_iter()
            .fold(Self::new(name, PolicyType::CompositeAnd), |policy, id| {
                policy.with_policy(id)
            })
    }

    pub fn is_allow_all(&self) -> bool {
        self.id == ALLOW_ALL_POLICY_ID
    }

    pub fn validate(&self, config: &EngineConfig) -> PolicyResult<()> {
        if self.name.trim().is_empty() {
            return Err(PolicyError::InvalidPolicy("name must not be empty".into()));
        }
        if self.components.is_empty() {
            return Err(PolicyError::InvalidPolicy(format!(
                "policy '{}' has no components",
                self.name
            )));
        }
        if self
            .components
            .iter()
            .any(|c| matches!(c, PolicyComponent::Policy { policy_id } if *policy_id == self.id))
        {
            return Err(PolicyError::InvalidPolicy(format!(
                "policy '{}' references itself",
                self.name
            )));
        }
        self.thresholds.validate(config)
    }
}
