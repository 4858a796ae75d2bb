//! Policy evaluation
//!
//! [`PolicyEngine`] walks a policy's composition, loading referenced
//! policies and templates from a [`PolicySource`] and delegating template
//! bodies to a [`PolicyEvaluator`].

use serde_json::Value as Json;
use uuid::Uuid;

use super::access_policy::{AccessPolicy, AccessPolicyTemplate, PolicyComponent, PolicyType};
use super::context::AccessPolicyContext;
use super::errors::{PolicyError, PolicyResult};

const MAX_COMPOSITION_DEPTH: usize = 16;

/// Lookup of stored policies and templates
pub trait PolicySource: Send + Sync {
    fn access_policy(&self, id: Uuid) -> Option<AccessPolicy>;

    fn policy_template(&self, id: Uuid) -> Option<AccessPolicyTemplate>;
}

/// Executes a template body against a context
pub trait PolicyEvaluator: Send + Sync {
    fn evaluate(
        &self,
        template: &AccessPolicyTemplate,
        context: &AccessPolicyContext,
        parameters: &Json,
    ) -> PolicyResult<bool>;
}

/// Evaluator for the built-in template functions
///
/// - `allow_all` / `deny_all`
/// - `check_attribute`: `{"source": "claims"|"client"|"user", "attribute": .., "value": ..}`
///   allows when the attribute equals the value (source defaults to claims)
/// - `require_purpose`: `{"purpose": name}` allows when the call runs for that purpose
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinPolicyEvaluator;

impl BuiltinPolicyEvaluator {
    fn string_param<'a>(template: &AccessPolicyTemplate, parameters: &'a Json, name: &str) -> PolicyResult<&'a str> {
        parameters
            .get(name)
            .and_then(Json::as_str)
            .ok_or_else(|| PolicyError::InvalidParameters {
                template: template.name.clone(),
                reason: format!("missing string parameter '{}'", name),
            })
    }
}

impl PolicyEvaluator for BuiltinPolicyEvaluator {
    fn evaluate(
        &self,
        template: &AccessPolicyTemplate,
        context: &AccessPolicyContext,
        parameters: &Json,
    ) -> PolicyResult<bool> {
        match template.function.as_str() {
            "allow_all" => Ok(true),
            "deny_all" => Ok(false),
            "check_attribute" => {
                let attribute = Self::string_param(template, parameters, "attribute")?;
                let expected = parameters.get("value").unwrap_or(&Json::Null);
                let source = match parameters.get("source").and_then(Json::as_str).unwrap_or("claims") {
                    "claims" => &context.server.claims,
                    "client" => &context.client,
                    "user" => &context.user,
                    other => {
                        return Err(PolicyError::InvalidParameters {
                            template: template.name.clone(),
                            reason: format!("unknown attribute source '{}'", other),
                        })
                    }
                };
                Ok(source.get(attribute) == Some(expected))
            }
            "require_purpose" => {
                let purpose = Self::string_param(template, parameters, "purpose")?;
                Ok(context.server.purpose_names.iter().any(|p| p == purpose))
            }
            other => Err(PolicyError::UnknownFunction(other.to_string())),
        }
    }
}

/// Evaluates composite access policies
pub struct PolicyEngine<'a> {
    source: &'a dyn PolicySource,
    evaluator: &'a dyn PolicyEvaluator,
}

impl<'a> PolicyEngine<'a> {
    pub fn new(source: &'a dyn PolicySource, evaluator: &'a dyn PolicyEvaluator) -> Self {
        Self { source, evaluator }
    }

    /// Evaluates the stored policy `id`
    pub fn evaluate_id(&self, id: Uuid, context: &AccessPolicyContext) -> PolicyResult<bool> {
        let policy = self
            .source
            .access_policy(id)
            .ok_or(PolicyError::PolicyNotFound(id))?;
        self.evaluate(&policy, context)
    }

    /// Evaluates `policy`, short-circuiting AND/OR composition
    pub fn evaluate(&self, policy: &AccessPolicy, context: &AccessPolicyContext) -> PolicyResult<bool> {
        self.evaluate_at(policy, context, 0)
    }

    fn evaluate_at(&self, policy: &AccessPolicy, context: &AccessPolicyContext, depth: usize) -> PolicyResult<bool> {
        if depth > MAX_COMPOSITION_DEPTH {
            return Err(PolicyError::CompositionTooDeep(MAX_COMPOSITION_DEPTH));
        }

        for component in &policy.components {
            let allowed = match component {
                PolicyComponent::Policy { policy_id } => {
                    let nested = self
                        .source
                        .access_policy(*policy_id)
                        .ok_or(PolicyError::PolicyNotFound(*policy_id))?;
                    self.evaluate_at(&nested, context, depth + 1)?
                }
                PolicyComponent::Template {
                    template_id,
                    parameters,
                } => {
                    let template = self
                        .source
                        .policy_template(*template_id)
                        .ok_or(PolicyError::TemplateNotFound(*template_id))?;
                    self.evaluator.evaluate(&template, context, parameters)?
                }
            };

            match (policy.policy_type, allowed) {
                (PolicyType::CompositeAnd, false) => return Ok(false),
                (PolicyType::CompositeOr, true) => return Ok(true),
                _ => {}
            }
        }

        Ok(policy.policy_type == PolicyType::CompositeAnd)
    }
}
