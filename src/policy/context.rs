//! Policy evaluation context

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use uuid::Uuid;

/// What the caller is doing when a policy is evaluated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    Execute,
    Resolve,
    Inspect,
    Lookup,
    Delete,
}

/// Identity and transport details of the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallerContext {
    #[serde(default)]
    pub ip_address: Option<String>,
    /// Claims of the caller's authenticated token
    #[serde(default)]
    pub claims: Map<String, Json>,
    #[serde(default)]
    pub connection_id: Option<Uuid>,
}

impl CallerContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Caller authenticated as `subject`
    pub fn with_subject(subject: impl Into<String>) -> Self {
        let mut claims = Map::new();
        claims.insert("sub".to_string(), Json::String(subject.into()));
        Self {
            claims,
            ..Self::default()
        }
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: Json) -> Self {
        self.claims.insert(key.into(), value);
        self
    }

    pub fn with_connection(mut self, connection_id: Uuid) -> Self {
        self.connection_id = Some(connection_id);
        self
    }
}

/// Server-populated part of the policy context
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerContext {
    pub ip_address: String,
    pub action: Action,
    pub purpose_names: Vec<String>,
    pub claims: Map<String, Json>,
}

/// Everything a policy function may inspect
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessPolicyContext {
    pub server: ServerContext,
    /// Context supplied by the client with the request
    pub client: Map<String, Json>,
    /// Profile of the user row under evaluation
    pub user: Map<String, Json>,
    /// Selector values of the request
    pub query: Vec<Json>,
    /// Row data of a mutator request
    pub row_data: Map<String, Json>,
    pub connection_id: Option<Uuid>,
}

impl AccessPolicyContext {
    pub fn new(caller: &CallerContext, action: Action, client: Map<String, Json>) -> Self {
        Self {
            server: ServerContext {
                ip_address: caller.ip_address.clone().unwrap_or_default(),
                action,
                purpose_names: Vec::new(),
                claims: caller.claims.clone(),
            },
            client,
            user: Map::new(),
            query: Vec::new(),
            row_data: Map::new(),
            connection_id: caller.connection_id,
        }
    }

    pub fn with_purposes(mut self, purpose_names: Vec<String>) -> Self {
        self.server.purpose_names = purpose_names;
        self
    }

    pub fn with_query(mut self, query: Vec<Json>) -> Self {
        self.query = query;
        self
    }

    pub fn with_row_data(mut self, row_data: Map<String, Json>) -> Self {
        self.row_data = row_data;
        self
    }

    /// Copy of this context scoped to one user row
    pub fn for_user(&self, user: Map<String, Json>) -> Self {
        Self {
            user,
            ..self.clone()
        }
    }

    /// Copy of this context with a different action
    pub fn for_action(&self, action: Action) -> Self {
        let mut context = self.clone();
        context.server.action = action;
        context
    }
}
