//! Authentication state and server-assigned identifiers carried between cases

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The identity returned by a successful login
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
}

impl AuthenticatedUser {
    /// Lenient extraction from a login or profile body; missing fields stay empty
    pub fn from_json(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Self {
            id: value.get("id").and_then(id_to_string).unwrap_or_default(),
            username: text("username"),
            email: text("email"),
            role: text("role"),
        }
    }
}

/// Bearer token plus the identity it belongs to
///
/// Empty until a login succeeds; every request issued afterwards carries the
/// token and none issued before does.
#[derive(Debug, Clone, Default)]
pub struct Session {
    token: Option<String>,
    user: Option<AuthenticatedUser>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the credential from a successful login
    pub fn establish(&mut self, token: String, user: AuthenticatedUser) {
        self.token = Some(token);
        self.user = Some(user);
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Logical role a carried identifier plays in later cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRole {
    Incident,
    Person,
    Message,
    Report,
}

impl fmt::Display for EntityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRole::Incident => write!(f, "test incident"),
            EntityRole::Person => write!(f, "test person"),
            EntityRole::Message => write!(f, "test message"),
            EntityRole::Report => write!(f, "test report"),
        }
    }
}

/// Identifiers created by one case and consumed by another
#[derive(Debug, Clone, Default)]
pub struct CarriedReferences {
    ids: HashMap<EntityRole, String>,
}

impl CarriedReferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the identifier for a role, replacing any previous one
    pub fn store(&mut self, role: EntityRole, id: impl Into<String>) {
        self.ids.insert(role, id.into());
    }

    pub fn get(&self, role: EntityRole) -> Option<&str> {
        self.ids.get(&role).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Render a JSON id as a plain string; servers differ on string vs number ids
pub fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
