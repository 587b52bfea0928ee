//! Core RBAC data model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable role identifier
pub type RoleId = i64;

/// Role (perfil) - a named, independently activatable authorization unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    /// Stable identifier, used as the traversal visited-set key
    pub id: RoleId,

    /// Unique role name
    pub name: String,

    /// Inactive roles are invisible to resolution
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Role {
    /// Create an active role
    pub fn new(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
        }
    }

    /// Create an inactive role
    pub fn inactive(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            active: false,
            ..Self::new(id, name)
        }
    }
}

/// Inheritance edge as returned by the storage lookup
///
/// The child inherits every permission of `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InheritanceEdge {
    /// Parent role identifier
    pub parent_id: RoleId,

    /// Parent role record
    pub parent: Role,
}

/// A single action/resource/allowed assertion
///
/// This is also the wire record: serialized as `{action, resource, allowed}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionGrant {
    /// Action, opaque and case-sensitive (e.g. "Exibir")
    pub action: String,

    /// Resource, opaque and case-sensitive (e.g. "Relatorios")
    pub resource: String,

    /// Whether the action is allowed
    pub allowed: bool,
}

impl PermissionGrant {
    /// Create a new grant
    pub fn new(action: impl Into<String>, resource: impl Into<String>, allowed: bool) -> Self {
        Self {
            action: action.into(),
            resource: resource.into(),
            allowed,
        }
    }

    /// Allowing grant
    pub fn allow(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::new(action, resource, true)
    }

    /// Denying grant
    pub fn deny(action: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::new(action, resource, false)
    }
}

/// Grant row together with its owning role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    /// Owning role name
    pub role_name: String,

    /// Action
    pub action: String,

    /// Resource
    pub resource: String,

    /// Whether the action is allowed
    pub allowed: bool,
}

impl RoleGrant {
    /// Create a new role-owned grant
    pub fn new(
        role_name: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        allowed: bool,
    ) -> Self {
        Self {
            role_name: role_name.into(),
            action: action.into(),
            resource: resource.into(),
            allowed,
        }
    }
}

impl From<RoleGrant> for PermissionGrant {
    fn from(row: RoleGrant) -> Self {
        PermissionGrant {
            action: row.action,
            resource: row.resource,
            allowed: row.allowed,
        }
    }
}

/// User record with its associated role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User identifier
    pub id: String,

    /// User email
    #[serde(default)]
    pub email: Option<String>,

    /// Assigned role, if any
    #[serde(default)]
    pub role: Option<Role>,
}

/// Which user field an identity string is matched against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityField {
    /// Match on the user's email
    #[default]
    Email,
    /// Match on the user's id
    Id,
}

impl IdentityField {
    /// Column/field name
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityField::Email => "email",
            IdentityField::Id => "id",
        }
    }
}

impl fmt::Display for IdentityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(IdentityField::Email),
            "id" => Ok(IdentityField::Id),
            other => Err(format!("unknown identity field '{}'", other)),
        }
    }
}

/// Authenticated caller identity extracted from a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Unique user id
    pub id: String,

    /// User email (optional, but recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Identity {
    /// Create an identity from an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
        }
    }

    /// Attach an email
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Key handed to a permissions provider: email when present, else id
    pub fn subject(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.id)
    }
}
