//! Read-only storage collaborator
//!
//! The resolution engine only ever reads roles, inheritance edges, grants and
//! users through [`RoleStore`]. Every call is a suspension point; errors are
//! passed up unchanged, with no retry at this layer.

use crate::types::{IdentityField, InheritanceEdge, Role, RoleGrant, RoleId, UserRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::{PostgresRoleStore, TableNames};

/// Storage-layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend query failed
    #[error("Database error: {0}")]
    Database(String),

    /// Backend could not be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Row or snapshot could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage collaborator contract
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Look up a role by its unique name
    async fn find_role_by_name(&self, name: &str) -> StorageResult<Option<Role>>;

    /// Look up a user (with its role) by email or id
    async fn find_user(&self, field: IdentityField, value: &str) -> StorageResult<Option<UserRecord>>;

    /// All inheritance edges whose child is one of `child_ids`
    async fn find_inheritance_edges(&self, child_ids: &[RoleId]) -> StorageResult<Vec<InheritanceEdge>>;

    /// All grants owned by an active role named in `role_names`
    async fn find_grants(&self, role_names: &BTreeSet<String>) -> StorageResult<Vec<RoleGrant>>;
}

#[async_trait]
impl<S: RoleStore + ?Sized> RoleStore for Arc<S> {
    async fn find_role_by_name(&self, name: &str) -> StorageResult<Option<Role>> {
        (**self).find_role_by_name(name).await
    }

    async fn find_user(&self, field: IdentityField, value: &str) -> StorageResult<Option<UserRecord>> {
        (**self).find_user(field, value).await
    }

    async fn find_inheritance_edges(&self, child_ids: &[RoleId]) -> StorageResult<Vec<InheritanceEdge>> {
        (**self).find_inheritance_edges(child_ids).await
    }

    async fn find_grants(&self, role_names: &BTreeSet<String>) -> StorageResult<Vec<RoleGrant>> {
        (**self).find_grants(role_names).await
    }
}

/// Serializable dump of an RBAC dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RbacSnapshot {
    /// Role definitions
    #[serde(default)]
    pub roles: Vec<Role>,

    /// Inheritance edges, by role name
    #[serde(default)]
    pub inheritance: Vec<SnapshotEdge>,

    /// Grants, by owning role name
    #[serde(default)]
    pub grants: Vec<RoleGrant>,

    /// Users, by role name
    #[serde(default)]
    pub users: Vec<SnapshotUser>,
}

/// Snapshot inheritance edge (`child` inherits `parent`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEdge {
    /// Child role name
    pub child: String,
    /// Parent role name
    pub parent: String,
}

/// Snapshot user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotUser {
    /// User id
    pub id: String,
    /// User email
    #[serde(default)]
    pub email: Option<String>,
    /// Assigned role name
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Default)]
struct Dataset {
    roles: HashMap<RoleId, Role>,
    names: HashMap<String, RoleId>,
    /// child id -> parent ids
    parents: HashMap<RoleId, Vec<RoleId>>,
    grants: Vec<RoleGrant>,
    /// user id -> (email, role id)
    users: HashMap<String, (Option<String>, Option<RoleId>)>,
}

/// In-memory role store for tests, demos and fixture-backed deployments
pub struct InMemoryRoleStore {
    data: Arc<RwLock<Dataset>>,
}

impl InMemoryRoleStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(Dataset::default())),
        }
    }

    /// Build a store from a snapshot
    ///
    /// Role ids referenced by name must exist in `snapshot.roles`.
    pub async fn from_snapshot(snapshot: RbacSnapshot) -> StorageResult<Self> {
        let store = Self::new();

        for role in snapshot.roles {
            store.insert_role(role).await;
        }
        for edge in snapshot.inheritance {
            let child = store.role_id(&edge.child).await?;
            let parent = store.role_id(&edge.parent).await?;
            store.insert_edge(child, parent).await;
        }
        for grant in snapshot.grants {
            store.insert_grant(grant).await;
        }
        for user in snapshot.users {
            let role_id = match &user.role {
                Some(name) => Some(store.role_id(name).await?),
                None => None,
            };
            let mut data = store.data.write().await;
            data.users.insert(user.id, (user.email, role_id));
        }

        Ok(store)
    }

    /// Load a JSON snapshot from disk
    pub async fn from_json_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| StorageError::Unavailable(format!("Failed to read fixture: {}", e)))?;

        let snapshot: RbacSnapshot = serde_json::from_str(&raw)
            .map_err(|e| StorageError::Decode(format!("Failed to parse fixture: {}", e)))?;

        Self::from_snapshot(snapshot).await
    }

    async fn role_id(&self, name: &str) -> StorageResult<RoleId> {
        let data = self.data.read().await;
        data.names
            .get(name)
            .copied()
            .ok_or_else(|| StorageError::Decode(format!("Unknown role '{}'", name)))
    }

    /// Insert or replace a role
    ///
    /// Replacing keeps names unique: a renamed id drops its old name, and a
    /// name moved to a new id drops the role previously holding it.
    pub async fn insert_role(&self, role: Role) {
        let mut data = self.data.write().await;

        let old_name = data
            .roles
            .get(&role.id)
            .filter(|previous| previous.name != role.name)
            .map(|previous| previous.name.clone());
        if let Some(old_name) = old_name {
            data.names.remove(&old_name);
        }

        let old_id = data.names.get(&role.name).copied().filter(|id| *id != role.id);
        if let Some(old_id) = old_id {
            data.roles.remove(&old_id);
        }

        data.names.insert(role.name.clone(), role.id);
        data.roles.insert(role.id, role);
    }

    /// Record that `child` inherits from `parent`
    pub async fn insert_edge(&self, child: RoleId, parent: RoleId) {
        let mut data = self.data.write().await;
        data.parents.entry(child).or_default().push(parent);
    }

    /// Add a grant owned by a role
    pub async fn insert_grant(&self, grant: RoleGrant) {
        let mut data = self.data.write().await;
        data.grants.push(grant);
    }

    /// Add a user, optionally assigned to a role
    pub async fn insert_user(&self, id: impl Into<String>, email: Option<&str>, role: Option<RoleId>) {
        let mut data = self.data.write().await;
        data.users
            .insert(id.into(), (email.map(str::to_string), role));
    }
}

impl Default for InMemoryRoleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn find_role_by_name(&self, name: &str) -> StorageResult<Option<Role>> {
        let data = self.data.read().await;
        Ok(data
            .names
            .get(name)
            .and_then(|id| data.roles.get(id))
            .cloned())
    }

    async fn find_user(&self, field: IdentityField, value: &str) -> StorageResult<Option<UserRecord>> {
        let data = self.data.read().await;

        let found = data.users.iter().find(|(id, (email, _))| match field {
            IdentityField::Email => email.as_deref() == Some(value),
            IdentityField::Id => id.as_str() == value,
        });

        Ok(found.map(|(id, (email, role_id))| UserRecord {
            id: id.clone(),
            email: email.clone(),
            role: (*role_id).and_then(|rid| data.roles.get(&rid).cloned()),
        }))
    }

    async fn find_inheritance_edges(&self, child_ids: &[RoleId]) -> StorageResult<Vec<InheritanceEdge>> {
        let data = self.data.read().await;

        let edges = child_ids
            .iter()
            .filter_map(|child| data.parents.get(child))
            .flatten()
            .filter_map(|parent_id| {
                data.roles.get(parent_id).map(|parent| InheritanceEdge {
                    parent_id: *parent_id,
                    parent: parent.clone(),
                })
            })
            .collect();

        Ok(edges)
    }

    async fn find_grants(&self, role_names: &BTreeSet<String>) -> StorageResult<Vec<RoleGrant>> {
        let data = self.data.read().await;

        let active: HashSet<&str> = data
            .roles
            .values()
            .filter(|role| role.active && role_names.contains(&role.name))
            .map(|role| role.name.as_str())
            .collect();

        Ok(data
            .grants
            .iter()
            .filter(|grant| active.contains(grant.role_name.as_str()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> InMemoryRoleStore {
        let store = InMemoryRoleStore::new();
        store.insert_role(Role::new(1, "Admin")).await;
        store.insert_role(Role::new(2, "Supervisor")).await;
        store.insert_role(Role::inactive(3, "Inativo")).await;
        store.insert_edge(2, 1).await;
        store.insert_edge(2, 3).await;
        store.insert_grant(RoleGrant::new("Admin", "Excluir", "Usuarios", true)).await;
        store.insert_grant(RoleGrant::new("Inativo", "Exibir", "Usuarios", true)).await;
        store.insert_user("u1", Some("ana@gov.br"), Some(2)).await;
        store.insert_user("u2", None, None).await;
        store
    }

    #[tokio::test]
    async fn test_find_role_by_name() {
        let store = seeded().await;
        assert_eq!(store.find_role_by_name("Admin").await.unwrap(), Some(Role::new(1, "Admin")));
        assert!(store.find_role_by_name("admin").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_user_by_field() {
        let store = seeded().await;

        let by_email = store.find_user(IdentityField::Email, "ana@gov.br").await.unwrap().unwrap();
        assert_eq!(by_email.id, "u1");
        assert_eq!(by_email.role.unwrap().name, "Supervisor");

        let by_id = store.find_user(IdentityField::Id, "u2").await.unwrap().unwrap();
        assert!(by_id.role.is_none());

        assert!(store.find_user(IdentityField::Id, "ana@gov.br").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_edges_include_inactive_parents() {
        let store = seeded().await;
        let edges = store.find_inheritance_edges(&[2]).await.unwrap();
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().any(|e| e.parent_id == 3 && !e.parent.active));
    }

    #[tokio::test]
    async fn test_grants_filtered_to_active_roles() {
        let store = seeded().await;
        let names: BTreeSet<String> = ["Admin", "Inativo"].iter().map(|s| s.to_string()).collect();
        let grants = store.find_grants(&names).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].role_name, "Admin");
    }

    #[tokio::test]
    async fn test_snapshot_loading() {
        let snapshot: RbacSnapshot = serde_json::from_value(serde_json::json!({
            "roles": [
                {"id": 1, "name": "Admin"},
                {"id": 2, "name": "Analista", "active": true}
            ],
            "inheritance": [{"child": "Analista", "parent": "Admin"}],
            "grants": [
                {"role_name": "Admin", "action": "Excluir", "resource": "Usuarios", "allowed": true}
            ],
            "users": [{"id": "u1", "email": "ana@gov.br", "role": "Analista"}]
        }))
        .unwrap();

        let store = InMemoryRoleStore::from_snapshot(snapshot).await.unwrap();
        let edges = store.find_inheritance_edges(&[2]).await.unwrap();
        assert_eq!(edges[0].parent.name, "Admin");
    }

    #[tokio::test]
    async fn test_snapshot_with_unknown_role_fails() {
        let snapshot = RbacSnapshot {
            inheritance: vec![SnapshotEdge {
                child: "Ghost".into(),
                parent: "Admin".into(),
            }],
            ..Default::default()
        };

        let err = InMemoryRoleStore::from_snapshot(snapshot).await.err().unwrap();
        assert!(matches!(err, StorageError::Decode(_)));
    }

    #[tokio::test]
    async fn test_replacing_role_keeps_names_unique() {
        let store = seeded().await;

        // Same id, new name: the old name no longer resolves
        store.insert_role(Role::new(1, "Administrador")).await;
        assert!(store.find_role_by_name("Admin").await.unwrap().is_none());
        assert_eq!(
            store.find_role_by_name("Administrador").await.unwrap(),
            Some(Role::new(1, "Administrador"))
        );

        // Same name, new id: edges to the old id stop reaching it
        store.insert_role(Role::new(9, "Administrador")).await;
        assert_eq!(store.find_role_by_name("Administrador").await.unwrap().unwrap().id, 9);
        let edges = store.find_inheritance_edges(&[2]).await.unwrap();
        assert!(edges.iter().all(|e| e.parent_id != 1));
    }

    #[tokio::test]
    async fn test_json_file_loading() {
        let path = std::env::temp_dir().join(format!("rbac-fixture-{}.json", std::process::id()));
        let raw = r#"{"roles": [{"id": 1, "name": "Admin"}], "users": [{"id": "u1", "role": "Admin"}]}"#;
        tokio::fs::write(&path, raw).await.unwrap();

        let store = InMemoryRoleStore::from_json_file(&path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;

        let user = store.find_user(IdentityField::Id, "u1").await.unwrap().unwrap();
        assert_eq!(user.role.unwrap().name, "Admin");
    }

    #[tokio::test]
    async fn test_json_file_missing_or_malformed() {
        let missing = std::env::temp_dir().join("rbac-fixture-does-not-exist.json");
        let err = InMemoryRoleStore::from_json_file(&missing).await.err().unwrap();
        assert!(matches!(err, StorageError::Unavailable(_)));

        let path = std::env::temp_dir().join(format!("rbac-fixture-bad-{}.json", std::process::id()));
        tokio::fs::write(&path, "{not json").await.unwrap();
        let err = InMemoryRoleStore::from_json_file(&path).await.err().unwrap();
        let _ = tokio::fs::remove_file(&path).await;
        assert!(matches!(err, StorageError::Decode(_)));
    }
}
