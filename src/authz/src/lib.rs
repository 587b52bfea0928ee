//! # RBAC Permission Resolution Engine
//!
//! Resolves effective access-control decisions for a role-based model with
//! role inheritance.
//!
//! ## Features
//!
//! - **Hierarchy closure**: breadth-first walk of the role DAG, cycle-safe
//! - **Grant-wins-over-deny** merging across every inherited role
//! - **O(1) decisions** through a two-level [`PermissionIndex`]
//! - **Pluggable providers** behind the [`PermissionsProvider`] trait
//! - **Per-identity TTL caching** via the [`TtlCache`] decorator
//! - **PostgreSQL store** (feature `postgres`) and an in-memory store
//!
//! ## Example
//!
//! ```rust
//! use rbac_authz::storage::InMemoryRoleStore;
//! use rbac_authz::{PermissionsProvider, Role, RoleGrant, StoragePermissionsProvider, TtlCache};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryRoleStore::new());
//!     store.insert_role(Role::new(1, "Admin")).await;
//!     store.insert_role(Role::new(2, "Analista")).await;
//!     store.insert_edge(2, 1).await;
//!     store.insert_grant(RoleGrant::new("Admin", "Excluir", "Usuarios", true)).await;
//!     store.insert_user("u1", Some("ana@gov.br"), Some(2)).await;
//!
//!     let provider = TtlCache::new(
//!         StoragePermissionsProvider::new(store),
//!         Duration::from_secs(300),
//!     );
//!
//!     let perms = provider.get_permissions_by_identity("ana@gov.br").await?;
//!     assert!(perms.is_allowed("Excluir", "Usuarios"));
//!
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod error;
pub mod index;
pub mod storage;
pub mod hierarchy;
pub mod effective;
pub mod provider;
pub mod guard;
pub mod config;

// Re-export commonly used types
pub use types::{
    Identity, IdentityField, InheritanceEdge, PermissionGrant, Role, RoleGrant, RoleId, UserRecord,
};
pub use error::{AuthzError, ConfigError, Result};
pub use index::PermissionIndex;
pub use storage::{InMemoryRoleStore, RoleStore, StorageError};
pub use hierarchy::RoleHierarchyResolver;
pub use effective::{merge_grants, EffectivePermissionResolver};
pub use provider::{CacheStats, PermissionsProvider, StoragePermissionsProvider, TtlCache};
pub use guard::{check_permission, AccessGrant, IdentityResolver};
pub use config::RbacConfig;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
