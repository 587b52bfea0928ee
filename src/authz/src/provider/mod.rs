//! Permissions provider contract and the storage-backed implementation
//!
//! [`PermissionsProvider`] is the seam consumed by route protection and UI
//! code. Implementations are interchangeable and compose by wrapping:
//!
//! ```text
//! TtlCache ──▶ StoragePermissionsProvider ──▶ RoleStore
//!                 │
//!                 ├─ find_user(identity)
//!                 ├─ RoleHierarchyResolver
//!                 ├─ EffectivePermissionResolver
//!                 └─ PermissionIndex
//! ```

pub mod cache;

pub use cache::{CacheStats, TtlCache};

use crate::effective::EffectivePermissionResolver;
use crate::error::Result;
use crate::index::PermissionIndex;
use crate::storage::RoleStore;
use crate::types::IdentityField;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Decision-service contract
#[async_trait]
pub trait PermissionsProvider: Send + Sync {
    /// Resolve the permission index for a caller identity (email or id)
    async fn get_permissions_by_identity(&self, identity: &str) -> Result<PermissionIndex>;

    /// Drop cached state for one identity, or for all when `None`
    fn invalidate(&self, identity: Option<&str>);
}

#[async_trait]
impl<P: PermissionsProvider + ?Sized> PermissionsProvider for Arc<P> {
    async fn get_permissions_by_identity(&self, identity: &str) -> Result<PermissionIndex> {
        (**self).get_permissions_by_identity(identity).await
    }

    fn invalidate(&self, identity: Option<&str>) {
        (**self).invalidate(identity)
    }
}

/// Stateless provider resolving straight from a role store
pub struct StoragePermissionsProvider<S: ?Sized> {
    store: Arc<S>,
    resolver: EffectivePermissionResolver<S>,
    identity_field: IdentityField,
}

impl<S: RoleStore + ?Sized> StoragePermissionsProvider<S> {
    /// Create a provider matching identities against user emails
    pub fn new(store: Arc<S>) -> Self {
        Self::with_identity_field(store, IdentityField::Email)
    }

    /// Create a provider matching identities against the given user field
    pub fn with_identity_field(store: Arc<S>, identity_field: IdentityField) -> Self {
        Self {
            resolver: EffectivePermissionResolver::new(Arc::clone(&store)),
            store,
            identity_field,
        }
    }

    /// Field identities are matched against
    pub fn identity_field(&self) -> IdentityField {
        self.identity_field
    }

    /// Underlying effective permission resolver
    pub fn resolver(&self) -> &EffectivePermissionResolver<S> {
        &self.resolver
    }
}

#[async_trait]
impl<S: RoleStore + ?Sized> PermissionsProvider for StoragePermissionsProvider<S> {
    #[instrument(skip(self))]
    async fn get_permissions_by_identity(&self, identity: &str) -> Result<PermissionIndex> {
        let user = self.store.find_user(self.identity_field, identity).await?;

        let role = match user.and_then(|u| u.role) {
            Some(role) if role.active => role,
            _ => {
                debug!(field = %self.identity_field, "No user or no active role, resolving to empty permissions");
                return Ok(PermissionIndex::empty());
            }
        };

        self.resolver.resolve_index(&role.name).await
    }

    fn invalidate(&self, _identity: Option<&str>) {
        // Stateless: caching lives in decorators such as TtlCache
    }
}
