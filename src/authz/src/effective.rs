//! Effective permission resolution with grant-wins-over-deny merging

use crate::error::Result;
use crate::hierarchy::RoleHierarchyResolver;
use crate::index::PermissionIndex;
use crate::storage::RoleStore;
use crate::types::{PermissionGrant, RoleGrant};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Merge raw grant rows into one grant per (action, resource)
///
/// A stored grant is only overwritten by an incoming `allowed == true` row, so
/// the outcome is `true` whenever any contributing role allows the pair, and
/// independent of row order. Output is ordered by action, then resource.
pub fn merge_grants<I>(rows: I) -> Vec<PermissionGrant>
where
    I: IntoIterator<Item = RoleGrant>,
{
    let mut merged: BTreeMap<(String, String), bool> = BTreeMap::new();

    for row in rows {
        merged
            .entry((row.action, row.resource))
            .and_modify(|allowed| *allowed |= row.allowed)
            .or_insert(row.allowed);
    }

    merged
        .into_iter()
        .map(|((action, resource), allowed)| PermissionGrant {
            action,
            resource,
            allowed,
        })
        .collect()
}

/// Resolves the merged permission set of a role and all of its ancestors
pub struct EffectivePermissionResolver<S: ?Sized> {
    store: Arc<S>,
    hierarchy: RoleHierarchyResolver<S>,
}

impl<S: RoleStore + ?Sized> EffectivePermissionResolver<S> {
    /// Create a resolver over a role store
    pub fn new(store: Arc<S>) -> Self {
        Self {
            hierarchy: RoleHierarchyResolver::new(Arc::clone(&store)),
            store,
        }
    }

    /// Hierarchy resolver used for the closure step
    pub fn hierarchy(&self) -> &RoleHierarchyResolver<S> {
        &self.hierarchy
    }

    /// Effective grants of `start_role`
    ///
    /// The closure is fully resolved before any grant is read; grants are
    /// then fetched in one bulk call and merged with [`merge_grants`].
    #[instrument(skip(self))]
    pub async fn resolve_effective_permissions(&self, start_role: &str) -> Result<Vec<PermissionGrant>> {
        let closure = self.hierarchy.resolve_closure(start_role).await?;
        if closure.is_empty() {
            return Ok(Vec::new());
        }

        let rows = self.store.find_grants(&closure).await?;
        let fetched = rows.len();
        let merged = merge_grants(rows);

        debug!(roles = closure.len(), fetched, merged = merged.len(), "Resolved effective permissions");
        Ok(merged)
    }

    /// Effective permissions of `start_role` as a lookup index
    pub async fn resolve_index(&self, start_role: &str) -> Result<PermissionIndex> {
        let grants = self.resolve_effective_permissions(start_role).await?;
        Ok(PermissionIndex::from_grants(grants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_true_wins_in_either_order() {
        let deny_first = merge_grants(vec![
            RoleGrant::new("R1", "X", "Docs", false),
            RoleGrant::new("R2", "X", "Docs", true),
        ]);
        let allow_first = merge_grants(vec![
            RoleGrant::new("R2", "X", "Docs", true),
            RoleGrant::new("R1", "X", "Docs", false),
        ]);

        assert_eq!(deny_first, vec![PermissionGrant::allow("X", "Docs")]);
        assert_eq!(allow_first, deny_first);
    }

    #[test]
    fn test_all_false_stays_false() {
        let merged = merge_grants(vec![
            RoleGrant::new("R1", "X", "Docs", false),
            RoleGrant::new("R2", "X", "Docs", false),
        ]);
        assert_eq!(merged, vec![PermissionGrant::deny("X", "Docs")]);
    }

    #[test]
    fn test_distinct_pairs_are_kept_apart() {
        let merged = merge_grants(vec![
            RoleGrant::new("R1", "Criar", "Usuarios", true),
            RoleGrant::new("R1", "Criar", "Relatorios", false),
            RoleGrant::new("R2", "Exibir", "Usuarios", true),
        ]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], PermissionGrant::deny("Criar", "Relatorios"));
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_grants(Vec::new()).is_empty());
    }
}
