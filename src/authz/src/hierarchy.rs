//! Role hierarchy resolution
//!
//! Walks the inheritance DAG breadth-first, following child -> parent edges,
//! and returns every active role reachable from a starting role.
//!
//! - Missing or inactive start role: empty closure (not an error)
//! - Inactive parent: skipped, and its own ancestors become unreachable
//!   through that branch
//! - Cycles and diamonds: absorbed by a visited set keyed by role id
//!
//! Each BFS level costs one storage round trip, so the total cost is
//! O(V + E) over the roles and edges touched.

use crate::error::Result;
use crate::storage::RoleStore;
use crate::types::RoleId;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Resolves the inherited-role closure of a role
pub struct RoleHierarchyResolver<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for RoleHierarchyResolver<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: RoleStore + ?Sized> RoleHierarchyResolver<S> {
    /// Create a resolver over a role store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Names of `start_role` and all of its active ancestors
    ///
    /// # Example
    ///
    /// ```rust
    /// use rbac_authz::storage::InMemoryRoleStore;
    /// use rbac_authz::{Role, RoleHierarchyResolver};
    /// use std::sync::Arc;
    ///
    /// # async fn example() -> rbac_authz::Result<()> {
    /// let store = Arc::new(InMemoryRoleStore::new());
    /// store.insert_role(Role::new(1, "Admin")).await;
    /// store.insert_role(Role::new(2, "Supervisor")).await;
    /// store.insert_edge(2, 1).await;
    ///
    /// let closure = RoleHierarchyResolver::new(store).resolve_closure("Supervisor").await?;
    /// assert!(closure.contains("Admin"));
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self))]
    pub async fn resolve_closure(&self, start_role: &str) -> Result<BTreeSet<String>> {
        let base = match self.store.find_role_by_name(start_role).await? {
            Some(role) if role.active => role,
            Some(_) => {
                debug!("Start role is inactive, closure is empty");
                return Ok(BTreeSet::new());
            }
            None => {
                debug!("Start role not found, closure is empty");
                return Ok(BTreeSet::new());
            }
        };

        let mut result = BTreeSet::from([base.name.clone()]);
        let mut visited: HashSet<RoleId> = HashSet::from([base.id]);
        let mut frontier: Vec<RoleId> = vec![base.id];
        let mut depth = 0usize;

        while !frontier.is_empty() {
            let edges = self.store.find_inheritance_edges(&frontier).await?;
            trace!(depth, frontier = frontier.len(), edges = edges.len(), "Expanding hierarchy level");

            let mut next = Vec::new();
            for edge in edges {
                if !edge.parent.active {
                    trace!(parent = %edge.parent.name, "Skipping inactive parent");
                    continue;
                }
                // Cycle and diamond guard
                if !visited.insert(edge.parent_id) {
                    continue;
                }

                result.insert(edge.parent.name);
                next.push(edge.parent_id);
            }

            frontier = next;
            depth += 1;
        }

        debug!(roles = result.len(), depth, "Resolved role closure");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryRoleStore;
    use crate::types::Role;

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_role_without_parents_is_its_own_closure() {
        let store = Arc::new(InMemoryRoleStore::new());
        store.insert_role(Role::new(1, "Solo")).await;

        let closure = RoleHierarchyResolver::new(store).resolve_closure("Solo").await.unwrap();
        assert_eq!(closure, names(&["Solo"]));
    }

    #[tokio::test]
    async fn test_missing_role_resolves_empty() {
        let store = Arc::new(InMemoryRoleStore::new());
        let closure = RoleHierarchyResolver::new(store).resolve_closure("Ghost").await.unwrap();
        assert!(closure.is_empty());
    }

    #[tokio::test]
    async fn test_inactive_start_role_resolves_empty() {
        let store = Arc::new(InMemoryRoleStore::new());
        store.insert_role(Role::inactive(1, "Inativo")).await;
        store.insert_role(Role::new(2, "Admin")).await;
        store.insert_edge(1, 2).await;

        let closure = RoleHierarchyResolver::new(store).resolve_closure("Inativo").await.unwrap();
        assert!(closure.is_empty());
    }

    #[tokio::test]
    async fn test_chain_and_diamond() {
        // Analista -> {Supervisor, Auditor} -> Admin
        let store = Arc::new(InMemoryRoleStore::new());
        store.insert_role(Role::new(1, "Admin")).await;
        store.insert_role(Role::new(2, "Supervisor")).await;
        store.insert_role(Role::new(3, "Auditor")).await;
        store.insert_role(Role::new(4, "Analista")).await;
        store.insert_edge(4, 2).await;
        store.insert_edge(4, 3).await;
        store.insert_edge(2, 1).await;
        store.insert_edge(3, 1).await;

        let closure = RoleHierarchyResolver::new(store).resolve_closure("Analista").await.unwrap();
        assert_eq!(closure, names(&["Admin", "Analista", "Auditor", "Supervisor"]));
    }

    #[tokio::test]
    async fn test_cycles_terminate() {
        let store = Arc::new(InMemoryRoleStore::new());
        store.insert_role(Role::new(1, "A")).await;
        store.insert_role(Role::new(2, "B")).await;
        store.insert_edge(1, 2).await;
        store.insert_edge(2, 1).await;
        store.insert_edge(1, 1).await;

        let resolver = RoleHierarchyResolver::new(store);
        assert_eq!(resolver.resolve_closure("A").await.unwrap(), names(&["A", "B"]));
        assert_eq!(resolver.resolve_closure("B").await.unwrap(), names(&["A", "B"]));
    }

    #[tokio::test]
    async fn test_inactive_parent_truncates_branch() {
        // Child -> Middle (inactive) -> Top
        let store = Arc::new(InMemoryRoleStore::new());
        store.insert_role(Role::new(1, "Top")).await;
        store.insert_role(Role::inactive(2, "Middle")).await;
        store.insert_role(Role::new(3, "Child")).await;
        store.insert_edge(3, 2).await;
        store.insert_edge(2, 1).await;

        let closure = RoleHierarchyResolver::new(store).resolve_closure("Child").await.unwrap();
        assert_eq!(closure, names(&["Child"]));
    }
}
