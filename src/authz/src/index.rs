//! Two-level permission index for O(1) decision queries
//!
//! Structure: `action -> resource -> allowed`. Built once from a grant list and
//! read-only afterwards. Any path missing from the index means "not allowed".
//!
//! # Example
//!
//! ```rust
//! use rbac_authz::{PermissionGrant, PermissionIndex};
//!
//! let index = PermissionIndex::from_grants(vec![
//!     PermissionGrant::allow("Exibir", "Relatorios"),
//!     PermissionGrant::deny("Editar", "Relatorios"),
//! ]);
//!
//! assert!(index.is_allowed("Exibir", "Relatorios"));
//! assert!(!index.is_allowed("Editar", "Relatorios"));
//! assert!(!index.is_allowed("Excluir", "Relatorios"));
//! ```

use crate::types::PermissionGrant;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Keys that must never become index keys, whatever the data source says
pub const RESERVED_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

fn is_safe_key(key: &str) -> bool {
    !RESERVED_KEYS.contains(&key)
}

type NestedMap = HashMap<String, HashMap<String, bool>>;

/// Read-only permission lookup structure
///
/// Serializes as the nested `{action: {resource: allowed}}` map. Deserializing
/// goes through [`PermissionIndex::from_grants`], so reserved keys are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "NestedMap", into = "NestedMap")]
pub struct PermissionIndex {
    entries: HashMap<String, HashMap<String, bool>>,
}

impl PermissionIndex {
    /// Empty index: denies everything
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build an index from a grant list
    ///
    /// Grants whose action or resource is a reserved key are skipped. A later
    /// grant for the same (action, resource) pair overwrites an earlier one, so
    /// callers feeding raw, unmerged rows get fetch-order dependent results;
    /// use [`crate::EffectivePermissionResolver`] to merge first.
    pub fn from_grants<I>(grants: I) -> Self
    where
        I: IntoIterator<Item = PermissionGrant>,
    {
        let mut entries: HashMap<String, HashMap<String, bool>> = HashMap::new();

        for grant in grants {
            if !is_safe_key(&grant.action) || !is_safe_key(&grant.resource) {
                warn!(
                    action = %grant.action,
                    resource = %grant.resource,
                    "Skipping grant with reserved key"
                );
                continue;
            }

            entries
                .entry(grant.action)
                .or_default()
                .insert(grant.resource, grant.allowed);
        }

        Self { entries }
    }

    /// True iff `action` on `resource` is present and allowed
    pub fn is_allowed(&self, action: &str, resource: &str) -> bool {
        self.entries
            .get(action)
            .and_then(|resources| resources.get(resource))
            .copied()
            .unwrap_or(false)
    }

    /// True iff at least one pair is allowed; stops at the first hit.
    /// An empty pair list yields `false`.
    pub fn has_any<A, R>(&self, pairs: &[(A, R)]) -> bool
    where
        A: AsRef<str>,
        R: AsRef<str>,
    {
        pairs
            .iter()
            .any(|(action, resource)| self.is_allowed(action.as_ref(), resource.as_ref()))
    }

    /// True iff every pair is allowed. An empty pair list yields `true`.
    pub fn has_all<A, R>(&self, pairs: &[(A, R)]) -> bool
    where
        A: AsRef<str>,
        R: AsRef<str>,
    {
        pairs
            .iter()
            .all(|(action, resource)| self.is_allowed(action.as_ref(), resource.as_ref()))
    }

    /// Number of (action, resource) entries, allowed or not
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    /// Whether the index holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries for one action
    pub fn resources(&self, action: &str) -> Option<&HashMap<String, bool>> {
        self.entries.get(action)
    }

    /// Flatten back to grant records, ordered by action then resource
    pub fn to_grants(&self) -> Vec<PermissionGrant> {
        let mut grants: Vec<PermissionGrant> = self
            .entries
            .iter()
            .flat_map(|(action, resources)| {
                resources
                    .iter()
                    .map(move |(resource, allowed)| PermissionGrant::new(action, resource, *allowed))
            })
            .collect();

        grants.sort_by(|a, b| (&a.action, &a.resource).cmp(&(&b.action, &b.resource)));
        grants
    }

    /// Legacy flat format keyed by `"Action_Resource"`
    #[deprecated(note = "use is_allowed on the nested index instead")]
    pub fn flat_keys(&self) -> BTreeMap<String, bool> {
        self.entries
            .iter()
            .flat_map(|(action, resources)| {
                resources
                    .iter()
                    .map(move |(resource, allowed)| (format!("{}_{}", action, resource), *allowed))
            })
            .collect()
    }
}

impl From<NestedMap> for PermissionIndex {
    fn from(map: NestedMap) -> Self {
        Self::from_grants(map.into_iter().flat_map(|(action, resources)| {
            resources
                .into_iter()
                .map(move |(resource, allowed)| PermissionGrant::new(action.clone(), resource, allowed))
        }))
    }
}

impl From<PermissionIndex> for NestedMap {
    fn from(index: PermissionIndex) -> Self {
        index.entries
    }
}

impl FromIterator<PermissionGrant> for PermissionIndex {
    fn from_iter<T: IntoIterator<Item = PermissionGrant>>(iter: T) -> Self {
        Self::from_grants(iter)
    }
}
