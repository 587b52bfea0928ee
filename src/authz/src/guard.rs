//! Request guard: identity resolution followed by a permission check
//!
//! Keeps "who is calling" failures ([`AuthzError::Unauthenticated`]) apart from
//! "caller may not do this" failures ([`AuthzError::Forbidden`]) so hosts can
//! send the first to a login flow and the second to an access-denied page.

use crate::error::{AuthzError, Result};
use crate::index::PermissionIndex;
use crate::provider::PermissionsProvider;
use crate::types::Identity;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Extracts the authenticated identity from a host request
#[async_trait]
pub trait IdentityResolver<Req: ?Sized + Sync>: Send + Sync {
    /// Resolve the caller; fail with [`AuthzError::Unauthenticated`] when there is none
    async fn resolve(&self, req: &Req) -> Result<Identity>;
}

/// Result of a successful check
#[derive(Debug, Clone)]
pub struct AccessGrant {
    /// Key the permissions were resolved for (email, else id)
    pub subject: String,

    /// Caller id
    pub user_id: String,

    /// Full permission index of the caller
    pub permissions: PermissionIndex,
}

/// Resolve the caller of `req` and require `action` on `resource`
#[instrument(skip(resolver, provider, req))]
pub async fn check_permission<Req, R, P>(
    resolver: &R,
    provider: &P,
    req: &Req,
    action: &str,
    resource: &str,
) -> Result<AccessGrant>
where
    Req: ?Sized + Sync,
    R: IdentityResolver<Req> + ?Sized,
    P: PermissionsProvider + ?Sized,
{
    let identity = resolver.resolve(req).await?;

    let subject = identity.subject();
    if subject.is_empty() {
        return Err(AuthzError::Unauthenticated("empty identity".to_string()));
    }

    let permissions = provider.get_permissions_by_identity(subject).await?;
    if !permissions.is_allowed(action, resource) {
        debug!(subject, "Permission denied");
        return Err(AuthzError::forbidden(action, resource));
    }

    Ok(AccessGrant {
        subject: subject.to_string(),
        user_id: identity.id.clone(),
        permissions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PermissionGrant;

    /// Identity carried directly as an optional header value
    struct HeaderResolver;

    #[async_trait]
    impl IdentityResolver<Option<String>> for HeaderResolver {
        async fn resolve(&self, req: &Option<String>) -> Result<Identity> {
            req.as_ref()
                .map(|email| Identity::new("u1").with_email(email.clone()))
                .ok_or_else(|| AuthzError::Unauthenticated("missing header".to_string()))
        }
    }

    struct FixedProvider;

    #[async_trait]
    impl PermissionsProvider for FixedProvider {
        async fn get_permissions_by_identity(&self, identity: &str) -> Result<PermissionIndex> {
            if identity == "ana@gov.br" {
                Ok(PermissionIndex::from_grants(vec![PermissionGrant::allow("Exibir", "Relatorios")]))
            } else {
                Ok(PermissionIndex::empty())
            }
        }

        fn invalidate(&self, _identity: Option<&str>) {}
    }

    #[tokio::test]
    async fn test_allowed() {
        let req = Some("ana@gov.br".to_string());
        let grant = check_permission(&HeaderResolver, &FixedProvider, &req, "Exibir", "Relatorios")
            .await
            .unwrap();
        assert_eq!(grant.subject, "ana@gov.br");
        assert_eq!(grant.user_id, "u1");
    }

    #[tokio::test]
    async fn test_unauthenticated() {
        let err = check_permission(&HeaderResolver, &FixedProvider, &None::<String>, "Exibir", "Relatorios")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_empty_subject_is_unauthenticated() {
        let req = Some(String::new());
        let err = check_permission(&HeaderResolver, &FixedProvider, &req, "Exibir", "Relatorios")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Unauthenticated(_)));
    }

    #[tokio::test]
    async fn test_forbidden() {
        let req = Some("bob@gov.br".to_string());
        let err = check_permission(&HeaderResolver, &FixedProvider, &req, "Exibir", "Relatorios")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthzError::Forbidden { .. }));
        assert_eq!(err.status_code(), 403);
    }
}
