use thiserror::Error;

use templeerp_core::TenantId;

use crate::{Permission, PrincipalId, Role, TenantMembership};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub principal_id: PrincipalId,
    pub active_tenant_id: TenantId,
    pub membership: TenantMembership,
}

impl Principal {
    /// Resolve a principal acting in `tenant_id` with the given roles.
    pub fn from_roles(principal_id: PrincipalId, tenant_id: TenantId, roles: Vec<Role>) -> Self {
        Self {
            principal_id,
            active_tenant_id: tenant_id,
            membership: TenantMembership::from_roles(tenant_id, roles),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("tenant mismatch")]
    TenantMismatch,

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Does `granted` cover `required`?
///
/// `"*"` covers everything; `"accounting.*"` covers `"accounting.entries.post"`
/// but not `"accounting"` itself or `"accountingx.read"`.
pub fn permission_matches(granted: &Permission, required: &Permission) -> bool {
    if granted.is_wildcard() || granted.as_str() == required.as_str() {
        return true;
    }
    match granted.wildcard_prefix() {
        Some(prefix) => required
            .as_str()
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.') && rest.len() > 1),
        None => false,
    }
}

/// Authorize a principal within its active tenant context.
///
/// Pure policy check: no IO, no panics.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.active_tenant_id != principal.membership.tenant_id {
        return Err(AuthzError::TenantMismatch);
    }

    if principal
        .membership
        .permissions
        .iter()
        .any(|granted| permission_matches(granted, required))
    {
        Ok(())
    } else {
        tracing::debug!(
            principal_id = %principal.principal_id,
            tenant_id = %principal.active_tenant_id,
            permission = required.as_str(),
            "permission denied"
        );
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(roles: &[&'static str]) -> Principal {
        Principal::from_roles(
            PrincipalId::new(),
            TenantId::new(),
            roles.iter().map(|r| Role::new(*r)).collect(),
        )
    }

    #[test]
    fn admin_may_do_anything() {
        let p = principal(&["admin"]);
        assert!(authorize(&p, &Permission::new("accounting.years.close")).is_ok());
        assert!(authorize(&p, &Permission::new("temple.bookings.create")).is_ok());
    }

    #[test]
    fn accountant_is_limited_to_accounting() {
        let p = principal(&["accountant"]);
        assert!(authorize(&p, &Permission::new("accounting.entries.post")).is_ok());
        assert_eq!(
            authorize(&p, &Permission::new("inventory.stock.receive")),
            Err(AuthzError::Forbidden("inventory.stock.receive".to_string()))
        );
    }

    #[test]
    fn roles_combine() {
        let p = principal(&["accountant", "temple_staff"]);
        assert!(authorize(&p, &Permission::new("accounting.ledgers.create")).is_ok());
        assert!(authorize(&p, &Permission::new("sales.orders.confirm")).is_ok());
        assert!(authorize(&p, &Permission::new("manufacturing.orders.start")).is_err());
    }

    #[test]
    fn prefix_wildcard_respects_segment_boundaries() {
        let grant = Permission::new("sales.*");
        assert!(permission_matches(&grant, &Permission::new("sales.orders.create")));
        assert!(!permission_matches(&grant, &Permission::new("sales")));
        assert!(!permission_matches(&grant, &Permission::new("salesx.orders")));
        assert!(!permission_matches(&grant, &Permission::new("sales.")));
    }

    #[test]
    fn tenant_mismatch_is_rejected_before_permissions() {
        let mut p = principal(&["admin"]);
        p.active_tenant_id = TenantId::new();
        assert_eq!(
            authorize(&p, &Permission::new("products.create")),
            Err(AuthzError::TenantMismatch)
        );
    }
}
