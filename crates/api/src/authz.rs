//! API-side authorization guard for commands.
//!
//! Runs at the command boundary (before dispatch); domain aggregates and infra
//! stay auth-agnostic.

use templeerp_auth::{AuthzError, Permission, authorize};

use crate::context::{PrincipalContext, TenantContext};

/// Check that the request principal holds `permission` in its tenant.
pub fn authorize_command(
    tenant: &TenantContext,
    principal: &PrincipalContext,
    permission: &'static str,
) -> Result<(), AuthzError> {
    authorize(&principal.resolve(tenant), &Permission::new(permission))
}

#[cfg(test)]
mod tests {
    use templeerp_auth::{PrincipalId, Role};
    use templeerp_core::TenantId;

    use super::*;

    fn ctx(role: &'static str) -> (TenantContext, PrincipalContext) {
        (
            TenantContext::new(TenantId::new()),
            PrincipalContext::new(PrincipalId::new(), vec![Role::new(role)]),
        )
    }

    #[test]
    fn accountant_posts_entries_but_cannot_move_stock() {
        let (tenant, principal) = ctx(Role::ACCOUNTANT);
        assert!(authorize_command(&tenant, &principal, "accounting.entries.post").is_ok());
        assert!(matches!(
            authorize_command(&tenant, &principal, "inventory.stock.receive"),
            Err(AuthzError::Forbidden(_))
        ));
    }

    #[test]
    fn unknown_role_is_forbidden_everything() {
        let (tenant, principal) = ctx("viewer");
        assert!(authorize_command(&tenant, &principal, "temple.bookings.create").is_err());
    }
}
