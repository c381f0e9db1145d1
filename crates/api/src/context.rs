//! Per-request identity installed by the auth middleware.

use templeerp_auth::{JwtClaims, Principal, PrincipalId, Role};
use templeerp_core::TenantId;

/// Temple the request acts within. Always taken from the token, never from
/// the path or body.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Staff member (or service account) behind the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal_id: PrincipalId,
    roles: Vec<Role>,
}

impl PrincipalContext {
    pub fn new(principal_id: PrincipalId, roles: Vec<Role>) -> Self {
        Self { principal_id, roles }
    }

    /// Split verified claims into the two request extensions.
    pub fn from_claims(claims: JwtClaims) -> (TenantContext, Self) {
        (
            TenantContext::new(claims.tenant_id),
            Self::new(claims.sub, claims.roles),
        )
    }

    pub fn principal_id(&self) -> PrincipalId {
        self.principal_id
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn role_names(&self) -> Vec<&str> {
        self.roles.iter().map(Role::as_str).collect()
    }

    /// Expand roles into a principal with its permission set for `tenant`.
    pub fn resolve(&self, tenant: &TenantContext) -> Principal {
        Principal::from_roles(self.principal_id, tenant.tenant_id(), self.roles.clone())
    }
}
