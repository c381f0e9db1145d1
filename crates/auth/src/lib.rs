//! Authentication and authorization primitives.
//!
//! Token verification lives behind [`JwtValidator`]; policy checks are pure
//! functions over a resolved [`Principal`].

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, permission_matches, AuthzError, Principal};
pub use claims::{
    validate_claims, Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError,
};
pub use permissions::Permission;
pub use principal::{PrincipalId, TenantMembership};
pub use roles::{permissions_for_role, Role, KNOWN_ROLES};
