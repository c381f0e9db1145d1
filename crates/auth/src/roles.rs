use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Permission;

/// Role identifier used for RBAC.
///
/// Tokens carry roles only; permissions are derived through
/// [`permissions_for_role`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub const ADMIN: &'static str = "admin";
    pub const ACCOUNTANT: &'static str = "accountant";
    pub const STOREKEEPER: &'static str = "storekeeper";
    pub const TEMPLE_STAFF: &'static str = "temple_staff";

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const KNOWN_ROLES: [&str; 4] = [
    Role::ADMIN,
    Role::ACCOUNTANT,
    Role::STOREKEEPER,
    Role::TEMPLE_STAFF,
];

/// Static role policy. Unknown roles grant nothing.
pub fn permissions_for_role(role: &str) -> Vec<Permission> {
    let grants: &[&'static str] = match role {
        Role::ADMIN => &["*"],
        Role::ACCOUNTANT => &["accounting.*"],
        Role::STOREKEEPER => &[
            "inventory.*",
            "manufacturing.*",
            "purchasing.*",
            "products.*",
        ],
        Role::TEMPLE_STAFF => &["temple.*", "sales.*"],
        _ => &[],
    };
    grants.iter().map(|p| Permission::new(*p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_holds_the_wildcard() {
        let perms = permissions_for_role("admin");
        assert_eq!(perms.len(), 1);
        assert!(perms[0].is_wildcard());
    }

    #[test]
    fn storekeeper_covers_the_stock_side_of_the_business() {
        let perms: Vec<String> = permissions_for_role("storekeeper")
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert!(perms.contains(&"inventory.*".to_string()));
        assert!(perms.contains(&"manufacturing.*".to_string()));
        assert!(!perms.contains(&"accounting.*".to_string()));
    }

    #[test]
    fn unknown_role_grants_nothing() {
        assert!(permissions_for_role("priest").is_empty());
    }
}
