use exactmatch_core::UserId;

use crate::{Permission, Role};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Resolve permissions from roles.
    ///
    /// `admin` grants the wildcard; `staff` can manage orders but not the
    /// catalog. Any other role grants nothing beyond customer access.
    pub fn from_roles(user_id: UserId, roles: Vec<Role>) -> Self {
        let mut permissions = Vec::new();
        for role in &roles {
            match role.as_str() {
                Role::ADMIN => permissions.push(Permission::wildcard()),
                Role::STAFF => permissions.push(Permission::new(Permission::ORDERS_MANAGE)),
                _ => {}
            }
        }

        Self {
            user_id,
            roles,
            permissions,
        }
    }

    pub fn has_permission(&self, required: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.is_wildcard() || p.as_str() == required)
    }
}
