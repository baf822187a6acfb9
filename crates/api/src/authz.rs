//! API-side authorization guard.
//!
//! Handlers call this before touching the store, keeping the domain and
//! infra crates auth-agnostic.

use exactmatch_auth::{authorize, AuthzError, Permission};

use crate::context::PrincipalContext;

/// Check a single permission for the current requester.
pub fn require(principal: &PrincipalContext, permission: &'static str) -> Result<(), AuthzError> {
    authorize(principal.principal(), &Permission::new(permission))
}

/// Whether the requester holds `permission` (no logging, no error).
pub fn holds(principal: &PrincipalContext, permission: &str) -> bool {
    principal.principal().has_permission(permission)
}
