use thiserror::Error;

use crate::{Permission, Principal};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Authorize a principal for a single permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    if principal.has_permission(required.as_str()) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %principal.user_id,
            permission = %required,
            "permission denied"
        );
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
