use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use exactmatch_core::UserId;

use crate::Role;

/// Bearer token claims (transport-agnostic).
///
/// This is the minimal set of claims the storefront expects once a token has
/// been issued by the identity provider. The profile fields are copied into the
/// user directory the first time a user is seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// RBAC roles granted to the user.
    #[serde(default)]
    pub roles: Vec<Role>,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiration, seconds since the Unix epoch.
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,

    #[error("token has no username")]
    MissingUsername,
}

/// Deterministically validate claims against `now`.
///
/// Signature verification is the validator's job; this only checks the
/// claim contents.
pub fn validate_claims(claims: &UserClaims, now: DateTime<Utc>) -> Result<(), TokenError> {
    if claims.exp <= claims.iat {
        return Err(TokenError::InvalidTimeWindow);
    }
    let now = now.timestamp();
    if now < claims.iat {
        return Err(TokenError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenError::Expired);
    }
    if claims.username.trim().is_empty() {
        return Err(TokenError::MissingUsername);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims_at(now: DateTime<Utc>) -> UserClaims {
        UserClaims {
            sub: UserId::new(),
            username: "alice".to_string(),
            email: None,
            first_name: None,
            last_name: None,
            roles: vec![],
            iat: now.timestamp(),
            exp: (now + Duration::minutes(10)).timestamp(),
        }
    }

    #[test]
    fn fresh_claims_are_valid() {
        let now = Utc::now();
        assert_eq!(validate_claims(&claims_at(now), now), Ok(()));
    }

    #[test]
    fn expired_and_future_claims_are_rejected() {
        let now = Utc::now();
        let claims = claims_at(now);
        assert_eq!(
            validate_claims(&claims, now + Duration::minutes(11)),
            Err(TokenError::Expired)
        );
        assert_eq!(
            validate_claims(&claims, now - Duration::minutes(1)),
            Err(TokenError::NotYetValid)
        );
    }

    #[test]
    fn inverted_window_and_blank_username_are_rejected() {
        let now = Utc::now();
        let mut claims = claims_at(now);
        claims.exp = claims.iat;
        assert_eq!(validate_claims(&claims, now), Err(TokenError::InvalidTimeWindow));

        let mut claims = claims_at(now);
        claims.username = "  ".to_string();
        assert_eq!(validate_claims(&claims, now), Err(TokenError::MissingUsername));
    }
}
