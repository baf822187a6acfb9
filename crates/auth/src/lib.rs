//! `exactmatch-auth`: bearer-token identity and permission checks.
//!
//! This crate is intentionally decoupled from HTTP and storage: it turns a
//! token into claims and answers "may this principal do X?".

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{authorize, AuthzError};
pub use claims::{validate_claims, TokenError, UserClaims};
pub use jwt::{Hs256JwtValidator, JwtValidator};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::Role;
