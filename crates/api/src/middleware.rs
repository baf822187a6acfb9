use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use exactmatch_auth::{JwtValidator, Principal, UserClaims};
use exactmatch_infra::{Store, UserRecord};

use crate::app::errors;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub store: Arc<dyn Store>,
}

/// Validate the bearer token, refresh the user directory from its claims
/// and attach a [`PrincipalContext`] to the request.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).ok_or_else(|| {
        errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "missing bearer token")
    })?;

    let now = Utc::now();
    let claims = state.jwt.validate(token, now).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string())
    })?;

    let user = state
        .store
        .upsert_user(profile_from_claims(&claims, now))
        .await
        .map_err(errors::store_error_to_response)?;

    let principal = Principal::from_roles(claims.sub, claims.roles);
    req.extensions_mut()
        .insert(PrincipalContext::new(user, principal));

    Ok(next.run(req).await)
}

fn profile_from_claims(claims: &UserClaims, now: chrono::DateTime<Utc>) -> UserRecord {
    UserRecord {
        id: claims.sub,
        username: claims.username.clone(),
        email: claims.email.clone().unwrap_or_default(),
        first_name: claims.first_name.clone().unwrap_or_default(),
        last_name: claims.last_name.clone().unwrap_or_default(),
        date_joined: now,
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let token = header.to_str().ok()?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}
