//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection and view assembly
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: response views and query/body parameters
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};
use tower::ServiceBuilder;

use exactmatch_infra::StoreError;

use crate::config::Config;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &Config) -> Result<Router, StoreError> {
    let services = Arc::new(services::build_services(config).await?);
    Ok(router(services, config))
}

/// Router over already-built services.
pub fn router(services: Arc<services::AppServices>, config: &Config) -> Router {
    let jwt = Arc::new(exactmatch_auth::Hs256JwtValidator::new(
        config.jwt_secret.clone().into_bytes(),
    ));
    let auth_state = middleware::AuthState {
        jwt,
        store: services.store.clone(),
    };

    // Protected routes: require a valid bearer token.
    let protected = routes::protected_router().layer(axum::middleware::from_fn_with_state(
        auth_state,
        middleware::auth_middleware,
    ));

    Router::new()
        .merge(routes::public_router())
        .merge(protected)
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
