use axum::{routing::get, Router};

pub mod admin;
pub mod batteries;
pub mod brands;
pub mod categories;
pub mod orders;
pub mod reviews;
pub mod system;
pub mod users;
pub mod wishlist;

/// Catalog browsing; no token needed.
pub fn public_router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .nest("/batteries", batteries::router())
        .nest("/brands", brands::router())
        .nest("/categories", categories::router())
}

/// Endpoints that require a bearer token.
pub fn protected_router() -> Router {
    Router::new()
        .nest("/reviews", reviews::router())
        .nest("/orders", orders::router())
        .nest("/wishlist", wishlist::router())
        .nest("/users", users::router())
        .nest("/admin", admin::router())
}
