use axum::{extract::Extension, routing::get, Json, Router};

use crate::app::dto::UserView;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/me", get(me))
}

pub async fn me(Extension(principal): Extension<PrincipalContext>) -> Json<UserView> {
    Json(UserView::from(principal.user()))
}
