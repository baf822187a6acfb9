use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use exactmatch_catalog::Paginated;
use exactmatch_core::CategoryId;

use crate::app::dto::{CategoryListParams, CategoryView};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories))
        .route("/:id", get(get_category))
}

/// `?type=vehicle_type` narrows the list to one kind.
pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<CategoryListParams>,
) -> axum::response::Response {
    let (kind, page) = match params.kind().and_then(|k| Ok((k, params.paging.page()?))) {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let categories = match services.store.list_categories(kind).await {
        Ok(c) => c,
        Err(e) => return errors::store_error_to_response(e),
    };

    let views: Vec<CategoryView> = categories
        .iter()
        .map(|c| CategoryView::from_category(c, &services.media))
        .collect();
    Json(Paginated::slice(views, page)).into_response()
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: CategoryId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("category"),
    };

    match services.store.get_category(id).await {
        Ok(Some(c)) => Json(CategoryView::from_category(&c, &services.media)).into_response(),
        Ok(None) => errors::not_found(format!("category {id}")),
        Err(e) => errors::store_error_to_response(e),
    }
}
