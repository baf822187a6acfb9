use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use exactmatch_catalog::Paginated;
use exactmatch_core::BrandId;

use crate::app::dto::{BrandView, PageParams};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_brands))
        .route("/:id", get(get_brand))
}

pub async fn list_brands(
    Extension(services): Extension<Arc<AppServices>>,
    Query(paging): Query<PageParams>,
) -> axum::response::Response {
    let page = match paging.page() {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let brands = match services.store.list_brands().await {
        Ok(b) => b,
        Err(e) => return errors::store_error_to_response(e),
    };

    let views: Vec<BrandView> = brands
        .iter()
        .map(|b| BrandView::from_brand(b, &services.media))
        .collect();
    Json(Paginated::slice(views, page)).into_response()
}

pub async fn get_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BrandId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("brand"),
    };

    match services.store.get_brand(id).await {
        Ok(Some(brand)) => Json(BrandView::from_brand(&brand, &services.media)).into_response(),
        Ok(None) => errors::not_found(format!("brand {id}")),
        Err(e) => errors::store_error_to_response(e),
    }
}
