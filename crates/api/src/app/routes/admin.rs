//! Catalog administration.
//!
//! Every handler requires `catalog.manage`; the `admin` role holds it through
//! the wildcard permission.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use exactmatch_auth::Permission;
use exactmatch_catalog::{NewBattery, NewBatteryImage, NewBrand, NewCategory};
use exactmatch_core::{BatteryId, BrandId, CategoryId, ImageId};
use exactmatch_infra::StoreError;

use crate::app::dto::{BatteryImageView, BrandView, CategoryView};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/brands", post(create_brand))
        .route("/categories", post(create_category))
        .route("/batteries", post(create_battery))
        .route("/batteries/:id/images", post(add_battery_image))
}

fn guard(principal: &PrincipalContext) -> Result<(), axum::response::Response> {
    authz::require(principal, Permission::CATALOG_MANAGE).map_err(errors::forbidden)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /admin/brands
pub async fn create_brand(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewBrand>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal) {
        return resp;
    }
    let body = match errors::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let brand = match body.into_brand(BrandId::new(), Utc::now()) {
        Ok(b) => b,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = services.store.insert_brand(brand.clone()).await {
        return errors::store_error_to_response(e);
    }

    tracing::info!(brand_id = %brand.id, name = %brand.name, "brand created");
    (
        StatusCode::CREATED,
        Json(BrandView::from_brand(&brand, &services.media)),
    )
        .into_response()
}

/// POST /admin/categories
pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewCategory>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal) {
        return resp;
    }
    let body = match errors::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let category = match body.into_category(CategoryId::new(), Utc::now()) {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = services.store.insert_category(category.clone()).await {
        return errors::store_error_to_response(e);
    }

    tracing::info!(category_id = %category.id, name = %category.name, "category created");
    (
        StatusCode::CREATED,
        Json(CategoryView::from_category(&category, &services.media)),
    )
        .into_response()
}

/// POST /admin/batteries
///
/// The slug is derived from name and model number; the store appends a
/// numeric suffix when it is taken.
pub async fn create_battery(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewBattery>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal) {
        return resp;
    }
    let body = match errors::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let slug = body.base_slug();
    let battery = match body.into_battery(BatteryId::new(), slug, Utc::now()) {
        Ok(b) => b,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let stored = match services.store.insert_battery(battery).await {
        Ok(b) => b,
        // An unknown brand or category is a bad request, not a missing route.
        Err(StoreError::NotFound(what)) => {
            return errors::json_error(
                StatusCode::BAD_REQUEST,
                "validation_error",
                format!("{what} does not exist"),
            );
        }
        Err(e) => return errors::store_error_to_response(e),
    };

    tracing::info!(battery_id = %stored.id, slug = %stored.slug, "battery created");
    match services.battery_detail_view(&stored).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// POST /admin/batteries/:id/images
pub async fn add_battery_image(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    payload: Result<Json<NewBatteryImage>, JsonRejection>,
) -> axum::response::Response {
    if let Err(resp) = guard(&principal) {
        return resp;
    }
    let battery_id: BatteryId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("battery"),
    };
    let body = match errors::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.store.get_battery(battery_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return errors::not_found(format!("battery {battery_id}")),
        Err(e) => return errors::store_error_to_response(e),
    }

    let image = match body.into_image(ImageId::new(), battery_id) {
        Ok(i) => i,
        Err(e) => return errors::domain_error_to_response(e),
    };
    if let Err(e) = services.store.insert_image(image.clone()).await {
        return errors::store_error_to_response(e);
    }

    (
        StatusCode::CREATED,
        Json(BatteryImageView::from_image(&image, &services.media)),
    )
        .into_response()
}
