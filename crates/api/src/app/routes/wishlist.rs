use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;

use exactmatch_catalog::{Battery, Paginated, WishlistEntry};
use exactmatch_core::WishlistId;

use crate::app::dto::{PageParams, WishlistAddRequest, WishlistView};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_wishlist).post(add_to_wishlist))
        .route("/:id", delete(remove_from_wishlist))
}

pub async fn list_wishlist(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(paging): Query<PageParams>,
) -> axum::response::Response {
    let page = match paging.page() {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };
    let entries = match services.store.list_wishlist(principal.user_id()).await {
        Ok(e) => e,
        Err(e) => return errors::store_error_to_response(e),
    };

    let paged = Paginated::slice(entries, page);
    match wishlist_views(&services, &paged.results).await {
        Ok(results) => Json(Paginated {
            count: paged.count,
            results,
        })
        .into_response(),
        Err(resp) => resp,
    }
}

/// Idempotent: adding a saved battery again returns the existing entry
/// with `200` instead of `201`.
pub async fn add_to_wishlist(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<WishlistAddRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    match services.store.get_battery(body.battery_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return errors::not_found(format!("battery {}", body.battery_id)),
        Err(e) => return errors::store_error_to_response(e),
    }

    let candidate = WishlistEntry {
        id: WishlistId::new(),
        user_id: principal.user_id(),
        battery_id: body.battery_id,
        created_at: Utc::now(),
    };
    let stored = match services.store.add_to_wishlist(candidate.clone()).await {
        Ok(e) => e,
        Err(e) => return errors::store_error_to_response(e),
    };
    let status = if stored.id == candidate.id {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    match wishlist_views(&services, std::slice::from_ref(&stored)).await {
        Ok(mut views) => match views.pop() {
            Some(view) => (status, Json(view)).into_response(),
            None => errors::not_found(format!("battery {}", stored.battery_id)),
        },
        Err(resp) => resp,
    }
}

pub async fn remove_from_wishlist(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: WishlistId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("wishlist"),
    };

    match services
        .store
        .remove_from_wishlist(principal.user_id(), id)
        .await
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Entries whose battery row no longer exists are left out.
async fn wishlist_views(
    services: &AppServices,
    entries: &[WishlistEntry],
) -> Result<Vec<WishlistView>, axum::response::Response> {
    let mut batteries: Vec<(&WishlistEntry, Battery)> = Vec::with_capacity(entries.len());
    for entry in entries {
        let found = services
            .store
            .get_battery(entry.battery_id)
            .await
            .map_err(errors::store_error_to_response)?;
        if let Some(b) = found {
            batteries.push((entry, b));
        }
    }

    let index = services
        .catalog_index()
        .await
        .map_err(errors::store_error_to_response)?;
    let refs: Vec<&Battery> = batteries.iter().map(|(_, b)| b).collect();
    let views = services
        .battery_list_views(&index, &refs)
        .await
        .map_err(errors::store_error_to_response)?;

    Ok(batteries
        .iter()
        .zip(views)
        .map(|((entry, _), view)| WishlistView::build(entry, view))
        .collect())
}

