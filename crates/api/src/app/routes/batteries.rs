use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use exactmatch_catalog::{BatteryQuery, Page, Paginated};
use exactmatch_core::BatteryId;

use crate::app::dto::{self, BatteryListParams, PageParams, ReviewView};
use crate::app::errors;
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_batteries))
        .route("/featured", get(featured_batteries))
        .route("/popular", get(popular_batteries))
        .route("/search", get(search_batteries))
        .route("/:id", get(get_battery))
        .route("/:id/reviews", get(battery_reviews))
}

pub async fn list_batteries(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<BatteryListParams>,
) -> axum::response::Response {
    browse(&services, params, |_| {}).await
}

pub async fn featured_batteries(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<BatteryListParams>,
) -> axum::response::Response {
    browse(&services, params, |q| q.featured_only = true).await
}

pub async fn popular_batteries(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<BatteryListParams>,
) -> axum::response::Response {
    browse(&services, params, |q| q.popular_only = true).await
}

/// `?q=` takes precedence over `search` here.
pub async fn search_batteries(
    Extension(services): Extension<Arc<AppServices>>,
    Query(mut params): Query<BatteryListParams>,
) -> axum::response::Response {
    if params.q.is_some() {
        params.search = params.q.take();
    }
    browse(&services, params, |_| {}).await
}

async fn browse(
    services: &AppServices,
    params: BatteryListParams,
    narrow: impl FnOnce(&mut BatteryQuery),
) -> axum::response::Response {
    let (mut query, page) = match params.to_query() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };
    narrow(&mut query);

    match list_page(services, &query, page).await {
        Ok(body) => Json(body).into_response(),
        Err(resp) => resp,
    }
}

/// Filter, sort and paginate the catalog; only the requested page is
/// turned into views.
pub(crate) async fn list_page(
    services: &AppServices,
    query: &BatteryQuery,
    page: Page,
) -> Result<Paginated<dto::BatteryListView>, axum::response::Response> {
    let index = services
        .catalog_index()
        .await
        .map_err(errors::store_error_to_response)?;
    let batteries = services
        .store
        .list_batteries()
        .await
        .map_err(errors::store_error_to_response)?;

    let hits = query.apply(batteries.iter().map(|b| (b, index.brand_name(&b.brand_id))));
    let paged = Paginated::slice(hits, page);
    let views = services
        .battery_list_views(&index, &paged.results)
        .await
        .map_err(errors::store_error_to_response)?;

    Ok(Paginated {
        count: paged.count,
        results: views,
    })
}

pub async fn get_battery(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: BatteryId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("battery"),
    };

    let battery = match services.store.get_battery(id).await {
        Ok(Some(b)) if b.is_active => b,
        Ok(_) => return errors::not_found(format!("battery {id}")),
        Err(e) => return errors::store_error_to_response(e),
    };

    match services.battery_detail_view(&battery).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn battery_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(paging): Query<PageParams>,
) -> axum::response::Response {
    let id: BatteryId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::invalid_id("battery"),
    };
    let page = match paging.page() {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store.get_battery(id).await {
        Ok(Some(b)) if b.is_active => {}
        Ok(_) => return errors::not_found(format!("battery {id}")),
        Err(e) => return errors::store_error_to_response(e),
    }

    let reviews = match services.store.reviews_for(&[id]).await {
        Ok(r) => r,
        Err(e) => return errors::store_error_to_response(e),
    };

    let views: Vec<ReviewView> = reviews.iter().map(ReviewView::from).collect();
    Json(Paginated::slice(views, page)).into_response()
}
