use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use exactmatch_auth::Permission;
use exactmatch_catalog::Paginated;
use exactmatch_core::OrderId;
use exactmatch_orders::{CheckoutRequest, Order, OrderStatus};

use crate::app::dto::{PageParams, StatusUpdateRequest};
use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:id", get(get_order).patch(update_status))
}

/// Own orders, or every order for `orders.manage` holders.
pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(paging): Query<PageParams>,
) -> axum::response::Response {
    let page = match paging.page() {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let scope = if authz::holds(&principal, Permission::ORDERS_MANAGE) {
        None
    } else {
        Some(principal.user_id())
    };
    let orders = match services.store.list_orders(scope).await {
        Ok(o) => o,
        Err(e) => return errors::store_error_to_response(e),
    };

    let paged = Paginated::slice(orders, page);
    match services.order_views(&paged.results).await {
        Ok(views) => Json(Paginated {
            count: paged.count,
            results: views,
        })
        .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Price the requested items from the catalog and store the order.
pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> axum::response::Response {
    let request = match errors::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };

    let order = match services
        .checkout
        .place(request, principal.user_id(), principal.username(), Utc::now())
        .await
    {
        Ok(o) => o,
        Err(e) => return errors::checkout_error_to_response(e),
    };

    match services.order_view(&order).await {
        Ok(view) => (StatusCode::CREATED, Json(view)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let order = match load_visible(&services, &principal, &id).await {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    match services.order_view(&order).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Move an order along its lifecycle. Totals are untouched.
pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&principal, Permission::ORDERS_MANAGE) {
        return errors::forbidden(e);
    }
    let body = match errors::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    let next: OrderStatus = match body.status.parse() {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let mut order = match load_visible(&services, &principal, &id).await {
        Ok(o) => o,
        Err(resp) => return resp,
    };
    let previous = order.status();
    if let Err(e) = order.transition_to(next, Utc::now()) {
        return errors::domain_error_to_response(e);
    }
    if let Err(e) = services.store.update_order_status(&order).await {
        return errors::store_error_to_response(e);
    }

    tracing::info!(
        order_id = %order.id_typed(),
        from = %previous,
        to = %next,
        "order status updated"
    );
    match services.order_view(&order).await {
        Ok(view) => Json(view).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Someone else's order is reported as missing unless the requester
/// manages orders.
async fn load_visible(
    services: &AppServices,
    principal: &PrincipalContext,
    id: &str,
) -> Result<Order, axum::response::Response> {
    let id: OrderId = id.parse().map_err(|_| errors::invalid_id("order"))?;
    let order = services
        .store
        .get_order(id)
        .await
        .map_err(errors::store_error_to_response)?;

    match order {
        Some(o)
            if o.user_id() == principal.user_id()
                || authz::holds(principal, Permission::ORDERS_MANAGE) =>
        {
            Ok(o)
        }
        _ => Err(errors::not_found(format!("order {id}"))),
    }
}
