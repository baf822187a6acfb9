use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use chrono::Utc;

use exactmatch_catalog::NewReview;
use exactmatch_core::ReviewId;

use crate::app::dto::ReviewView;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new().route("/", post(create_review))
}

/// One review per user and battery; marked verified when the user has
/// ordered that battery.
pub async fn create_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    payload: Result<Json<NewReview>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::body(payload) {
        Ok(b) => b,
        Err(resp) => return resp,
    };
    if let Err(e) = body.validate() {
        return errors::domain_error_to_response(e);
    }

    match services.store.get_battery(body.battery_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return errors::not_found(format!("battery {}", body.battery_id)),
        Err(e) => return errors::store_error_to_response(e),
    }

    let verified = match services
        .store
        .has_purchased(principal.user_id(), body.battery_id)
        .await
    {
        Ok(v) => v,
        Err(e) => return errors::store_error_to_response(e),
    };

    let review = match body.into_review(
        ReviewId::new(),
        principal.user_id(),
        principal.username().to_string(),
        verified,
        Utc::now(),
    ) {
        Ok(r) => r,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = services.store.insert_review(review.clone()).await {
        return errors::store_error_to_response(e);
    }

    tracing::info!(
        review_id = %review.id,
        battery_id = %review.battery_id,
        verified,
        "review created"
    );
    (StatusCode::CREATED, Json(ReviewView::from(&review))).into_response()
}
