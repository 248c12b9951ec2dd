//! Model options and the feature roadmap.

use actix_web::{HttpResponse, web};

use promptly_shared::ApiResponse;
use promptly_shared::dto::FeatureSubscriptionResponse;

use crate::middleware::auth::CurrentCaller;
use crate::middleware::error::AppResult;
use crate::state::AppState;

/// GET /api/models
pub async fn list_models(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(state.roadmap.list_models().await))
}

/// GET /api/features
pub async fn list_features(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ApiResponse::ok(state.roadmap.list_features().await))
}

/// POST /api/features/{id}/subscribe
pub async fn toggle_subscription(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let subscribed = state
        .roadmap
        .toggle_feature_subscription(caller.caller(), &path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(FeatureSubscriptionResponse { subscribed })))
}
