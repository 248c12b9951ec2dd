//! The signed-in user's own account.

use actix_web::{HttpRequest, HttpResponse, web};

use promptly_core::domain::ProfilePatch;
use promptly_shared::ApiResponse;
use promptly_shared::dto::{ListQuery, ProfileUpdateRequest};

use crate::middleware::auth::{CurrentCaller, device};
use crate::middleware::error::AppResult;
use crate::state::AppState;

const DEFAULT_ACTIVITY_LIMIT: usize = 20;

/// GET /api/me
///
/// Creates the account on first call.
pub async fn me(
    req: HttpRequest,
    state: web::Data<AppState>,
    caller: CurrentCaller,
) -> AppResult<HttpResponse> {
    let account = state
        .accounts
        .ensure_account(caller.caller(), device(&req))
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(account)))
}

/// PATCH /api/me
pub async fn update_profile(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    body: web::Json<ProfileUpdateRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    let patch = ProfilePatch {
        name: req.name,
        username: req.username,
        avatar: req.avatar,
    };
    let account = state.accounts.update_profile(caller.caller(), patch).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(account)))
}

/// DELETE /api/me
pub async fn delete_account(
    state: web::Data<AppState>,
    caller: CurrentCaller,
) -> AppResult<HttpResponse> {
    state.accounts.delete_account(caller.caller()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/me/activity?limit=
pub async fn activity(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    query: web::Query<ListQuery>,
) -> AppResult<HttpResponse> {
    caller.caller().require()?;
    let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    let entries = state.accounts.recent_activity(caller.caller(), limit).await;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(entries)))
}

/// POST /api/me/generations
pub async fn record_generation(
    state: web::Data<AppState>,
    caller: CurrentCaller,
) -> AppResult<HttpResponse> {
    state.accounts.record_generation(caller.caller()).await?;
    Ok(HttpResponse::NoContent().finish())
}
