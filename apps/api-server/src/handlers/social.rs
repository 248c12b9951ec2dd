//! Likes, unlocks and the follow graph.

use actix_web::{HttpResponse, web};

use promptly_core::services::UnlockOutcome;
use promptly_shared::ApiResponse;
use promptly_shared::dto::{FollowStatusResponse, LikeResponse, UnlockResponse};

use crate::middleware::auth::CurrentCaller;
use crate::middleware::error::AppResult;
use crate::state::AppState;

/// POST /api/prompts/{id}/like
pub async fn toggle_like(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let liked = state
        .likes
        .toggle_like(caller.caller(), &path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(LikeResponse { liked })))
}

/// POST /api/prompts/{id}/unlock
pub async fn unlock(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let response = match state
        .credits
        .unlock(caller.caller(), &path.into_inner())
        .await?
    {
        UnlockOutcome::AlreadyUnlocked => UnlockResponse {
            unlocked: true,
            already_unlocked: true,
            remaining_credits: None,
        },
        UnlockOutcome::Unlocked { remaining_credits } => UnlockResponse {
            unlocked: true,
            already_unlocked: false,
            remaining_credits: Some(remaining_credits),
        },
    };
    Ok(HttpResponse::Ok().json(ApiResponse::ok(response)))
}

/// POST /api/users/{id}/follow
pub async fn follow(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    state.follows.follow(caller.caller(), &path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(FollowStatusResponse { following: true })))
}

/// DELETE /api/users/{id}/follow
pub async fn unfollow(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    state
        .follows
        .unfollow(caller.caller(), &path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(FollowStatusResponse { following: false })))
}

/// GET /api/users/{id}/follow
///
/// Anonymous callers follow nobody.
pub async fn follow_status(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    path: web::Path<String>,
) -> HttpResponse {
    let following = state
        .follows
        .is_following(caller.caller(), &path.into_inner())
        .await;
    HttpResponse::Ok().json(ApiResponse::ok(FollowStatusResponse { following }))
}
