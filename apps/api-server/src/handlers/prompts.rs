//! Catalog handlers: listing, lookup, authoring and counters.

use actix_web::{HttpResponse, web};

use promptly_core::domain::{ItemDraft, ItemPatch};
use promptly_shared::ApiResponse;
use promptly_shared::dto::{
    BatchRequest, CommentRequest, CreatePromptRequest, ListQuery, SearchQuery,
    UpdatePromptRequest,
};

use crate::middleware::auth::CurrentCaller;
use crate::middleware::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /api/prompts?limit=
pub async fn list_prompts(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> HttpResponse {
    let limit = query.limit.unwrap_or(state.feed_limit);
    HttpResponse::Ok().json(ApiResponse::ok(state.catalog.list_all(limit).await))
}

/// GET /api/prompts/search?q=&limit=
pub async fn search_prompts(
    state: web::Data<AppState>,
    query: web::Query<SearchQuery>,
) -> HttpResponse {
    let limit = query.limit.unwrap_or(state.feed_limit);
    let items = state.catalog.search(&query.q, limit).await;
    HttpResponse::Ok().json(ApiResponse::ok(items))
}

/// POST /api/prompts/batch
pub async fn batch_prompts(
    state: web::Data<AppState>,
    body: web::Json<BatchRequest>,
) -> HttpResponse {
    let items = state.catalog.get_by_ids(&body.ids).await;
    HttpResponse::Ok().json(ApiResponse::ok(items))
}

/// GET /api/prompts/{id}
pub async fn get_prompt(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let item_id = path.into_inner();
    let item = state
        .catalog
        .get_by_id(&item_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("prompt with id {} not found", item_id)))?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(item)))
}

/// GET /api/authors/{id}/prompts
pub async fn author_prompts(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let items = state.catalog.get_by_author(&path.into_inner()).await;
    HttpResponse::Ok().json(ApiResponse::ok(items))
}

/// POST /api/prompts
pub async fn create_prompt(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    body: web::Json<CreatePromptRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();
    if req.title.trim().is_empty() || req.prompt.trim().is_empty() {
        return Err(AppError::BadRequest(
            "title and prompt must not be empty".to_string(),
        ));
    }

    let draft = ItemDraft {
        title: req.title,
        body: req.prompt,
        media_ref: req.media_url,
        category: req.category,
        model: req.model,
        tags: req.tags,
        is_premium: req.is_premium,
    };
    let item = state.catalog.create(caller.caller(), draft).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(item)))
}

/// PUT /api/prompts/{id}
pub async fn update_prompt(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    path: web::Path<String>,
    body: web::Json<UpdatePromptRequest>,
) -> AppResult<HttpResponse> {
    let item_id = path.into_inner();
    let req = body.into_inner();
    let patch = ItemPatch {
        title: req.title,
        body: req.prompt,
        media_ref: req.media_url,
        category: req.category,
        model: req.model,
        tags: req.tags,
        is_premium: req.is_premium,
        is_hidden: req.is_hidden,
    };

    if !state.catalog.update(caller.caller(), &item_id, patch).await? {
        return Err(AppError::NotFound(format!(
            "prompt with id {} not found in your catalog",
            item_id
        )));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// DELETE /api/prompts/{id}
pub async fn delete_prompt(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let item_id = path.into_inner();
    if !state.catalog.delete(caller.caller(), &item_id).await? {
        return Err(AppError::NotFound(format!(
            "prompt with id {} not found in your catalog",
            item_id
        )));
    }
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/prompts/{id}/views
pub async fn record_view(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    state.catalog.record_view(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/prompts/{id}/downloads
pub async fn record_download(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    state.catalog.record_download(&path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// POST /api/prompts/{id}/comments
pub async fn add_comment(
    state: web::Data<AppState>,
    caller: CurrentCaller,
    path: web::Path<String>,
    body: web::Json<CommentRequest>,
) -> AppResult<HttpResponse> {
    let comment = state
        .catalog
        .add_comment(caller.caller(), &path.into_inner(), &body.body)
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(comment)))
}
