//! Comment handlers: submission with moderation, filtered listing, the
//! vote/reaction endpoints and owner-only deletion.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{
    config::Config,
    db,
    db::comments::Polarity,
    error::AppError,
    middleware::metrics::RequestMetrics,
    models::{
        CommentResponse, CreateCommentRequest, ListCommentsQuery, SpoilerSource, UserIdBody,
        VoteStatusQuery, VoteStatusResponse,
    },
    services,
};

/// Shared application state, injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    /// Shared outbound HTTP client (connection pooling across requests)
    pub http: reqwest::Client,
    pub metrics: Arc<RequestMetrics>,
}

/// `POST /comments`
///
/// Submission pipeline: synchronous toxicity check, provisional spoiler
/// state from the author's tri-state flag, persist, respond 201. The LLM
/// classification is spawned afterwards and never blocks the response.
pub async fn create_comment(
    State(state): State<AppState>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    if req.book_id.trim().is_empty() {
        return Err(AppError::BadRequest("bookId is required".to_string()));
    }
    if req.user_id.trim().is_empty() {
        return Err(AppError::BadRequest("userId is required".to_string()));
    }
    if db::users::find_by_id(&state.pool, &req.user_id).await?.is_none() {
        return Err(AppError::BadRequest("Unknown userId".to_string()));
    }
    if let Some(percent) = req.percent {
        if !(0.0..=100.0).contains(&percent) {
            return Err(AppError::BadRequest(
                "percent must be between 0 and 100".to_string(),
            ));
        }
    }

    let nsfw = services::moderation::check_nsfw(
        &state.http,
        state.config.perspective_api_key.as_deref(),
        &req.text,
    )
    .await;

    // The author's explicit flag is authoritative; anything else starts as a
    // provisional "none" that the classifier may later upgrade to "llm".
    let (is_spoiler, source) = match req.user_marked_spoiler {
        Some(true) => (true, SpoilerSource::User),
        _ => (false, SpoilerSource::None),
    };

    let id = uuid::Uuid::now_v7().to_string();
    let created = db::comments::create_comment(&state.pool, &id, &req, nsfw, is_spoiler, source)
        .await?;

    if req.user_marked_spoiler != Some(true) {
        spawn_spoiler_classification(state.clone(), id, req);
    }

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Fire-and-forget classification task. Detached from the request lifecycle:
/// the handler never awaits it and its failures are logged, not surfaced.
/// The verdict lands through a conditional update that a user-set spoiler
/// always wins against.
fn spawn_spoiler_classification(state: AppState, comment_id: String, req: CreateCommentRequest) {
    tokio::spawn(async move {
        let Some(verdict) = services::spoiler::classify_spoiler(
            &state.http,
            state.config.openrouter_api_key.as_deref(),
            &req.text,
            req.book_title.as_deref(),
            req.page,
            req.page_range.as_deref(),
        )
        .await
        else {
            return;
        };

        match db::comments::apply_spoiler_verdict(
            &state.pool,
            &comment_id,
            verdict.is_spoiler,
            verdict.confidence,
        )
        .await
        {
            Ok(true) => tracing::info!(
                %comment_id,
                is_spoiler = verdict.is_spoiler,
                confidence = verdict.confidence,
                "applied LLM spoiler classification"
            ),
            Ok(false) => tracing::debug!(
                %comment_id,
                "spoiler verdict discarded (comment deleted or user-flagged)"
            ),
            Err(e) => tracing::error!(%comment_id, "failed to apply spoiler verdict: {}", e),
        }
    });
}

/// `GET /comments?bookId=&page=&userId=` — most recent first.
pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<ListCommentsQuery>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    let comments = db::comments::list_comments(&state.pool, &query).await?;
    Ok(Json(comments.into_iter().map(Into::into).collect()))
}

/// `PATCH /comments/{id}/like`
pub async fn like_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UserIdBody>,
) -> Result<Json<CommentResponse>, AppError> {
    react(&state, &id, body.user_id, Polarity::Like).await
}

/// `PATCH /comments/{id}/dislike`
pub async fn dislike_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UserIdBody>,
) -> Result<Json<CommentResponse>, AppError> {
    react(&state, &id, body.user_id, Polarity::Dislike).await
}

async fn react(
    state: &AppState,
    id: &str,
    user_id: Option<String>,
    polarity: Polarity,
) -> Result<Json<CommentResponse>, AppError> {
    let user_id = user_id
        .filter(|uid| !uid.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("User ID is required".to_string()))?;

    db::comments::apply_reaction(&state.pool, id, &user_id, polarity)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    let comment = db::comments::get_with_author(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    Ok(Json(comment.into()))
}

/// `GET /comments/{id}/vote-status?userId=`
pub async fn vote_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<VoteStatusQuery>,
) -> Result<Json<VoteStatusResponse>, AppError> {
    let user_id = query
        .user_id
        .filter(|uid| !uid.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("User ID is required".to_string()))?;

    let comment = db::comments::get_comment(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    Ok(Json(VoteStatusResponse {
        has_liked: comment.liked_by_ids().iter().any(|uid| *uid == user_id),
        has_disliked: comment.disliked_by_ids().iter().any(|uid| *uid == user_id),
    }))
}

/// `DELETE /comments/{id}` — owner only.
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UserIdBody>,
) -> Result<Json<Value>, AppError> {
    let user_id = body
        .user_id
        .filter(|uid| !uid.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("User ID is required".to_string()))?;

    let comment = db::comments::get_comment(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if comment.user_id != user_id {
        return Err(AppError::Forbidden(
            "You can only delete your own comments".to_string(),
        ));
    }

    db::comments::delete_comment(&state.pool, &id).await?;
    Ok(Json(json!({ "message": "Comment deleted successfully" })))
}
