//! User resource handlers: OAuth upsert, profile lookup, batch author
//! fetch and bookmarks.

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    db,
    error::AppError,
    models::{
        Author, BatchUsersRequest, Bookmark, CreateBookmarkRequest, GoogleAuthRequest,
        UserResponse,
    },
    routes::comments::AppState,
};

/// `POST /users/auth/google` — create or refresh a user from an OAuth
/// payload the frontend already obtained.
pub async fn google_auth(
    State(state): State<AppState>,
    Json(req): Json<GoogleAuthRequest>,
) -> Result<Json<Value>, AppError> {
    let (Some(google_id), Some(name), Some(email), Some(picture), Some(access_token)) = (
        req.google_id,
        req.name,
        req.email,
        req.picture,
        req.access_token,
    ) else {
        return Err(AppError::BadRequest("Missing required fields".to_string()));
    };

    let user = db::users::upsert_google_user(
        &state.pool,
        &google_id,
        &name,
        &email,
        &picture,
        &access_token,
        None,
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "user": {
            "id": user.id,
            "googleId": user.google_id,
            "name": user.name,
            "email": user.email,
            "picture": user.picture,
        },
    })))
}

/// `GET /users/{userId}` — profile with OAuth secrets stripped.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, AppError> {
    let user = db::users::find_by_id(&state.pool, &user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}

/// `POST /users/batch` — public profiles for a list of ids, used to
/// populate comment authors client-side.
pub async fn batch_users(
    State(state): State<AppState>,
    Json(req): Json<BatchUsersRequest>,
) -> Result<Json<Vec<Author>>, AppError> {
    let user_ids = req
        .user_ids
        .ok_or_else(|| AppError::BadRequest("userIds array is required".to_string()))?;

    let authors = db::users::batch_authors(&state.pool, &user_ids).await?;
    Ok(Json(authors))
}

/// `POST /users/{userId}/bookmarks` — add or replace the bookmark for a
/// (book, page) pair; returns the full list.
pub async fn add_bookmark(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<CreateBookmarkRequest>,
) -> Result<Json<Vec<Bookmark>>, AppError> {
    let (Some(book_id), Some(page), Some(color)) = (req.book_id, req.page, req.color) else {
        return Err(AppError::BadRequest(
            "bookId, page, and color are required".to_string(),
        ));
    };

    if db::users::find_by_id(&state.pool, &user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let bookmarks = db::users::upsert_bookmark(&state.pool, &user_id, &book_id, page, &color).await?;
    Ok(Json(bookmarks))
}

/// `GET /users/{userId}/bookmarks`
pub async fn list_bookmarks(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Bookmark>>, AppError> {
    if db::users::find_by_id(&state.pool, &user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let bookmarks = db::users::list_bookmarks(&state.pool, &user_id).await?;
    Ok(Json(bookmarks))
}
