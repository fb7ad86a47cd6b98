//! Comment queries: CRUD, the vote/reaction ledger and the classifier's
//! conditional spoiler patch.
//!
//! The ledger is the sole writer of likes/dislikes/liked_by/disliked_by.
//! Its read-modify-write goes through a version-checked UPDATE and retries
//! on conflict, so the one-reaction-per-user invariant holds under
//! concurrent reactions to the same comment.

use sqlx::{QueryBuilder, SqlitePool};

use crate::error::AppError;
use crate::models::{
    CommentRow, CommentWithAuthorRow, CreateCommentRequest, ListCommentsQuery, SpoilerSource,
};

const SELECT_WITH_AUTHOR: &str = "SELECT c.*, u.name AS author_name, u.email AS author_email, \
     u.picture AS author_picture FROM comments c JOIN users u ON u.id = c.user_id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Like,
    Dislike,
}

pub async fn create_comment(
    pool: &SqlitePool,
    id: &str,
    req: &CreateCommentRequest,
    nsfw: bool,
    is_spoiler: bool,
    source: SpoilerSource,
) -> Result<CommentWithAuthorRow, AppError> {
    sqlx::query(
        r#"
        INSERT INTO comments (id, book_id, user_id, page, percent, text, nsfw,
                              spoiler_is_spoiler, spoiler_source)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(&req.book_id)
    .bind(&req.user_id)
    .bind(req.page)
    .bind(req.percent)
    .bind(&req.text)
    .bind(nsfw)
    .bind(is_spoiler)
    .bind(source.as_str())
    .execute(pool)
    .await?;

    get_with_author(pool, id).await?.ok_or(AppError::Internal(
        "Failed to retrieve created comment".to_string(),
    ))
}

pub async fn get_comment(pool: &SqlitePool, id: &str) -> Result<Option<CommentRow>, AppError> {
    let comment = sqlx::query_as::<_, CommentRow>("SELECT * FROM comments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(comment)
}

pub async fn get_with_author(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<CommentWithAuthorRow>, AppError> {
    let comment =
        sqlx::query_as::<_, CommentWithAuthorRow>(&format!("{SELECT_WITH_AUTHOR} WHERE c.id = ?"))
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(comment)
}

/// Filtered list, most recent first.
pub async fn list_comments(
    pool: &SqlitePool,
    query: &ListCommentsQuery,
) -> Result<Vec<CommentWithAuthorRow>, AppError> {
    let mut qb = QueryBuilder::new(SELECT_WITH_AUTHOR);
    qb.push(" WHERE 1 = 1");

    if let Some(book_id) = &query.book_id {
        qb.push(" AND c.book_id = ").push_bind(book_id);
    }
    if let Some(page) = query.page {
        qb.push(" AND c.page = ").push_bind(page);
    }
    if let Some(user_id) = &query.user_id {
        qb.push(" AND c.user_id = ").push_bind(user_id);
    }
    // created_at has millisecond precision; rowid breaks ties in insertion
    // order so "most recent first" is deterministic.
    qb.push(" ORDER BY c.created_at DESC, c.rowid DESC");

    let comments = qb
        .build_query_as::<CommentWithAuthorRow>()
        .fetch_all(pool)
        .await?;

    Ok(comments)
}

pub async fn delete_comment(pool: &SqlitePool, id: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Toggle a reaction. Reacting with a polarity the user already holds
/// removes it; reacting with the opposite polarity moves the vote. Returns
/// None when the comment does not exist.
///
/// Optimistic loop: the write only lands if nobody else bumped `version`
/// since our read. A conflict means some writer made progress, so the retry
/// cannot loop forever.
pub async fn apply_reaction(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
    polarity: Polarity,
) -> Result<Option<CommentRow>, AppError> {
    loop {
        let Some(comment) = get_comment(pool, id).await? else {
            return Ok(None);
        };

        let mut liked_by = comment.liked_by_ids();
        let mut disliked_by = comment.disliked_by_ids();
        let mut likes = comment.likes;
        let mut dislikes = comment.dislikes;

        let (own, own_count, other, other_count) = match polarity {
            Polarity::Like => (&mut liked_by, &mut likes, &mut disliked_by, &mut dislikes),
            Polarity::Dislike => (&mut disliked_by, &mut dislikes, &mut liked_by, &mut likes),
        };

        if own.iter().any(|uid| uid == user_id) {
            own.retain(|uid| uid != user_id);
            *own_count = (*own_count - 1).max(0);
        } else {
            if other.iter().any(|uid| uid == user_id) {
                other.retain(|uid| uid != user_id);
                *other_count = (*other_count - 1).max(0);
            }
            own.push(user_id.to_string());
            *own_count += 1;
        }

        let liked_json = serde_json::to_string(&liked_by)
            .map_err(|e| AppError::Internal(format!("Failed to encode vote set: {}", e)))?;
        let disliked_json = serde_json::to_string(&disliked_by)
            .map_err(|e| AppError::Internal(format!("Failed to encode vote set: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE comments
            SET likes = ?, dislikes = ?, liked_by = ?, disliked_by = ?,
                version = version + 1
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(likes)
        .bind(dislikes)
        .bind(&liked_json)
        .bind(&disliked_json)
        .bind(id)
        .bind(comment.version)
        .execute(pool)
        .await?;

        if result.rows_affected() == 1 {
            return get_comment(pool, id).await;
        }
        // Lost the race against a concurrent reaction; re-read and retry.
    }
}

/// Apply the asynchronous classifier's verdict. The source guard lives in
/// the statement itself: a comment whose spoiler was set by its author is
/// never overwritten, even if the classifier finished after a concurrent
/// user edit. Returns whether the patch landed.
pub async fn apply_spoiler_verdict(
    pool: &SqlitePool,
    id: &str,
    is_spoiler: bool,
    confidence: f64,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE comments
        SET spoiler_is_spoiler = ?, spoiler_source = 'llm', spoiler_confidence = ?
        WHERE id = ? AND spoiler_source != 'user'
        "#,
    )
    .bind(is_spoiler)
    .bind(confidence)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
