use sqlx::{QueryBuilder, SqlitePool};

use crate::error::AppError;
use crate::models::{Author, Bookmark, User};

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

pub async fn find_by_google_id(
    pool: &SqlitePool,
    google_id: &str,
) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE google_id = ?")
        .bind(google_id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Create the user on first login, refresh profile fields and tokens on
/// every later one. `last_login` is bumped either way.
pub async fn upsert_google_user(
    pool: &SqlitePool,
    google_id: &str,
    name: &str,
    email: &str,
    picture: &str,
    access_token: &str,
    refresh_token: Option<&str>,
) -> Result<User, AppError> {
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();

    if let Some(existing) = find_by_google_id(pool, google_id).await? {
        sqlx::query(
            r#"
            UPDATE users
            SET name = ?, email = ?, picture = ?, access_token = ?,
                refresh_token = COALESCE(?, refresh_token), last_login = ?
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(picture)
        .bind(access_token)
        .bind(refresh_token)
        .bind(&now)
        .bind(&existing.id)
        .execute(pool)
        .await?;

        return find_by_id(pool, &existing.id).await?.ok_or(AppError::Internal(
            "Failed to retrieve updated user".to_string(),
        ));
    }

    let id = uuid::Uuid::now_v7().to_string();
    sqlx::query(
        r#"
        INSERT INTO users (id, google_id, name, email, picture, access_token,
                           refresh_token, last_login)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(google_id)
    .bind(name)
    .bind(email)
    .bind(picture)
    .bind(access_token)
    .bind(refresh_token)
    .bind(&now)
    .execute(pool)
    .await?;

    find_by_id(pool, &id).await?.ok_or(AppError::Internal(
        "Failed to retrieve created user".to_string(),
    ))
}

/// Public profiles for a set of ids, for populating comment authors.
pub async fn batch_authors(
    pool: &SqlitePool,
    user_ids: &[String],
) -> Result<Vec<Author>, AppError> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::new("SELECT id, name, email, picture FROM users WHERE id IN (");
    let mut separated = qb.separated(", ");
    for user_id in user_ids {
        separated.push_bind(user_id);
    }
    qb.push(")");

    let authors = qb.build_query_as::<Author>().fetch_all(pool).await?;

    Ok(authors)
}

pub async fn list_bookmarks(pool: &SqlitePool, user_id: &str) -> Result<Vec<Bookmark>, AppError> {
    let bookmarks = sqlx::query_as::<_, Bookmark>(
        "SELECT book_id, page, color FROM bookmarks WHERE user_id = ? ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(bookmarks)
}

/// Add a bookmark, replacing any existing one for the same (book, page).
/// Replacement deletes and re-inserts, so the bookmark moves to the end of
/// the list like the append it is.
pub async fn upsert_bookmark(
    pool: &SqlitePool,
    user_id: &str,
    book_id: &str,
    page: i64,
    color: &str,
) -> Result<Vec<Bookmark>, AppError> {
    sqlx::query("DELETE FROM bookmarks WHERE user_id = ? AND book_id = ? AND page = ?")
        .bind(user_id)
        .bind(book_id)
        .bind(page)
        .execute(pool)
        .await?;

    sqlx::query("INSERT INTO bookmarks (user_id, book_id, page, color) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(book_id)
        .bind(page)
        .bind(color)
        .execute(pool)
        .await?;

    list_bookmarks(pool, user_id).await
}
