//! Data access layer. Route handlers call into these modules; nothing else
//! touches SQL.

pub mod comments;
pub mod users;

use sqlx::SqlitePool;

/// Connectivity probe backing `GET /health`.
pub async fn ping(pool: &SqlitePool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}
