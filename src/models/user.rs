use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub google_id: String,
    pub name: String,
    pub email: String,
    pub picture: String,
    #[serde(skip_serializing)]
    pub access_token: String,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expiry: Option<String>,
    pub created_at: String,
    pub last_login: String,
}

/// Public profile shape, with the OAuth secrets stripped.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub google_id: String,
    pub name: String,
    pub email: String,
    pub picture: String,
    pub created_at: String,
    pub last_login: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            google_id: user.google_id,
            name: user.name,
            email: user.email,
            picture: user.picture,
            created_at: user.created_at,
            last_login: user.last_login,
        }
    }
}

/// The subset of a user embedded in comment responses and batch lookups.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub email: String,
    pub picture: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleAuthRequest {
    pub google_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub picture: Option<String>,
    pub access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUsersRequest {
    pub user_ids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub book_id: String,
    pub page: i64,
    pub color: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookmarkRequest {
    pub book_id: Option<String>,
    pub page: Option<i64>,
    pub color: Option<String>,
}
