use serde::{Deserialize, Serialize};

use crate::models::user::Author;

/// Provenance of a comment's spoiler flag. `User` is authoritative: once
/// set, the asynchronous classifier must never overwrite it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpoilerSource {
    None,
    User,
    Llm,
}

impl SpoilerSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpoilerSource::None => "none",
            SpoilerSource::User => "user",
            SpoilerSource::Llm => "llm",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "user" => SpoilerSource::User,
            "llm" => SpoilerSource::Llm,
            _ => SpoilerSource::None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Spoiler {
    pub is_spoiler: bool,
    pub source: SpoilerSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

/// A comment row as stored. The likedBy/dislikedBy sets live in TEXT columns
/// as JSON arrays of user ids; `version` backs the ledger's optimistic
/// concurrency loop and is bumped by every vote write.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentRow {
    pub id: String,
    pub book_id: String,
    pub user_id: String,
    pub page: Option<i64>,
    pub percent: Option<f64>,
    pub text: String,
    pub likes: i64,
    pub dislikes: i64,
    pub liked_by: String,
    pub disliked_by: String,
    pub created_at: String,
    pub nsfw: bool,
    pub spoiler_is_spoiler: bool,
    pub spoiler_source: String,
    pub spoiler_confidence: Option<f64>,
    pub version: i64,
}

impl CommentRow {
    pub fn liked_by_ids(&self) -> Vec<String> {
        serde_json::from_str(&self.liked_by).unwrap_or_default()
    }

    pub fn disliked_by_ids(&self) -> Vec<String> {
        serde_json::from_str(&self.disliked_by).unwrap_or_default()
    }
}

/// Comment row joined with its author's public profile fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentWithAuthorRow {
    #[sqlx(flatten)]
    pub comment: CommentRow,
    pub author_name: String,
    pub author_email: String,
    pub author_picture: String,
}

/// The author-enriched shape every comment endpoint returns.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: String,
    pub book_id: String,
    pub user_id: String,
    pub user: Author,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    pub text: String,
    pub likes: i64,
    pub dislikes: i64,
    pub liked_by: Vec<String>,
    pub disliked_by: Vec<String>,
    pub created_at: String,
    pub nsfw: bool,
    pub spoiler: Spoiler,
}

impl From<CommentWithAuthorRow> for CommentResponse {
    fn from(row: CommentWithAuthorRow) -> Self {
        let liked_by = row.comment.liked_by_ids();
        let disliked_by = row.comment.disliked_by_ids();
        let c = row.comment;
        Self {
            user: Author {
                id: c.user_id.clone(),
                name: row.author_name,
                email: row.author_email,
                picture: row.author_picture,
            },
            id: c.id,
            book_id: c.book_id,
            user_id: c.user_id,
            page: c.page,
            percent: c.percent,
            text: c.text,
            likes: c.likes,
            dislikes: c.dislikes,
            liked_by,
            disliked_by,
            created_at: c.created_at,
            nsfw: c.nsfw,
            spoiler: Spoiler {
                is_spoiler: c.spoiler_is_spoiler,
                source: SpoilerSource::from_str(&c.spoiler_source),
                confidence: c.spoiler_confidence,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub book_id: String,
    pub user_id: String,
    pub page: Option<i64>,
    pub percent: Option<f64>,
    pub text: String,
    /// Tri-state: Some(true) = author asserts spoiler (authoritative),
    /// Some(false) = author asserts not a spoiler, None = undetermined
    /// (eligible for LLM classification).
    pub user_marked_spoiler: Option<bool>,
    pub book_title: Option<String>,
    pub page_range: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCommentsQuery {
    pub book_id: Option<String>,
    pub page: Option<i64>,
    pub user_id: Option<String>,
}

/// Body of the vote and delete endpoints. `userId` is optional here so a
/// missing field answers 400 instead of a deserialization rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdBody {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatusQuery {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatusResponse {
    pub has_liked: bool,
    pub has_disliked: bool,
}
