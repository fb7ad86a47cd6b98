//! HTTP route handlers.
//!
//! - `auth`: browser-facing Google OAuth flow
//! - `comments`: comment CRUD, moderation pipeline entry, vote ledger
//! - `health`: liveness, db health, metrics snapshot
//! - `users`: user upsert/lookup and bookmarks

pub mod auth;
pub mod comments;
pub mod health;
pub mod users;

pub use auth::*;
pub use comments::*;
pub use health::*;
pub use users::*;
