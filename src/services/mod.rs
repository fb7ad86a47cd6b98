//! External moderation collaborators. Both fail open: an unavailable or
//! misconfigured provider degrades the feature, never the request.

pub mod moderation;
pub mod spoiler;
