//! Application configuration, read once from the environment at startup.
//!
//! Required: `DATABASE_URL`, `JWT_SECRET`. Everything else has a default or
//! is optional — a missing moderation API key disables that feature rather
//! than failing startup (fail open).

use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite database path (e.g. "sqlite:data/reado.db")
    pub database_url: String,
    /// Secret for signing the session JWT minted by the OAuth callback
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    /// Admission ceiling: requests in flight beyond this are rejected with 503
    pub max_concurrent_requests: usize,
    /// Wall-clock deadline per request, in milliseconds
    pub request_timeout_ms: u64,
    /// Perspective API key; None disables toxicity screening
    pub perspective_api_key: Option<String>,
    /// OpenRouter API key; None disables LLM spoiler classification
    pub openrouter_api_key: Option<String>,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub oauth_redirect_uri: String,
    /// Where the OAuth callback sends the browser on success
    pub frontend_reading_url: String,
    /// Where the OAuth callback sends the browser on failure
    pub frontend_login_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")?,
            jwt_secret: env::var("JWT_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "5001".to_string())
                .parse()
                .unwrap_or(5001),
            max_concurrent_requests: env::var("MAX_CONCURRENT_REQUESTS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .unwrap_or(20),
            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),
            perspective_api_key: env::var("PERSPECTIVE_API_KEY").ok(),
            openrouter_api_key: env::var("OPENROUTER_API_KEY").ok(),
            google_client_id: env::var("GOOGLE_CLIENT_ID").ok(),
            google_client_secret: env::var("GOOGLE_CLIENT_SECRET").ok(),
            oauth_redirect_uri: env::var("OAUTH_REDIRECT_URI")
                .unwrap_or_else(|_| "http://localhost:5001/users/auth/google/callback".to_string()),
            frontend_reading_url: env::var("FRONTEND_READING_URL")
                .unwrap_or_else(|_| "http://localhost:3000/reading".to_string()),
            frontend_login_url: env::var("FRONTEND_LOGIN_URL")
                .unwrap_or_else(|_| "http://localhost:3000/login".to_string()),
        })
    }
}
