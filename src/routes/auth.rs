//! Browser-facing Google OAuth flow.
//!
//! `GET /users/auth/google` sends the browser to Google's consent screen;
//! the callback exchanges the code for tokens, fetches the profile, upserts
//! the user and redirects back to the frontend with a 7-day session JWT.
//! Every failure path redirects to the login page with `?error=oauth_failed`
//! rather than answering an error status.

use axum::{
    extract::{Query, State},
    response::Redirect,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::{db, error::AppError, models::User, routes::comments::AppState};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub name: String,
    pub email: String,
    pub picture: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    name: String,
    email: String,
    picture: String,
}

fn login_fail_redirect(state: &AppState) -> Redirect {
    Redirect::to(&format!(
        "{}?error=oauth_failed",
        state.config.frontend_login_url
    ))
}

/// `GET /users/auth/google`
pub async fn auth_google(State(state): State<AppState>) -> Redirect {
    let Some(client_id) = state.config.google_client_id.as_deref() else {
        tracing::error!("GOOGLE_CLIENT_ID not configured, cannot start OAuth flow");
        return login_fail_redirect(&state);
    };

    let url = match reqwest::Url::parse_with_params(
        GOOGLE_AUTH_URL,
        &[
            ("client_id", client_id),
            ("redirect_uri", &state.config.oauth_redirect_uri),
            ("response_type", "code"),
            ("scope", "profile email"),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    ) {
        Ok(url) => url,
        Err(e) => {
            tracing::error!("Failed to build Google auth URL: {}", e);
            return login_fail_redirect(&state);
        }
    };

    Redirect::to(url.as_str())
}

/// `GET /users/auth/google/callback`
pub async fn auth_google_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Redirect {
    if query.error.is_some() {
        return login_fail_redirect(&state);
    }
    let Some(code) = query.code else {
        return login_fail_redirect(&state);
    };

    match complete_login(&state, &code).await {
        Ok(redirect) => redirect,
        Err(e) => {
            tracing::error!("Google OAuth callback failed: {}", e);
            login_fail_redirect(&state)
        }
    }
}

async fn complete_login(state: &AppState, code: &str) -> Result<Redirect, AppError> {
    let client_id = state
        .config
        .google_client_id
        .as_deref()
        .ok_or_else(|| AppError::Internal("GOOGLE_CLIENT_ID not configured".to_string()))?;
    let client_secret = state
        .config
        .google_client_secret
        .as_deref()
        .ok_or_else(|| AppError::Internal("GOOGLE_CLIENT_SECRET not configured".to_string()))?;

    let tokens: TokenResponse = state
        .http
        .post(GOOGLE_TOKEN_URL)
        .form(&[
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", &state.config.oauth_redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| AppError::Internal(format!("Token exchange failed: {}", e)))?
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("Malformed token response: {}", e)))?;

    let info: GoogleUserInfo = state
        .http
        .get(GOOGLE_USERINFO_URL)
        .bearer_auth(&tokens.access_token)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| AppError::Internal(format!("Userinfo fetch failed: {}", e)))?
        .json()
        .await
        .map_err(|e| AppError::Internal(format!("Malformed userinfo response: {}", e)))?;

    let user = db::users::upsert_google_user(
        &state.pool,
        &info.id,
        &info.name,
        &info.email,
        &info.picture,
        &tokens.access_token,
        tokens.refresh_token.as_deref(),
    )
    .await?;

    let token = mint_session_token(&user, &state.config.jwt_secret)
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

    let url = reqwest::Url::parse_with_params(
        &state.config.frontend_reading_url,
        &[("token", token.as_str())],
    )
    .map_err(|e| AppError::Internal(format!("Failed to build redirect URL: {}", e)))?;

    Ok(Redirect::to(url.as_str()))
}

pub fn mint_session_token(
    user: &User,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = SessionClaims {
        sub: user.id.clone(),
        name: user.name.clone(),
        email: user.email.clone(),
        picture: user.picture.clone(),
        iat: now.timestamp(),
        exp: (now + Duration::days(7)).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
