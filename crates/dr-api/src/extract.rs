use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use dr_core::{AppError, Session};

use crate::error::ApiError;
use crate::AppState;

/// Cookie set by the Supabase browser client, accepted for HTML pages.
const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

/// The verified caller. Rejects with 401 when no valid token is presented.
pub struct AuthSession(pub Session);

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

fn cookie(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|pair| pair.trim().strip_prefix(ACCESS_TOKEN_COOKIE)?.strip_prefix('='))
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(parts)
            .or_else(|| cookie(parts))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("missing access token".into()))?;
        Ok(Self(state.sessions.verify(token)?))
    }
}
