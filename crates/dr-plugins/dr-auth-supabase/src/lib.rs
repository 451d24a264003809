//! # dr-auth-supabase
//!
//! Verifies Supabase access tokens (HS256, signed with the project's JWT
//! secret). The `sub` claim is the owning user id for every row we store.

use chrono::Utc;
use dr_core::{AppError, Result, Session, SessionVerifier};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    aud: String,
    exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
}

pub struct SupabaseVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
    audience: String,
}

impl SupabaseVerifier {
    pub fn new(secret: &SecretString, audience: &str) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "sub", "aud"]);
        Self {
            decoding: DecodingKey::from_secret(bytes),
            encoding: EncodingKey::from_secret(bytes),
            validation,
            audience: audience.to_string(),
        }
    }

    /// Mints a token the way the Supabase auth server would; for local
    /// tooling and tests.
    pub fn issue(&self, user_id: Uuid, email: Option<&str>, ttl_secs: i64) -> Result<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            aud: self.audience.clone(),
            exp: Utc::now().timestamp() + ttl_secs,
            email: email.map(str::to_string),
            role: Some("authenticated".to_string()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("could not sign token: {e}")))
    }
}

impl SessionVerifier for SupabaseVerifier {
    fn verify(&self, token: &str) -> Result<Session> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            debug!(error = %e, "token rejected");
            let reason = match e.kind() {
                ErrorKind::ExpiredSignature => "token expired",
                ErrorKind::InvalidAudience => "token audience mismatch",
                ErrorKind::InvalidSignature => "invalid token signature",
                _ => "invalid token",
            };
            AppError::Unauthorized(reason.to_string())
        })?;

        let user_id = data
            .claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| AppError::Unauthorized("subject is not a user id".into()))?;

        Ok(Session { user_id, email: data.claims.email, role: data.claims.role })
    }
}
