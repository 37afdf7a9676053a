//! Credential → user identity resolution.
//!
//! Tokens are HS256 JWTs minted by the platform's auth service with the numeric
//! user id in `sub`. The resolver verifies the token and then checks the user
//! record so deactivated accounts are refused even with a valid token.

use crate::error::AppError;
use crate::models::{UserId, UserIdentity};
use crate::store::SharedStore;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("missing credential")]
    Missing,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("unknown user")]
    UnknownUser,
    #[error("inactive user")]
    InactiveUser,
    #[error("identity lookup unavailable")]
    Unavailable,
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::Unavailable => AppError::Internal,
            _ => AppError::Unauthorized,
        }
    }
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credential: Option<&str>) -> Result<UserIdentity, AuthFailure>;
}

pub type SharedResolver = Arc<dyn IdentityResolver>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id as a decimal string
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

pub struct JwtIdentityResolver {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    store: SharedStore,
}

impl JwtIdentityResolver {
    pub fn new(secret: &str, store: SharedStore) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            store,
        }
    }

    /// Mint an access token for `user_id` valid for `ttl`.
    pub fn issue_token(&self, user_id: UserId, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };
        encode(&Header::new(JWT_ALGORITHM), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "failed to sign token");
            AppError::Internal
        })
    }

    fn user_id_from_token(&self, token: &str) -> Result<UserId, AuthFailure> {
        let validation = Validation::new(JWT_ALGORITHM);
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthFailure::InvalidToken)?;
        data.claims
            .sub
            .parse()
            .map_err(|_| AuthFailure::InvalidToken)
    }
}

#[async_trait]
impl IdentityResolver for JwtIdentityResolver {
    async fn resolve(&self, credential: Option<&str>) -> Result<UserIdentity, AuthFailure> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthFailure::Missing)?;
        let user_id = self.user_id_from_token(token)?;

        let user = self
            .store
            .find_user(user_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, user_id, "identity lookup failed");
                AuthFailure::Unavailable
            })?
            .ok_or(AuthFailure::UnknownUser)?;

        if !user.is_active {
            return Err(AuthFailure::InactiveUser);
        }
        Ok(user)
    }
}
