//! Subscription gate for chat requests.
//!
//! Callers present `Authorization: Bearer <prefix><jwt>`. The JWT is HS256
//! signed and carries the user's subscriptions; a request passes when the
//! first subscription is active (or in trial) and its period has not lapsed.

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use jwt_compact::alg::{Hs256, Hs256Key};
use jwt_compact::{AlgorithmExt, TimeOptions, UntrustedToken};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;
use crate::error::{ErrorCode, RelayError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub plan_id: String,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub next_period_start: DateTime<Utc>,
}

impl Subscription {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status.as_str(), "ACTIVE" | "TRIAL") && self.next_period_start >= now
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub email: String,
    #[serde(rename = "type")]
    pub user_type: String,
    pub token_id: String,
    #[serde(default)]
    pub subscriptions: Vec<Subscription>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing access token")]
    NoAccessToken,

    #[error("invalid access token: {0}")]
    InvalidAccessToken(String),

    #[error("subscription is not active")]
    SubscriptionNotActive,
}

impl AuthError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoAccessToken => ErrorCode::NoAccessToken,
            Self::InvalidAccessToken(_) => ErrorCode::InvalidAccessToken,
            Self::SubscriptionNotActive => ErrorCode::SubscriptionNotActive,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoAccessToken | Self::InvalidAccessToken(_) => StatusCode::UNAUTHORIZED,
            Self::SubscriptionNotActive => StatusCode::FORBIDDEN,
        }
    }
}

pub struct AuthGate {
    key: Option<Hs256Key>,
    token_prefix: String,
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("enabled", &self.is_enabled())
            .field("token_prefix", &self.token_prefix)
            .finish()
    }
}

impl AuthGate {
    /// A gate that lets every request through without user data.
    pub fn disabled() -> Self {
        Self {
            key: None,
            token_prefix: String::new(),
        }
    }

    pub fn new(secret: &SecretString, token_prefix: impl Into<String>) -> Self {
        Self {
            key: Some(Hs256Key::new(secret.expose_secret().as_bytes())),
            token_prefix: token_prefix.into(),
        }
    }

    /// Build the gate from config, reading the signing secret from the
    /// configured environment variable.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        if !config.enabled {
            return Ok(Self::disabled());
        }
        let secret = std::env::var(&config.jwt_secret_env).map_err(|_| {
            RelayError::config(format!(
                "Environment variable '{}' not set. It must hold the JWT signing secret, \
                 or set auth.enabled = false.",
                config.jwt_secret_env
            ))
        })?;
        Ok(Self::new(&SecretString::from(secret), &config.token_prefix))
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Check an `Authorization` header value. Returns `None` when the gate is
    /// disabled.
    pub fn verify(&self, authorization: Option<&str>, now: DateTime<Utc>) -> std::result::Result<Option<UserData>, AuthError> {
        let Some(key) = &self.key else {
            return Ok(None);
        };

        let token = authorization
            .and_then(|h| h.split_whitespace().nth(1))
            .ok_or(AuthError::NoAccessToken)?;
        let token = token.strip_prefix(self.token_prefix.as_str()).unwrap_or(token);

        let untrusted =
            UntrustedToken::new(token).map_err(|e| AuthError::InvalidAccessToken(e.to_string()))?;
        let token = Hs256
            .validator::<UserData>(key)
            .validate(&untrusted)
            .map_err(|e| AuthError::InvalidAccessToken(e.to_string()))?;

        let claims = token.claims();
        if claims.expiration.is_some() {
            claims
                .validate_expiration(&TimeOptions::default())
                .map_err(|e| AuthError::InvalidAccessToken(e.to_string()))?;
        }

        let user = claims.custom.clone();
        match user.subscriptions.first() {
            Some(subscription) if subscription.is_active(now) => Ok(Some(user)),
            _ => Err(AuthError::SubscriptionNotActive),
        }
    }
}
