use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::{accounts::StoreError, auth::jwt::TokenError};

/// Development mode exposes internal error detail in responses. Set once at
/// startup.
static DEVELOPMENT: std::sync::OnceLock<bool> = std::sync::OnceLock::new();

pub fn set_development_mode(on: bool) {
    let _ = DEVELOPMENT.set(on);
}

fn development_mode() -> bool {
    DEVELOPMENT.get().copied().unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("Email is already in use")]
    DuplicateEmail,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    AccountDisabled,

    #[error("Access denied. No token provided.")]
    TokenMissing,

    #[error("Access denied. Invalid token.")]
    TokenInvalid,

    #[error("Access denied. Token expired.")]
    TokenExpired,

    #[error("Access denied. Invalid token or user not found.")]
    AccountUnavailable,

    #[error("Access denied. Insufficient privileges.")]
    Forbidden,

    #[error("Article is already in favorites")]
    AlreadyFavorited,

    #[error("Too many attempts. Please try again later.")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication required before authorization check")]
    GateMisuse,

    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::DuplicateEmail | AppError::AlreadyFavorited => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidCredentials
            | AppError::AccountDisabled
            | AppError::TokenMissing
            | AppError::TokenInvalid
            | AppError::TokenExpired
            | AppError::AccountUnavailable => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::GateMisuse | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError {
            field,
            message: message.into(),
        }])
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = ErrorBody {
            success: false,
            message: self.to_string(),
            errors: None,
            retry_after: None,
            error: None,
        };

        match &self {
            AppError::Validation(errors) => body.errors = Some(errors.clone()),
            AppError::RateLimited { retry_after_secs } => {
                body.retry_after = Some(*retry_after_secs)
            }
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                if development_mode() {
                    body.error = Some(format!("{e:#}"));
                }
            }
            AppError::GateMisuse => error!("role gate ran without an authenticated account"),
            _ => warn!(status = %status, message = %body.message, "request rejected"),
        }

        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(v) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, v);
            }
        }
        response
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            StoreError::NotFound => AppError::NotFound("User"),
            // The resolved store already replays on the volatile backend, so
            // this only surfaces if the fallback itself failed.
            StoreError::Unavailable(reason) => {
                AppError::Internal(anyhow::anyhow!("store unavailable: {reason}"))
            }
            StoreError::Hash(e) => AppError::Internal(e.into()),
            StoreError::Internal(e) => AppError::Internal(e),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Malformed => AppError::TokenInvalid,
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Signing(msg) => AppError::Internal(anyhow::anyhow!(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::validation("email", "bad").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::DuplicateEmail.status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotFound("User").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::AlreadyFavorited.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::RateLimited { retry_after_secs: 3 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(AppError::GateMisuse.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn token_errors_keep_distinct_messages() {
        let invalid: AppError = TokenError::Malformed.into();
        let expired: AppError = TokenError::Expired.into();
        assert_ne!(invalid.to_string(), expired.to_string());
        assert_eq!(invalid.status_code(), expired.status_code());
    }

    #[test]
    fn rate_limited_sets_retry_after_header() {
        let res = AppError::RateLimited { retry_after_secs: 12 }.into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers().get(header::RETRY_AFTER).unwrap(), "12");
    }

    #[test]
    fn internal_detail_hidden_by_default() {
        let err = AppError::Internal(anyhow::anyhow!("connection string leaked"));
        assert_eq!(err.to_string(), "Internal server error");
    }
}
