use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{range}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Identity errors
/// - E2xxx: Interest lifecycle and quota errors
/// - E4xxx: Messaging errors
/// - E5xxx: Photo intake errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    RateLimited,
    ServiceUnavailable,
    BadRequest,
    PayloadTooLarge,

    // Identity (E1xxx)
    TokenExpired,
    TokenInvalid,

    // Interests (E2xxx)
    SelfInterest,
    DuplicateActiveInterest,
    InterestCooldownActive,
    InterestNotFound,
    NotAuthorized,
    InvalidStateTransition,
    RateLimitExceeded,

    // Messaging (E4xxx)
    MessagingNotAuthorized,
    EmptyMessage,
    MessageTooLong,

    // Photos (E5xxx)
    PhotoTooSmall,
    PhotoTooLarge,
    UnsupportedMimeType,
    SignatureMismatch,
    DimensionsOutOfRange,
    UndecodableImage,
    PhotoNotFound,
    StorageFailure,
}

/// Coarse error families surfaced to callers so the UI can pick a message style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Authorization,
    StateConflict,
    RateLimited,
    NotFound,
    Dependency,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::RateLimited => "E0006",
            Self::ServiceUnavailable => "E0007",
            Self::BadRequest => "E0008",
            Self::PayloadTooLarge => "E0009",

            // Identity
            Self::TokenExpired => "E1001",
            Self::TokenInvalid => "E1002",

            // Interests
            Self::SelfInterest => "E2001",
            Self::DuplicateActiveInterest => "E2002",
            Self::InterestCooldownActive => "E2003",
            Self::InterestNotFound => "E2004",
            Self::NotAuthorized => "E2005",
            Self::InvalidStateTransition => "E2006",
            Self::RateLimitExceeded => "E2007",

            // Messaging
            Self::MessagingNotAuthorized => "E4001",
            Self::EmptyMessage => "E4002",
            Self::MessageTooLong => "E4003",

            // Photos
            Self::PhotoTooSmall => "E5001",
            Self::PhotoTooLarge => "E5002",
            Self::UnsupportedMimeType => "E5003",
            Self::SignatureMismatch => "E5004",
            Self::DimensionsOutOfRange => "E5005",
            Self::UndecodableImage => "E5006",
            Self::PhotoNotFound => "E5007",
            Self::StorageFailure => "E5008",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ValidationError | Self::BadRequest | Self::PayloadTooLarge
            | Self::SelfInterest | Self::EmptyMessage | Self::MessageTooLong
            | Self::PhotoTooSmall | Self::PhotoTooLarge | Self::UnsupportedMimeType
            | Self::SignatureMismatch | Self::DimensionsOutOfRange
            | Self::UndecodableImage => ErrorCategory::Validation,
            Self::Unauthorized | Self::Forbidden | Self::TokenExpired | Self::TokenInvalid
            | Self::NotAuthorized | Self::MessagingNotAuthorized => ErrorCategory::Authorization,
            Self::DuplicateActiveInterest | Self::InterestCooldownActive
            | Self::InvalidStateTransition => ErrorCategory::StateConflict,
            Self::RateLimited | Self::RateLimitExceeded => ErrorCategory::RateLimited,
            Self::NotFound | Self::InterestNotFound | Self::PhotoNotFound => ErrorCategory::NotFound,
            Self::InternalError | Self::ServiceUnavailable | Self::StorageFailure => {
                ErrorCategory::Dependency
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::PayloadTooLarge | Self::PhotoTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::ServiceUnavailable | Self::StorageFailure => StatusCode::SERVICE_UNAVAILABLE,
            _ => match self.category() {
                ErrorCategory::Validation => StatusCode::BAD_REQUEST,
                ErrorCategory::Authorization => StatusCode::FORBIDDEN,
                ErrorCategory::StateConflict => StatusCode::CONFLICT,
                ErrorCategory::RateLimited => StatusCode::TOO_MANY_REQUESTS,
                ErrorCategory::NotFound => StatusCode::NOT_FOUND,
                ErrorCategory::Dependency => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// The specific code, if this is a known application error.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            AppError::Known { code, .. } => Some(*code),
            AppError::Internal(_) | AppError::Database(_) => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Known { code, .. } => code.category(),
            AppError::Database(diesel::result::Error::NotFound) => ErrorCategory::NotFound,
            AppError::Internal(_) | AppError::Database(_) => ErrorCategory::Dependency,
        }
    }

    pub fn details(&self) -> Option<&serde_json::Value> {
        match self {
            AppError::Known { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "database error"),
                    ),
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_codes_map_to_409() {
        assert_eq!(ErrorCode::DuplicateActiveInterest.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::InvalidStateTransition.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::InterestCooldownActive.category(), ErrorCategory::StateConflict);
    }

    #[test]
    fn quota_and_size_codes_use_dedicated_statuses() {
        assert_eq!(ErrorCode::RateLimitExceeded.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ErrorCode::PhotoTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ErrorCode::PhotoTooLarge.category(), ErrorCategory::Validation);
    }

    #[test]
    fn database_errors_are_dependency_failures() {
        let err = AppError::from(diesel::result::Error::RollbackTransaction);
        assert_eq!(err.category(), ErrorCategory::Dependency);
        assert!(err.code().is_none());
    }

    #[test]
    fn known_error_exposes_details() {
        let err = AppError::with_details(
            ErrorCode::ValidationError,
            "bad photo",
            serde_json::json!([{ "code": "E5003" }]),
        );
        assert_eq!(err.code(), Some(ErrorCode::ValidationError));
        assert!(err.details().is_some());
        assert_eq!(err.to_string(), "bad photo");
    }
}
