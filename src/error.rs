use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::intake::IntakeError;
use crate::nonce::NonceError;
use crate::repo::RepoError;
use crate::validation::{Field, ValidationError};

/// JSON error envelope: machine kind, human message, HTTP status.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Security check failed. Please refresh the page and try again.")] InvalidNonce,
    #[error("{0}")] Validation(ValidationError),
    #[error("Please wait {wait_secs} seconds before submitting another feedback.")] RateLimited { wait_secs: u64 },
    #[error("Failed to save feedback. Please try again.")] Storage,
    #[error("Authorization required.")] Unauthorized,
    #[error("Permission denied.")] Forbidden,
    #[error("{0}")] BadRequest(&'static str),
    #[error("{0}")] NotFound(&'static str),
    #[error("Something went wrong. Please try again.")] Internal,
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidNonce => "invalid_nonce",
            ApiError::Validation(_) => "invalid_field",
            ApiError::RateLimited { .. } => "rate_limit",
            ApiError::Storage => "database_error",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Forbidden => "forbidden",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal => "internal",
        }
    }

    fn field(&self) -> Option<Field> {
        match self {
            ApiError::Validation(e) => Some(e.field),
            _ => None,
        }
    }
}

impl From<IntakeError> for ApiError {
    fn from(e: IntakeError) -> Self {
        match e {
            IntakeError::Auth => ApiError::InvalidNonce,
            IntakeError::Validation(v) => ApiError::Validation(v),
            IntakeError::RateLimited { wait_secs } => ApiError::RateLimited { wait_secs },
            IntakeError::Storage(_) => ApiError::Storage,
        }
    }
}

impl From<NonceError> for ApiError {
    fn from(e: NonceError) -> Self {
        match e {
            NonceError::Signing => ApiError::Internal,
            _ => ApiError::InvalidNonce,
        }
    }
}

// Admin-path storage failures: detail is logged at the call site, never returned.
impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound("Not found."),
            RepoError::Timeout | RepoError::Internal(_) => ApiError::Internal,
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidNonce | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Storage | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ApiErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
            status: status.as_u16(),
            field: self.field().map(|f| f.as_str().to_string()),
        })
    }
}
