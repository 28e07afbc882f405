//! Error types for the HTTP API.
//!
//! Every failure leaves the server as `{"code": "...", "message": "..."}`
//! with a status derived from the code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use optics_core::{CoreError, ValidationError};
use optics_db::DbError;

/// An error response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new("FORBIDDEN", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::new("BAD_REQUEST", message)
    }

    /// Logs the real cause and hides it from the client.
    pub fn internal(cause: impl std::fmt::Display) -> Self {
        error!(error = %cause, "Internal error");
        ApiError::new("INTERNAL_ERROR", "An unexpected error occurred")
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "UNAUTHORIZED" | "INVALID_CREDENTIALS" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" | "ACCOUNT_DISABLED" => StatusCode::FORBIDDEN,
            "DUPLICATE" | "IN_USE" | "CONFLICT" => StatusCode::CONFLICT,
            "VALIDATION_ERROR" => StatusCode::UNPROCESSABLE_ENTITY,
            "INTERNAL_ERROR" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let code = match err {
            ValidationError::Duplicate { .. } => "DUPLICATE",
            _ => "VALIDATION_ERROR",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        if let CoreError::Validation(v) = err {
            return v.into();
        }
        let code = match &err {
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::PaymentExceedsBalance { .. } => "PAYMENT_EXCEEDS_BALANCE",
            CoreError::InvalidPaymentAmount { .. } => "INVALID_PAYMENT_AMOUNT",
            CoreError::EmptyInvoice => "EMPTY_INVOICE",
            CoreError::DiscountExceedsSubtotal { .. } => "DISCOUNT_EXCEEDS_SUBTOTAL",
            CoreError::NoteOfNote { .. } => "NOTE_OF_NOTE",
            CoreError::InUse { .. } => "IN_USE",
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { .. } => ApiError::new("NOT_FOUND", err.to_string()),
            DbError::UniqueViolation { .. } => ApiError::new("DUPLICATE", err.to_string()),
            DbError::ForeignKeyViolation { .. } => {
                ApiError::new("CONFLICT", "The record references or is referenced by another record")
            }
            DbError::Domain(core) => core.into(),
            other => ApiError::internal(other),
        }
    }
}
