use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::DbErr;
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Domain-level error taxonomy. Every variant carries a human-readable
/// message; `kind()` is the stable machine-readable tag clients switch on.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    CapacityExceeded(String),
    #[error("{0}")]
    PastDate(String),
    #[error("{0}")]
    SelfBooking(String),
    #[error("{0}")]
    DuplicateBooking(String),
    #[error("{0}")]
    PriceExceedsFareCap(String),
    #[error("{0}")]
    PaymentProviderFailure(String),
    #[error("{0}")]
    InvalidPaymentSignature(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] DbErr),
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::CapacityExceeded(_) => "CAPACITY_EXCEEDED",
            AppError::PastDate(_) => "PAST_DATE",
            AppError::SelfBooking(_) => "SELF_BOOKING",
            AppError::DuplicateBooking(_) => "DUPLICATE_BOOKING",
            AppError::PriceExceedsFareCap(_) => "PRICE_EXCEEDS_FARE_CAP",
            AppError::PaymentProviderFailure(_) => "PAYMENT_PROVIDER_FAILURE",
            AppError::InvalidPaymentSignature(_) => "INVALID_PAYMENT_SIGNATURE",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(_) => "INTERNAL",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Conflict(_) | AppError::DuplicateBooking(_) => StatusCode::CONFLICT,
            AppError::CapacityExceeded(_)
            | AppError::PastDate(_)
            | AppError::SelfBooking(_)
            | AppError::PriceExceedsFareCap(_)
            | AppError::InvalidPaymentSignature(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PaymentProviderFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "{}", self);
        }

        // Internal details stay out of the response body.
        let message = match &self {
            AppError::Database(_) => "internal error".to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.kind(),
            "message": message,
        }));

        (status, body).into_response()
    }
}
