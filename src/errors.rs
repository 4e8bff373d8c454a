use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Standard error body returned for non-rejection failures.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

/// Machine-readable reason attached to an instrument rejection.
///
/// The stable part of the contract is the `field` on [`Rejection`]; the
/// reason enum is a finer-grained extension callers may ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionReason {
    NotFound,
    NotAvailableInChannel,
    NotStarted,
    Expired,
    UsageLimitReached,
}

/// Structured rejection for an applied promotional instrument.
///
/// `field` identifies the form input the calling layer should attach the
/// error to (vouchers always reject with `"promoCode"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Rejection {
    pub field: String,
    pub reason: RejectionReason,
}

impl Rejection {
    pub fn promo_code(reason: RejectionReason) -> Self {
        Self {
            field: "promoCode".to_string(),
            reason,
        }
    }

    pub fn gift_card_code(reason: RejectionReason) -> Self {
        Self {
            field: "giftCardCode".to_string(),
            reason,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.field, self.reason)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Instrument rejected on {0}")]
    Rejected(Rejection),

    #[error("Currency mismatch: expected {expected}, got {actual}")]
    CurrencyMismatch { expected: String, actual: String },

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Gift card expired: {0}")]
    Expired(String),

    #[error("Consent required: {0}")]
    ConsentRequired(String),

    #[error("Concurrent modification: {0}")]
    ConcurrencyConflict(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            Self::Rejected(_)
            | Self::CurrencyMismatch { .. }
            | Self::InsufficientBalance { .. }
            | Self::Expired(_)
            | Self::ConsentRequired(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ExternalServiceError(_) => StatusCode::BAD_GATEWAY,
            Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message suitable for HTTP responses. Internal errors return generic
    /// messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Rejections keep their structured {field, reason} shape so the
        // caller can attach the error to the right form input.
        if let ServiceError::Rejected(rejection) = self {
            return (status, Json(rejection)).into_response();
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: timestamp(),
        };

        (status, Json(err)).into_response()
    }
}
