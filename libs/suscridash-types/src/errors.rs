use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error categories surfaced by the client core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthExpired,
    AuthForbidden,
    InvalidCredentials,
    ValidationFailed,
    NotFound,
    Conflict,
    PaymentDeclined,
    Transient,
    Unknown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthExpired => "AUTH_EXPIRED",
            Self::AuthForbidden => "AUTH_FORBIDDEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::PaymentDeclined => "PAYMENT_DECLINED",
            Self::Transient => "TRANSIENT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured error body returned by the identity and catalog services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}

/// JWT decoding errors.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Missing required claim: {0}")]
    MissingClaim(String),

    #[error("JWT library error: {0}")]
    Library(#[from] jsonwebtoken::errors::Error),
}
