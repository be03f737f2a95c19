use suscridash_types::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Session expired. Please sign in again.")]
    AuthExpired,

    #[error("Not allowed for this role")]
    AuthForbidden,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid input: {0}")]
    ValidationFailed(String),

    #[error("Not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    #[error("Service unavailable: {0}")]
    Transient(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::AuthExpired => ErrorCode::AuthExpired,
            AppError::AuthForbidden => ErrorCode::AuthForbidden,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::ValidationFailed(_) => ErrorCode::ValidationFailed,
            AppError::NotFound => ErrorCode::NotFound,
            AppError::Conflict(_) => ErrorCode::Conflict,
            AppError::PaymentDeclined(_) => ErrorCode::PaymentDeclined,
            AppError::Transient(_) => ErrorCode::Transient,
            AppError::Unknown(_) => ErrorCode::Unknown,
        }
    }

    /// Only transport-level failures are worth retrying; a declined card
    /// or a rejected token is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Transient(_))
    }

    /// Failures the access gate handles by redirecting.
    pub fn is_auth(&self) -> bool {
        matches!(self, AppError::AuthExpired | AppError::AuthForbidden)
    }
}

pub type AppResult<T> = Result<T, AppError>;
