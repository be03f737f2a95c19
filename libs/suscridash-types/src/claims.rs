use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::JwtError;

/// Claims carried by access tokens issued by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Principal ID
    pub user_id: String,

    /// Login email
    pub email: String,

    /// Role name as issued (e.g., "admin", "business", "customer")
    pub user_type: String,

    /// Token expiration (Unix timestamp)
    pub exp: i64,
}

impl TokenClaims {
    /// Whether the token is past its expiry at `now` (Unix seconds), allowing
    /// `clock_skew_seconds` of tolerance.
    pub fn is_expired_at(&self, now: i64, clock_skew_seconds: u64) -> bool {
        let skew = i64::try_from(clock_skew_seconds).unwrap_or(i64::MAX);
        self.exp.saturating_add(skew) < now
    }
}

/// Peeks at the claims of an access token without verifying its signature.
///
/// # Security Note
/// This function does NOT verify the token. The client never holds the
/// signing secret; the result is only good for a local expiry pre-check
/// before the token is round-tripped to the identity service.
pub fn peek_claims(token: &str) -> Result<TokenClaims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;

    let token_data = decode::<TokenClaims>(token, &DecodingKey::from_secret(b"ignored"), &validation)?;

    if token_data.claims.user_id.is_empty() {
        return Err(JwtError::MissingClaim("user_id".into()));
    }

    Ok(token_data.claims)
}
