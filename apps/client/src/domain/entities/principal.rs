use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use suscridash_types::{Role, UserDto};

/// Bearer token issued by the identity service.
///
/// Cheap to clone; the secret is shared, never copied, and never printed.
#[derive(Clone)]
pub struct AuthToken(Arc<SecretString>);

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        let token: String = token.into();
        Self(Arc::new(SecretString::new(token.into())))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().trim().is_empty()
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AuthToken([REDACTED])")
    }
}

impl PartialEq for AuthToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for AuthToken {}

/// The authenticated identity driving authorization decisions.
///
/// Replaced wholesale on login, re-verification or logout; never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    /// Present for business principals only
    pub business_name: Option<String>,
    /// Present for business principals only
    pub tax_id: Option<String>,
    pub auth_token: AuthToken,
}

impl Principal {
    pub fn from_user(user: UserDto, auth_token: AuthToken) -> Self {
        let business_name = user.business_name().map(str::to_string);
        let tax_id = user.tax_id().map(str::to_string);
        Self {
            id: user.id,
            display_name: user.name,
            email: user.email,
            role: user.user_type,
            business_name,
            tax_id,
            auth_token,
        }
    }

    /// Wire representation, used when persisting the session.
    pub fn to_user(&self) -> UserDto {
        UserDto {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.display_name.clone(),
            user_type: self.role,
            business_name: self.business_name.clone(),
            tax_id: self.tax_id.clone(),
        }
    }

    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }

    /// Same identity as `other`, ignoring the token it was verified with.
    pub fn same_identity(&self, other: &Principal) -> bool {
        self.id == other.id && self.role == other.role
    }
}
