use async_trait::async_trait;
use suscridash_types::{LoginRequest, LoginResponse, RegisterRequest, UserDto};

use crate::{app_error::AppResult, domain::entities::principal::AuthToken};

/// Remote identity service.
///
/// `me` fails with `AuthExpired` when the token is rejected and with
/// `Transient` when the service cannot be reached; callers rely on the
/// distinction.
#[async_trait]
pub trait IdentityService: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse>;

    async fn register(&self, req: &RegisterRequest) -> AppResult<LoginResponse>;

    async fn me(&self, token: &AuthToken) -> AppResult<UserDto>;
}
