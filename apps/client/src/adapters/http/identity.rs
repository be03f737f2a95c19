use async_trait::async_trait;
use reqwest::Method;
use suscridash_types::{LoginRequest, LoginResponse, MeResponse, RegisterRequest, UserDto};

use crate::{
    adapters::http::api_client::{ApiClient, Unauthorized},
    app_error::AppResult,
    application::ports::identity_service::IdentityService,
    domain::entities::principal::AuthToken,
};

/// Identity service reached over `/auth/*`.
#[derive(Clone)]
pub struct HttpIdentityService {
    api: ApiClient,
}

impl HttpIdentityService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let request = self.api.request(Method::POST, "auth/login")?.json(req);
        self.api.send_json(request, Unauthorized::BadCredentials).await
    }

    async fn register(&self, req: &RegisterRequest) -> AppResult<LoginResponse> {
        let request = self.api.request(Method::POST, "auth/register")?.json(req);
        self.api.send_json(request, Unauthorized::BadCredentials).await
    }

    async fn me(&self, token: &AuthToken) -> AppResult<UserDto> {
        let request = self.api.authorized(Method::GET, "auth/me", token)?;
        let me: MeResponse = self
            .api
            .send_json(request, Unauthorized::SessionExpired)
            .await?;
        Ok(me.user)
    }
}
