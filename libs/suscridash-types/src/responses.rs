use serde::{Deserialize, Serialize};

use crate::Role;

/// User as returned by the identity service (`/auth/login`, `/auth/me`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    /// User ID
    pub id: String,

    /// Login email
    pub email: String,

    /// Display name
    pub name: String,

    /// Role (`admin`, `business`, `customer`)
    pub user_type: Role,

    /// Legal name, only meaningful for business users (sent as "" otherwise)
    #[serde(default)]
    pub business_name: Option<String>,

    /// Tax ID, only meaningful for business users (sent as "" otherwise)
    #[serde(default)]
    pub tax_id: Option<String>,
}

impl UserDto {
    pub fn business_name(&self) -> Option<&str> {
        self.business_name.as_deref().filter(|s| !s.is_empty())
    }

    pub fn tax_id(&self) -> Option<&str> {
        self.tax_id.as_deref().filter(|s| !s.is_empty())
    }
}

/// `POST /auth/login` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "userType")]
    pub user_type: Role,
}

/// `POST /auth/login` and `POST /auth/register` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub user: UserDto,
}

/// `GET /auth/me` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user: UserDto,
}

/// `POST /auth/register` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub user_type: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
}
