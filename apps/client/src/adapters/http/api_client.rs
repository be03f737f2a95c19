use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use suscridash_types::ApiErrorBody;
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::principal::AuthToken,
};

/// How a 401 is read for a given endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unauthorized {
    /// The bearer token was rejected
    SessionExpired,
    /// The submitted email/password pair was rejected
    BadCredentials,
}

/// Shared JSON-over-HTTP plumbing for the REST collaborators.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(client: Client, mut base_url: Url) -> Self {
        // Url::join replaces the last segment unless the base ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self { client, base_url }
    }

    pub fn url(&self, path: &str) -> AppResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| AppError::Unknown(format!("Invalid endpoint {}: {}", path, e)))
    }

    /// URL of one member of a collection; `id` becomes a single
    /// percent-encoded path segment.
    pub fn resource_url(&self, collection: &str, id: &str) -> AppResult<Url> {
        if id.is_empty() || id == "." || id == ".." {
            return Err(AppError::ValidationFailed(format!(
                "Invalid identifier {:?}",
                id
            )));
        }
        let mut url = self.url(collection)?;
        url.path_segments_mut()
            .map_err(|_| AppError::Unknown(format!("Invalid endpoint {}", collection)))?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    pub fn request(&self, method: Method, path: &str) -> AppResult<RequestBuilder> {
        Ok(self.client.request(method, self.url(path)?))
    }

    pub fn authorized(
        &self,
        method: Method,
        path: &str,
        token: &AuthToken,
    ) -> AppResult<RequestBuilder> {
        Ok(self.authorized_at(method, self.url(path)?, token))
    }

    pub fn authorized_at(&self, method: Method, url: Url, token: &AuthToken) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(token.expose())
    }

    /// Send and decode a JSON body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        on_401: Unauthorized,
    ) -> AppResult<T> {
        let response = request.send().await.map_err(transport_error)?;
        let body = read_success(response, on_401).await?;

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse service response");
            AppError::Unknown(format!("Failed to parse service response: {}", e))
        })
    }

    /// Send and ignore the body of a successful response.
    pub async fn send_empty(&self, request: RequestBuilder) -> AppResult<()> {
        let response = request.send().await.map_err(transport_error)?;
        read_success(response, Unauthorized::SessionExpired).await?;
        Ok(())
    }
}

async fn read_success(response: Response, on_401: Unauthorized) -> AppResult<String> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if status.is_success() {
        return Ok(body);
    }

    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("").to_string());
    let err = error_for_status(status, message, on_401);
    if matches!(err, AppError::Unknown(_) | AppError::Transient(_)) {
        tracing::warn!(status = %status, error = %err, "Service returned an error");
    } else {
        tracing::debug!(status = %status, error = %err, "Service rejected the request");
    }
    Err(err)
}

/// Map a non-success status to the error taxonomy.
pub fn error_for_status(status: StatusCode, message: String, on_401: Unauthorized) -> AppError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            AppError::ValidationFailed(message)
        }
        StatusCode::UNAUTHORIZED => match on_401 {
            Unauthorized::SessionExpired => AppError::AuthExpired,
            Unauthorized::BadCredentials => AppError::InvalidCredentials,
        },
        StatusCode::FORBIDDEN => AppError::AuthForbidden,
        StatusCode::NOT_FOUND => AppError::NotFound,
        StatusCode::CONFLICT => AppError::Conflict(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            AppError::Transient(format!("{}: {}", status, message))
        }
        s if s.is_server_error() => AppError::Transient(format!("{}: {}", status, message)),
        _ => AppError::Unknown(format!("{}: {}", status, message)),
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() {
        AppError::Transient(format!("Request failed: {}", e))
    } else {
        AppError::Unknown(format!("Request failed: {}", e))
    }
}
