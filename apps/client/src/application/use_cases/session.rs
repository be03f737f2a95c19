use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use suscridash_types::{LoginRequest, LoginResponse, RegisterRequest, Role, peek_claims};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        identity_service::IdentityService,
        session_storage::{SessionStorage, StoredSession},
    },
    domain::entities::principal::{AuthToken, Principal},
    validators::{validate_login, validate_registration},
};

// ============================================================================
// Identity Store
// ============================================================================

/// Holds the current principal for the lifetime of the client session.
///
/// Many readers, one writer: only the session use cases in this module
/// replace or clear it. Writers are serialized so memory and storage never
/// disagree about which session is current.
pub struct IdentityStore {
    current: RwLock<Option<Arc<Principal>>>,
    write_lock: Mutex<()>,
    storage: Arc<dyn SessionStorage>,
}

impl IdentityStore {
    pub fn new(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            current: RwLock::new(None),
            write_lock: Mutex::new(()),
            storage,
        }
    }

    pub fn current(&self) -> Option<Arc<Principal>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, principal: Option<Arc<Principal>>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = principal;
    }

    fn holds(&self, token: &AuthToken) -> bool {
        self.current()
            .is_some_and(|p| p.auth_token == *token)
    }

    /// Load a persisted session into memory if nothing is held yet.
    ///
    /// An unreadable store reads as logged out.
    async fn restore(&self) -> Option<Arc<Principal>> {
        let _guard = self.write_lock.lock().await;
        if let Some(current) = self.current() {
            return Some(current);
        }

        match self.storage.load().await {
            Ok(Some(stored)) => {
                let token = AuthToken::new(stored.access_token);
                if token.is_empty() {
                    return None;
                }
                let principal = Arc::new(Principal::from_user(stored.user, token));
                self.set(Some(principal.clone()));
                debug!(user_id = %principal.id, "Restored persisted session");
                Some(principal)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = ?e, "Could not read persisted session");
                None
            }
        }
    }

    /// Persist `principal`, then make it current. A failed save leaves
    /// the previous session in place.
    async fn persist_and_set(&self, principal: Principal) -> AppResult<Arc<Principal>> {
        let stored = StoredSession {
            access_token: principal.auth_token.expose().to_string(),
            user: principal.to_user(),
        };
        self.storage.save(&stored).await?;

        let principal = Arc::new(principal);
        self.set(Some(principal.clone()));
        Ok(principal)
    }

    async fn replace(&self, principal: Principal) -> AppResult<Arc<Principal>> {
        let _guard = self.write_lock.lock().await;
        self.persist_and_set(principal).await
    }

    /// Swap in a re-verified principal, unless another writer replaced the
    /// session while verification was in flight.
    async fn refresh(&self, principal: Principal) -> AppResult<Option<Arc<Principal>>> {
        if !self.holds(&principal.auth_token) {
            return Ok(None);
        }
        let _guard = self.write_lock.lock().await;
        if !self.holds(&principal.auth_token) {
            return Ok(None);
        }
        self.persist_and_set(principal).await.map(Some)
    }

    async fn clear(&self) -> AppResult<()> {
        let _guard = self.write_lock.lock().await;
        self.set(None);
        self.storage.clear().await
    }

    /// Clear the session only if it still belongs to `token`.
    ///
    /// Memory is cleared even when clearing storage fails. Returns whether
    /// anything was cleared.
    pub async fn clear_if_current(&self, token: &AuthToken) -> AppResult<bool> {
        let _guard = self.write_lock.lock().await;
        if !self.holds(token) {
            return Ok(false);
        }
        self.set(None);
        self.storage.clear().await?;
        Ok(true)
    }
}

// ============================================================================
// Session Verifier
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct VerifierSettings {
    /// Upper bound on a single round-trip to the identity service
    pub timeout: Duration,
    /// Silent retries after a transient failure
    pub max_retries: u32,
    pub clock_skew_secs: u64,
    /// Base delay between retries, multiplied by the attempt number
    pub retry_backoff: Duration,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            max_retries: 2,
            clock_skew_secs: 60,
            retry_backoff: Duration::from_millis(200),
        }
    }
}

/// Confirms the stored token is still live before protected navigation.
#[derive(Clone)]
pub struct SessionVerifier {
    identity: Arc<dyn IdentityService>,
    store: Arc<IdentityStore>,
    settings: VerifierSettings,
}

impl SessionVerifier {
    pub fn new(
        identity: Arc<dyn IdentityService>,
        store: Arc<IdentityStore>,
        settings: VerifierSettings,
    ) -> Self {
        Self {
            identity,
            store,
            settings,
        }
    }

    /// Verify the current session.
    ///
    /// `Ok(None)` means logged out. A rejected token clears the session and
    /// yields `AuthExpired`; an unreachable service yields `Transient` after
    /// the retry budget and keeps the session.
    #[instrument(skip(self))]
    pub async fn verify(&self) -> AppResult<Option<Arc<Principal>>> {
        let Some(current) = self.store.restore().await else {
            return Ok(None);
        };
        let token = current.auth_token.clone();

        if self.expired_locally(&token) {
            info!(user_id = %current.id, "Token expired locally, clearing session");
            self.reject(&token).await;
            return Err(AppError::AuthExpired);
        }

        let user = match self.fetch_me(&token).await {
            Ok(user) => user,
            Err(AppError::AuthExpired | AppError::InvalidCredentials) => {
                info!(user_id = %current.id, "Token rejected by identity service");
                self.reject(&token).await;
                return Err(AppError::AuthExpired);
            }
            Err(e) => return Err(e),
        };

        let verified = Principal::from_user(user, token);
        if verified == *current {
            return Ok(Some(current));
        }

        if !verified.same_identity(&current) {
            warn!(
                user_id = %current.id,
                verified_id = %verified.id,
                "Identity service returned a different principal for the stored token"
            );
        }

        match self.store.refresh(verified).await? {
            Some(principal) => Ok(Some(principal)),
            // Replaced by a concurrent login/logout; report what is current now.
            None => Ok(self.store.current()),
        }
    }

    fn expired_locally(&self, token: &AuthToken) -> bool {
        match peek_claims(token.expose()) {
            Ok(claims) => claims.is_expired_at(Utc::now().timestamp(), self.settings.clock_skew_secs),
            Err(e) => {
                debug!(error = %e, "Token is not a readable JWT, skipping local expiry check");
                false
            }
        }
    }

    async fn fetch_me(&self, token: &AuthToken) -> AppResult<suscridash_types::UserDto> {
        let mut attempt = 0;
        loop {
            let result = match tokio::time::timeout(self.settings.timeout, self.identity.me(token)).await
            {
                Ok(result) => result,
                Err(_) => Err(AppError::Transient("Session verification timed out".into())),
            };

            match result {
                Err(e) if e.is_retryable() && attempt < self.settings.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %e, "Session verification failed, retrying");
                    tokio::time::sleep(self.settings.retry_backoff * attempt).await;
                }
                other => return other,
            }
        }
    }

    async fn reject(&self, token: &AuthToken) {
        if let Err(e) = self.store.clear_if_current(token).await {
            // Memory is already cleared at this point.
            error!(error = ?e, "Failed to clear persisted session");
        }
    }
}

// ============================================================================
// Login / Register / Logout
// ============================================================================

#[derive(Clone)]
pub struct AuthUseCases {
    identity: Arc<dyn IdentityService>,
    store: Arc<IdentityStore>,
}

impl AuthUseCases {
    pub fn new(identity: Arc<dyn IdentityService>, store: Arc<IdentityStore>) -> Self {
        Self { identity, store }
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str, role: Role) -> AppResult<Arc<Principal>> {
        validate_login(email, password)?;

        let response = self
            .identity
            .login(&LoginRequest {
                email: email.trim().to_string(),
                password: password.to_string(),
                user_type: role,
            })
            .await?;

        let principal = self.establish(response).await?;
        info!(user_id = %principal.id, role = %principal.role, "Signed in");
        Ok(principal)
    }

    #[instrument(skip(self, req), fields(email = %req.email, role = %req.user_type))]
    pub async fn register(
        &self,
        req: &RegisterRequest,
        terms_accepted: bool,
    ) -> AppResult<Arc<Principal>> {
        validate_registration(req, terms_accepted)?;

        let response = self.identity.register(req).await?;
        let principal = self.establish(response).await?;
        info!(user_id = %principal.id, "Registered");
        Ok(principal)
    }

    #[instrument(skip(self))]
    pub async fn logout(&self) -> AppResult<()> {
        self.store.clear().await?;
        info!("Signed out");
        Ok(())
    }

    async fn establish(&self, response: LoginResponse) -> AppResult<Arc<Principal>> {
        let token = AuthToken::new(response.access_token);
        if token.is_empty() {
            return Err(AppError::Unknown("Identity service returned an empty token".into()));
        }
        self.store
            .replace(Principal::from_user(response.user, token))
            .await
    }
}
