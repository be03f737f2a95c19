//! In-memory mock implementations of the identity service and session
//! storage ports.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use suscridash_types::{LoginRequest, LoginResponse, RegisterRequest, UserDto};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::{
        identity_service::IdentityService,
        session_storage::{SessionStorage, StoredSession},
    },
    domain::entities::principal::AuthToken,
};

// ============================================================================
// InMemoryIdentityService
// ============================================================================

struct Account {
    email: String,
    password: String,
    user: UserDto,
}

/// In-memory implementation of IdentityService for testing.
///
/// Issues opaque tokens. `me` can be scripted to fail or to stall.
#[derive(Default)]
pub struct InMemoryIdentityService {
    accounts: Mutex<Vec<Account>>,
    sessions: Mutex<HashMap<String, UserDto>>,
    failures: Mutex<VecDeque<AppError>>,
    delay: Mutex<Duration>,
    me_calls: AtomicUsize,
}

impl InMemoryIdentityService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_account(&self, email: &str, password: &str, user: UserDto) {
        self.accounts.lock().unwrap().push(Account {
            email: email.to_string(),
            password: password.to_string(),
            user,
        });
    }

    /// Accept `token` for `user`, replacing whatever it resolved to before.
    pub fn insert_session(&self, token: &str, user: UserDto) {
        self.sessions.lock().unwrap().insert(token.to_string(), user);
    }

    pub fn revoke(&self, token: &str) {
        self.sessions.lock().unwrap().remove(token);
    }

    /// Errors returned, in order, by the next calls to `me`.
    pub fn fail_next(&self, errors: Vec<AppError>) {
        self.failures.lock().unwrap().extend(errors);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn me_calls(&self) -> usize {
        self.me_calls.load(Ordering::SeqCst)
    }

    fn issue(&self, user: UserDto) -> LoginResponse {
        let token = format!("token-{}", Uuid::new_v4());
        self.insert_session(&token, user.clone());
        LoginResponse {
            access_token: token,
            refresh_token: None,
            user,
        }
    }
}

#[async_trait]
impl IdentityService for InMemoryIdentityService {
    async fn login(&self, req: &LoginRequest) -> AppResult<LoginResponse> {
        let user = self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|a| {
                a.email.eq_ignore_ascii_case(&req.email)
                    && a.password == req.password
                    && a.user.user_type == req.user_type
            })
            .map(|a| a.user.clone())
            .ok_or(AppError::InvalidCredentials)?;
        Ok(self.issue(user))
    }

    async fn register(&self, req: &RegisterRequest) -> AppResult<LoginResponse> {
        let user = {
            let mut accounts = self.accounts.lock().unwrap();
            if accounts.iter().any(|a| a.email.eq_ignore_ascii_case(&req.email)) {
                return Err(AppError::Conflict("Email already registered".into()));
            }
            let user = UserDto {
                id: Uuid::new_v4().to_string(),
                email: req.email.clone(),
                name: req.full_name.clone(),
                user_type: req.user_type,
                business_name: req.business_name.clone(),
                tax_id: req.tax_id.clone(),
            };
            accounts.push(Account {
                email: req.email.clone(),
                password: req.password.clone(),
                user: user.clone(),
            });
            user
        };
        Ok(self.issue(user))
    }

    async fn me(&self, token: &AuthToken) -> AppResult<UserDto> {
        self.me_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(err) = self.failures.lock().unwrap().pop_front() {
            return Err(err);
        }

        self.sessions
            .lock()
            .unwrap()
            .get(token.expose())
            .cloned()
            .ok_or(AppError::AuthExpired)
    }
}

// ============================================================================
// InMemorySessionStorage
// ============================================================================

/// In-memory implementation of SessionStorage for testing.
#[derive(Default)]
pub struct InMemorySessionStorage {
    session: Mutex<Option<StoredSession>>,
    saves: AtomicUsize,
    save_failures: Mutex<VecDeque<AppError>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a persisted session without counting it as a save.
    pub fn put(&self, session: StoredSession) {
        *self.session.lock().unwrap() = Some(session);
    }

    pub fn stored(&self) -> Option<StoredSession> {
        self.session.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// The next `save` fails with `err` and leaves the stored session as is.
    pub fn fail_next_save(&self, err: AppError) {
        self.save_failures.lock().unwrap().push_back(err);
    }
}

#[async_trait]
impl SessionStorage for InMemorySessionStorage {
    async fn load(&self) -> AppResult<Option<StoredSession>> {
        Ok(self.stored())
    }

    async fn save(&self, session: &StoredSession) -> AppResult<()> {
        if let Some(err) = self.save_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.put(session.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self) -> AppResult<()> {
        *self.session.lock().unwrap() = None;
        Ok(())
    }
}
