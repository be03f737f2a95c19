use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use suscridash_types::UserDto;

use crate::app_error::AppResult;

/// Session persisted across restarts of the client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub access_token: String,
    pub user: UserDto,
}

impl std::fmt::Debug for StoredSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredSession")
            .field("access_token", &"[REDACTED]")
            .field("user", &self.user)
            .finish()
    }
}

/// Client-scoped key/value store holding at most one session.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn load(&self) -> AppResult<Option<StoredSession>>;

    async fn save(&self, session: &StoredSession) -> AppResult<()>;

    /// Clearing an empty store succeeds.
    async fn clear(&self) -> AppResult<()>;
}
