use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::{
    app_error::AppError,
    application::use_cases::{catalog::CatalogStore, session::IdentityStore},
};

/// Why the refresh loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshExit {
    SignedOut,
    SessionExpired,
}

/// Keep the catalog cache fresh for whoever is signed in.
///
/// Failed refreshes keep the last-known cache. The loop ends once nobody is
/// signed in or the service rejects the token; a rejected token also ends
/// the session it belonged to.
pub async fn run_catalog_refresh_loop(
    identity: Arc<IdentityStore>,
    catalog: CatalogStore,
    every: Duration,
) -> RefreshExit {
    let mut ticker = interval(every);

    info!(
        "Catalog refresh started (polling every {}ms)",
        every.as_millis()
    );

    loop {
        ticker.tick().await;

        let Some(actor) = identity.current() else {
            info!("Signed out, stopping catalog refresh");
            return RefreshExit::SignedOut;
        };

        match catalog.refresh_all(&actor).await {
            Ok(()) => {
                debug!(user_id = %actor.id, "Catalog refreshed");
            }
            Err(AppError::AuthExpired) => {
                warn!(user_id = %actor.id, "Session rejected, stopping catalog refresh");
                if let Err(e) = identity.clear_if_current(&actor.auth_token).await {
                    error!(error = %e, "Failed to clear rejected session from storage");
                }
                return RefreshExit::SessionExpired;
            }
            Err(e) if e.is_retryable() => {
                warn!(error = %e, "Catalog refresh failed, keeping cached data");
            }
            Err(e) => {
                error!(error = ?e, "Catalog refresh failed");
            }
        }
    }
}
