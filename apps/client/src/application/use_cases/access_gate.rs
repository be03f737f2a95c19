use std::sync::Arc;

use suscridash_types::Role;
use tracing::{debug, instrument};

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::session::{IdentityStore, SessionVerifier},
    domain::entities::{
        principal::Principal,
        route_table::{LOGIN_PATH, RouteAccess, access_for, landing, normalize},
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// No (usable) principal
    Unauthenticated,
    /// The stored token was rejected during verification
    SessionExpired,
    /// Signed in, but the destination belongs to another role
    RoleNotPermitted,
    /// The application root forwards everyone to their start page
    Entry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Redirect {
        to: &'static str,
        reason: RedirectReason,
    },
}

impl Decision {
    fn redirect(to: &'static str, reason: RedirectReason) -> Self {
        Decision::Redirect { to, reason }
    }

    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit)
    }
}

/// Decide whether `principal` may view `destination`.
///
/// Pure function of (role, path). Signed-in users are never sent back to
/// login for a role mismatch; unknown roles are treated as signed out.
pub fn authorize(destination: &str, principal: Option<&Principal>) -> Decision {
    let path = normalize(destination);
    let role = principal.map(|p| p.role).filter(Role::is_known);

    match (access_for(&path), role) {
        (RouteAccess::Public, _) => Decision::Admit,
        (_, None) => Decision::redirect(LOGIN_PATH, RedirectReason::Unauthenticated),
        (RouteAccess::Entry, Some(role)) => Decision::redirect(landing(role), RedirectReason::Entry),
        (RouteAccess::Roles(roles), Some(role)) if roles.contains(&role) => Decision::Admit,
        (RouteAccess::Roles(_), Some(role)) => {
            Decision::redirect(landing(role), RedirectReason::RoleNotPermitted)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub decision: Decision,
    /// Principal the decision was made for
    pub principal: Option<Arc<Principal>>,
}

/// Runs every protected navigation through session verification before
/// authorizing it.
#[derive(Clone)]
pub struct AccessGate {
    verifier: SessionVerifier,
    store: Arc<IdentityStore>,
}

impl AccessGate {
    pub fn new(verifier: SessionVerifier, store: Arc<IdentityStore>) -> Self {
        Self { verifier, store }
    }

    /// Authorize a navigation.
    ///
    /// Public destinations are admitted without a round-trip. An expired
    /// session becomes a redirect to login; `Transient` is returned so the
    /// caller can offer a retry.
    #[instrument(skip(self))]
    pub async fn navigate(&self, destination: &str) -> AppResult<Navigation> {
        if access_for(&normalize(destination)) == RouteAccess::Public {
            return Ok(Navigation {
                decision: Decision::Admit,
                principal: self.store.current(),
            });
        }

        let principal = match self.verifier.verify().await {
            Ok(principal) => principal,
            Err(AppError::AuthExpired) => {
                return Ok(Navigation {
                    decision: Decision::redirect(LOGIN_PATH, RedirectReason::SessionExpired),
                    principal: None,
                });
            }
            Err(e) => return Err(e),
        };

        let decision = authorize(destination, principal.as_deref());
        debug!(?decision, "Navigation authorized");
        Ok(Navigation {
            decision,
            principal,
        })
    }
}
