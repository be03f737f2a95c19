use std::sync::Arc;

use async_trait::async_trait;
use suscridash_types::UserDto;
use tracing::{error, info};

use crate::{
    app_error::{AppError, AppResult},
    application::{ports::catalog_service::CatalogService, use_cases::session::IdentityStore},
    domain::entities::{
        business::{Business, BusinessChanges, NewBusiness},
        plan::{NewPlan, Plan, PlanChanges},
        principal::AuthToken,
        settings::SystemSettings,
        subscription::{NewSubscription, Subscription, SubscriptionChanges, SubscriptionFilter},
    },
};

/// Catalog service that ends the session whose token it rejected.
///
/// Any call answering `AuthExpired` clears the identity store and its
/// storage, unless a different session has been signed in meanwhile.
pub struct SessionExpiringCatalog {
    inner: Arc<dyn CatalogService>,
    identity: Arc<IdentityStore>,
}

impl SessionExpiringCatalog {
    pub fn new(inner: Arc<dyn CatalogService>, identity: Arc<IdentityStore>) -> Self {
        Self { inner, identity }
    }

    async fn checked<T>(&self, token: &AuthToken, result: AppResult<T>) -> AppResult<T> {
        if matches!(result, Err(AppError::AuthExpired)) {
            match self.identity.clear_if_current(token).await {
                Ok(true) => info!("Catalog service rejected the session token, signed out"),
                Ok(false) => {}
                Err(e) => error!(error = %e, "Failed to clear rejected session from storage"),
            }
        }
        result
    }
}

#[async_trait]
impl CatalogService for SessionExpiringCatalog {
    async fn list_businesses(&self, token: &AuthToken) -> AppResult<Vec<Business>> {
        let result = self.inner.list_businesses(token).await;
        self.checked(token, result).await
    }

    async fn get_business(&self, token: &AuthToken, id: &str) -> AppResult<Business> {
        let result = self.inner.get_business(token, id).await;
        self.checked(token, result).await
    }

    async fn create_business(
        &self,
        token: &AuthToken,
        business: &NewBusiness,
    ) -> AppResult<Business> {
        let result = self.inner.create_business(token, business).await;
        self.checked(token, result).await
    }

    async fn update_business(
        &self,
        token: &AuthToken,
        id: &str,
        changes: &BusinessChanges,
    ) -> AppResult<Business> {
        let result = self.inner.update_business(token, id, changes).await;
        self.checked(token, result).await
    }

    async fn delete_business(&self, token: &AuthToken, id: &str) -> AppResult<()> {
        let result = self.inner.delete_business(token, id).await;
        self.checked(token, result).await
    }

    async fn list_plans(
        &self,
        token: &AuthToken,
        business_id: Option<&str>,
    ) -> AppResult<Vec<Plan>> {
        let result = self.inner.list_plans(token, business_id).await;
        self.checked(token, result).await
    }

    async fn get_plan(&self, token: &AuthToken, id: &str) -> AppResult<Plan> {
        let result = self.inner.get_plan(token, id).await;
        self.checked(token, result).await
    }

    async fn create_plan(&self, token: &AuthToken, plan: &NewPlan) -> AppResult<Plan> {
        let result = self.inner.create_plan(token, plan).await;
        self.checked(token, result).await
    }

    async fn update_plan(
        &self,
        token: &AuthToken,
        id: &str,
        changes: &PlanChanges,
    ) -> AppResult<Plan> {
        let result = self.inner.update_plan(token, id, changes).await;
        self.checked(token, result).await
    }

    async fn delete_plan(&self, token: &AuthToken, id: &str) -> AppResult<()> {
        let result = self.inner.delete_plan(token, id).await;
        self.checked(token, result).await
    }

    async fn list_subscriptions(
        &self,
        token: &AuthToken,
        filter: &SubscriptionFilter,
    ) -> AppResult<Vec<Subscription>> {
        let result = self.inner.list_subscriptions(token, filter).await;
        self.checked(token, result).await
    }

    async fn get_subscription(&self, token: &AuthToken, id: &str) -> AppResult<Subscription> {
        let result = self.inner.get_subscription(token, id).await;
        self.checked(token, result).await
    }

    async fn create_subscription(
        &self,
        token: &AuthToken,
        subscription: &NewSubscription,
    ) -> AppResult<Subscription> {
        let result = self.inner.create_subscription(token, subscription).await;
        self.checked(token, result).await
    }

    async fn update_subscription(
        &self,
        token: &AuthToken,
        id: &str,
        changes: &SubscriptionChanges,
    ) -> AppResult<Subscription> {
        let result = self.inner.update_subscription(token, id, changes).await;
        self.checked(token, result).await
    }

    async fn delete_subscription(&self, token: &AuthToken, id: &str) -> AppResult<()> {
        let result = self.inner.delete_subscription(token, id).await;
        self.checked(token, result).await
    }

    async fn list_users(&self, token: &AuthToken) -> AppResult<Vec<UserDto>> {
        let result = self.inner.list_users(token).await;
        self.checked(token, result).await
    }

    async fn get_settings(&self, token: &AuthToken) -> AppResult<SystemSettings> {
        let result = self.inner.get_settings(token).await;
        self.checked(token, result).await
    }

    async fn update_settings(
        &self,
        token: &AuthToken,
        settings: &SystemSettings,
    ) -> AppResult<SystemSettings> {
        let result = self.inner.update_settings(token, settings).await;
        self.checked(token, result).await
    }
}
