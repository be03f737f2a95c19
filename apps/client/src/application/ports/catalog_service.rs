use async_trait::async_trait;
use suscridash_types::UserDto;

use crate::{
    app_error::AppResult,
    domain::entities::{
        business::{Business, BusinessChanges, NewBusiness},
        plan::{NewPlan, Plan, PlanChanges},
        principal::AuthToken,
        settings::SystemSettings,
        subscription::{NewSubscription, Subscription, SubscriptionChanges, SubscriptionFilter},
    },
};

/// REST catalog of businesses, plans, subscriptions and users.
///
/// Every write returns the canonical record as stored by the service.
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn list_businesses(&self, token: &AuthToken) -> AppResult<Vec<Business>>;

    async fn get_business(&self, token: &AuthToken, id: &str) -> AppResult<Business>;

    async fn create_business(&self, token: &AuthToken, business: &NewBusiness)
    -> AppResult<Business>;

    async fn update_business(
        &self,
        token: &AuthToken,
        id: &str,
        changes: &BusinessChanges,
    ) -> AppResult<Business>;

    async fn delete_business(&self, token: &AuthToken, id: &str) -> AppResult<()>;

    /// All plans, or only those of `business_id`.
    async fn list_plans(&self, token: &AuthToken, business_id: Option<&str>)
    -> AppResult<Vec<Plan>>;

    async fn get_plan(&self, token: &AuthToken, id: &str) -> AppResult<Plan>;

    async fn create_plan(&self, token: &AuthToken, plan: &NewPlan) -> AppResult<Plan>;

    async fn update_plan(&self, token: &AuthToken, id: &str, changes: &PlanChanges)
    -> AppResult<Plan>;

    async fn delete_plan(&self, token: &AuthToken, id: &str) -> AppResult<()>;

    async fn list_subscriptions(
        &self,
        token: &AuthToken,
        filter: &SubscriptionFilter,
    ) -> AppResult<Vec<Subscription>>;

    async fn get_subscription(&self, token: &AuthToken, id: &str) -> AppResult<Subscription>;

    async fn create_subscription(
        &self,
        token: &AuthToken,
        subscription: &NewSubscription,
    ) -> AppResult<Subscription>;

    async fn update_subscription(
        &self,
        token: &AuthToken,
        id: &str,
        changes: &SubscriptionChanges,
    ) -> AppResult<Subscription>;

    async fn delete_subscription(&self, token: &AuthToken, id: &str) -> AppResult<()>;

    async fn list_users(&self, token: &AuthToken) -> AppResult<Vec<UserDto>>;

    async fn get_settings(&self, token: &AuthToken) -> AppResult<SystemSettings>;

    /// Replace the platform settings as a whole.
    async fn update_settings(
        &self,
        token: &AuthToken,
        settings: &SystemSettings,
    ) -> AppResult<SystemSettings>;
}
