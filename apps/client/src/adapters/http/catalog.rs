use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use suscridash_types::UserDto;

use crate::{
    adapters::http::api_client::{ApiClient, Unauthorized},
    app_error::AppResult,
    application::ports::catalog_service::CatalogService,
    domain::entities::{
        business::{Business, BusinessChanges, NewBusiness},
        plan::{NewPlan, Plan, PlanChanges},
        principal::AuthToken,
        settings::{SettingsEnvelope, SystemSettings},
        subscription::{NewSubscription, Subscription, SubscriptionChanges, SubscriptionFilter},
    },
};

/// Catalog service reached over its REST collection endpoints.
///
/// Updates are sent as `PUT` with only the changed fields.
#[derive(Clone)]
pub struct HttpCatalogService {
    api: ApiClient,
}

impl HttpCatalogService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn item(
        &self,
        method: Method,
        collection: &str,
        id: &str,
        token: &AuthToken,
    ) -> AppResult<RequestBuilder> {
        let url = self.api.resource_url(collection, id)?;
        Ok(self.api.authorized_at(method, url, token))
    }
}

fn filter_query(filter: &SubscriptionFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(id) = &filter.customer_id {
        query.push(("customerId", id.clone()));
    }
    if let Some(id) = &filter.business_id {
        query.push(("businessId", id.clone()));
    }
    if let Some(id) = &filter.plan_id {
        query.push(("planId", id.clone()));
    }
    if let Some(status) = filter.status {
        query.push(("status", status.to_string()));
    }
    query
}

#[async_trait]
impl CatalogService for HttpCatalogService {
    async fn list_businesses(&self, token: &AuthToken) -> AppResult<Vec<Business>> {
        let request = self.api.authorized(Method::GET, "businesses", token)?;
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn get_business(&self, token: &AuthToken, id: &str) -> AppResult<Business> {
        let request = self.item(Method::GET, "businesses", id, token)?;
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn create_business(
        &self,
        token: &AuthToken,
        business: &NewBusiness,
    ) -> AppResult<Business> {
        let request = self
            .api
            .authorized(Method::POST, "businesses", token)?
            .json(business);
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn update_business(
        &self,
        token: &AuthToken,
        id: &str,
        changes: &BusinessChanges,
    ) -> AppResult<Business> {
        let request = self.item(Method::PUT, "businesses", id, token)?.json(changes);
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn delete_business(&self, token: &AuthToken, id: &str) -> AppResult<()> {
        let request = self.item(Method::DELETE, "businesses", id, token)?;
        self.api.send_empty(request).await
    }

    async fn list_plans(
        &self,
        token: &AuthToken,
        business_id: Option<&str>,
    ) -> AppResult<Vec<Plan>> {
        let mut request = self.api.authorized(Method::GET, "plans", token)?;
        if let Some(business_id) = business_id {
            request = request.query(&[("businessId", business_id)]);
        }
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn get_plan(&self, token: &AuthToken, id: &str) -> AppResult<Plan> {
        let request = self.item(Method::GET, "plans", id, token)?;
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn create_plan(&self, token: &AuthToken, plan: &NewPlan) -> AppResult<Plan> {
        let request = self.api.authorized(Method::POST, "plans", token)?.json(plan);
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn update_plan(
        &self,
        token: &AuthToken,
        id: &str,
        changes: &PlanChanges,
    ) -> AppResult<Plan> {
        let request = self.item(Method::PUT, "plans", id, token)?.json(changes);
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn delete_plan(&self, token: &AuthToken, id: &str) -> AppResult<()> {
        let request = self.item(Method::DELETE, "plans", id, token)?;
        self.api.send_empty(request).await
    }

    async fn list_subscriptions(
        &self,
        token: &AuthToken,
        filter: &SubscriptionFilter,
    ) -> AppResult<Vec<Subscription>> {
        let request = self
            .api
            .authorized(Method::GET, "subscriptions", token)?
            .query(&filter_query(filter));
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn get_subscription(&self, token: &AuthToken, id: &str) -> AppResult<Subscription> {
        let request = self.item(Method::GET, "subscriptions", id, token)?;
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn create_subscription(
        &self,
        token: &AuthToken,
        subscription: &NewSubscription,
    ) -> AppResult<Subscription> {
        let request = self
            .api
            .authorized(Method::POST, "subscriptions", token)?
            .json(subscription);
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn update_subscription(
        &self,
        token: &AuthToken,
        id: &str,
        changes: &SubscriptionChanges,
    ) -> AppResult<Subscription> {
        let request = self.item(Method::PUT, "subscriptions", id, token)?.json(changes);
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn delete_subscription(&self, token: &AuthToken, id: &str) -> AppResult<()> {
        let request = self.item(Method::DELETE, "subscriptions", id, token)?;
        self.api.send_empty(request).await
    }

    async fn list_users(&self, token: &AuthToken) -> AppResult<Vec<UserDto>> {
        let request = self.api.authorized(Method::GET, "users", token)?;
        self.api.send_json(request, Unauthorized::SessionExpired).await
    }

    async fn get_settings(&self, token: &AuthToken) -> AppResult<SystemSettings> {
        let request = self.api.authorized(Method::GET, "admin/settings", token)?;
        let envelope: SettingsEnvelope = self
            .api
            .send_json(request, Unauthorized::SessionExpired)
            .await?;
        Ok(envelope.settings)
    }

    async fn update_settings(
        &self,
        token: &AuthToken,
        settings: &SystemSettings,
    ) -> AppResult<SystemSettings> {
        let request = self
            .api
            .authorized(Method::PUT, "admin/settings", token)?
            .json(settings);
        let envelope: SettingsEnvelope = self
            .api
            .send_json(request, Unauthorized::SessionExpired)
            .await?;
        Ok(envelope.settings)
    }
}
