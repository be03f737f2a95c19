//! In-memory mock implementation of the catalog service.
//!
//! Mirrors the server's canonicalization: ids are assigned on create,
//! businesses default to `pending`, and `subscriber_count` is derived.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use suscridash_types::{BusinessStatus, UserDto};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::catalog_service::CatalogService,
    domain::entities::{
        business::{Business, BusinessChanges, NewBusiness},
        plan::{NewPlan, Plan, PlanChanges},
        principal::AuthToken,
        settings::SystemSettings,
        subscription::{NewSubscription, Subscription, SubscriptionChanges, SubscriptionFilter},
    },
    test_utils::{create_test_business, create_test_plan},
};

/// In-memory implementation of CatalogService for testing.
#[derive(Default)]
pub struct InMemoryCatalogService {
    businesses: Mutex<Vec<Business>>,
    plans: Mutex<Vec<Plan>>,
    subscriptions: Mutex<Vec<Subscription>>,
    users: Mutex<Vec<UserDto>>,
    settings: Mutex<SystemSettings>,
    failures: Mutex<VecDeque<AppError>>,
    delay: Mutex<Duration>,
}

impl InMemoryCatalogService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_business(&self, overrides: impl FnOnce(&mut Business)) -> Business {
        let business = create_test_business(overrides);
        self.businesses.lock().unwrap().push(business.clone());
        business
    }

    pub fn seed_plan(&self, business_id: &str, overrides: impl FnOnce(&mut Plan)) -> Plan {
        let plan = create_test_plan(business_id, overrides);
        self.plans.lock().unwrap().push(plan.clone());
        plan
    }

    pub fn seed_subscription(&self, subscription: Subscription) -> Subscription {
        self.subscriptions.lock().unwrap().push(subscription.clone());
        subscription
    }

    pub fn seed_user(&self, user: UserDto) {
        self.users.lock().unwrap().push(user);
    }

    pub fn businesses(&self) -> Vec<Business> {
        let businesses = self.businesses.lock().unwrap().clone();
        businesses.into_iter().map(|b| self.canonical(b)).collect()
    }

    pub fn plans(&self) -> Vec<Plan> {
        self.plans.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn business(&self, id: &str) -> Option<Business> {
        self.businesses().into_iter().find(|b| b.id == id)
    }

    pub fn plan(&self, id: &str) -> Option<Plan> {
        self.plans().into_iter().find(|p| p.id == id)
    }

    pub fn subscription(&self, id: &str) -> Option<Subscription> {
        self.subscriptions().into_iter().find(|s| s.id == id)
    }

    pub fn settings(&self) -> SystemSettings {
        self.settings.lock().unwrap().clone()
    }

    /// The next call fails with `err` instead of touching the data.
    pub fn fail_next(&self, err: AppError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// Every call sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    async fn before_call(&self) -> AppResult<()> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn canonical(&self, mut business: Business) -> Business {
        business.subscriber_count = self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.business_id == business.id && s.status.has_access())
            .count() as i64;
        business
    }

    fn find_business(&self, id: &str) -> AppResult<Business> {
        self.business(id).ok_or(AppError::NotFound)
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalogService {
    async fn list_businesses(&self, _token: &AuthToken) -> AppResult<Vec<Business>> {
        self.before_call().await?;
        Ok(self.businesses())
    }

    async fn get_business(&self, _token: &AuthToken, id: &str) -> AppResult<Business> {
        self.before_call().await?;
        self.find_business(id)
    }

    async fn create_business(
        &self,
        _token: &AuthToken,
        business: &NewBusiness,
    ) -> AppResult<Business> {
        self.before_call().await?;
        let created = Business {
            id: Uuid::new_v4().to_string(),
            legal_name: business.legal_name.clone(),
            contact_email: business.contact_email.clone(),
            tax_id: business.tax_id.clone(),
            status: business.status.unwrap_or(BusinessStatus::Pending),
            subscriber_count: 0,
        };
        self.businesses.lock().unwrap().push(created.clone());
        Ok(self.canonical(created))
    }

    async fn update_business(
        &self,
        _token: &AuthToken,
        id: &str,
        changes: &BusinessChanges,
    ) -> AppResult<Business> {
        self.before_call().await?;
        let updated = {
            let mut businesses = self.businesses.lock().unwrap();
            let business = businesses
                .iter_mut()
                .find(|b| b.id == id)
                .ok_or(AppError::NotFound)?;
            if let Some(legal_name) = &changes.legal_name {
                business.legal_name = legal_name.clone();
            }
            if let Some(contact_email) = &changes.contact_email {
                business.contact_email = contact_email.clone();
            }
            if let Some(tax_id) = &changes.tax_id {
                business.tax_id = tax_id.clone();
            }
            if let Some(status) = changes.status {
                business.status = status;
            }
            business.clone()
        };
        Ok(self.canonical(updated))
    }

    async fn delete_business(&self, _token: &AuthToken, id: &str) -> AppResult<()> {
        self.before_call().await?;
        let mut businesses = self.businesses.lock().unwrap();
        let before = businesses.len();
        businesses.retain(|b| b.id != id);
        if businesses.len() == before {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn list_plans(
        &self,
        _token: &AuthToken,
        business_id: Option<&str>,
    ) -> AppResult<Vec<Plan>> {
        self.before_call().await?;
        Ok(self
            .plans()
            .into_iter()
            .filter(|p| business_id.is_none_or(|id| p.business_id == id))
            .collect())
    }

    async fn get_plan(&self, _token: &AuthToken, id: &str) -> AppResult<Plan> {
        self.before_call().await?;
        self.plan(id).ok_or(AppError::NotFound)
    }

    async fn create_plan(&self, _token: &AuthToken, plan: &NewPlan) -> AppResult<Plan> {
        self.before_call().await?;
        let created = Plan {
            id: Uuid::new_v4().to_string(),
            business_id: plan.business_id.clone(),
            name: plan.name.clone(),
            description: plan.description.clone(),
            monthly_price: plan.monthly_price,
            yearly_price: plan.yearly_price,
            currency: plan.currency.clone(),
            billing_period: plan.billing_period,
            features: plan.features.clone(),
            status: plan.status,
        };
        self.plans.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_plan(
        &self,
        _token: &AuthToken,
        id: &str,
        changes: &PlanChanges,
    ) -> AppResult<Plan> {
        self.before_call().await?;
        let mut plans = self.plans.lock().unwrap();
        let plan = plans
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(AppError::NotFound)?;
        *plan = changes.applied_to(plan);
        Ok(plan.clone())
    }

    async fn delete_plan(&self, _token: &AuthToken, id: &str) -> AppResult<()> {
        self.before_call().await?;
        let mut plans = self.plans.lock().unwrap();
        let before = plans.len();
        plans.retain(|p| p.id != id);
        if plans.len() == before {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn list_subscriptions(
        &self,
        _token: &AuthToken,
        filter: &SubscriptionFilter,
    ) -> AppResult<Vec<Subscription>> {
        self.before_call().await?;
        Ok(self
            .subscriptions()
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect())
    }

    async fn get_subscription(&self, _token: &AuthToken, id: &str) -> AppResult<Subscription> {
        self.before_call().await?;
        self.subscription(id).ok_or(AppError::NotFound)
    }

    async fn create_subscription(
        &self,
        _token: &AuthToken,
        subscription: &NewSubscription,
    ) -> AppResult<Subscription> {
        self.before_call().await?;
        let created = Subscription {
            id: Uuid::new_v4().to_string(),
            customer_id: subscription.customer_id.clone(),
            business_id: subscription.business_id.clone(),
            plan_id: subscription.plan_id.clone(),
            status: subscription.status,
            start_date: None,
            next_billing_date: None,
            payment_method_summary: None,
        };
        Ok(self.seed_subscription(created))
    }

    async fn update_subscription(
        &self,
        _token: &AuthToken,
        id: &str,
        changes: &SubscriptionChanges,
    ) -> AppResult<Subscription> {
        self.before_call().await?;
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let subscription = subscriptions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(AppError::NotFound)?;
        if let Some(plan_id) = &changes.plan_id {
            subscription.plan_id = plan_id.clone();
        }
        if let Some(status) = changes.status {
            subscription.status = status;
        }
        if changes.start_date.is_some() {
            subscription.start_date = changes.start_date;
        }
        if changes.next_billing_date.is_some() {
            subscription.next_billing_date = changes.next_billing_date;
        }
        if let Some(summary) = &changes.payment_method_summary {
            subscription.payment_method_summary = Some(summary.clone());
        }
        Ok(subscription.clone())
    }

    async fn delete_subscription(&self, _token: &AuthToken, id: &str) -> AppResult<()> {
        self.before_call().await?;
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        if subscriptions.len() == before {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn list_users(&self, _token: &AuthToken) -> AppResult<Vec<UserDto>> {
        self.before_call().await?;
        Ok(self.users.lock().unwrap().clone())
    }

    async fn get_settings(&self, _token: &AuthToken) -> AppResult<SystemSettings> {
        self.before_call().await?;
        Ok(self.settings())
    }

    async fn update_settings(
        &self,
        _token: &AuthToken,
        settings: &SystemSettings,
    ) -> AppResult<SystemSettings> {
        self.before_call().await?;
        let mut stored = settings.clone();
        stored.system_name = stored.system_name.trim().to_string();
        *self.settings.lock().unwrap() = stored.clone();
        Ok(stored)
    }
}
