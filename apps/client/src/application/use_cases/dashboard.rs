use serde::Serialize;
use suscridash_types::{BusinessStatus, Role, SubscriptionStatus};
use tracing::instrument;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::catalog::{CatalogSnapshot, CatalogStore},
    domain::entities::{
        plan::Plan,
        principal::Principal,
        subscription::{Subscription, SubscriptionFilter},
    },
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusinessStatusCounts {
    pub active: usize,
    pub pending: usize,
    pub suspended: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionStatusCounts {
    pub pending: usize,
    pub active: usize,
    pub cancel_pending: usize,
    pub cancelled: usize,
}

impl SubscriptionStatusCounts {
    fn add(&mut self, status: SubscriptionStatus) {
        match status {
            SubscriptionStatus::Pending => self.pending += 1,
            SubscriptionStatus::Active => self.active += 1,
            SubscriptionStatus::CancelPending => self.cancel_pending += 1,
            SubscriptionStatus::Cancelled => self.cancelled += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminOverview {
    pub total_businesses: usize,
    pub businesses_by_status: BusinessStatusCounts,
    /// Active plus cancel-pending
    pub active_subscriptions: usize,
    pub total_customers: usize,
    /// Yearly plans normalized to a monthly amount
    pub monthly_recurring_revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStats {
    pub plan_id: String,
    pub name: String,
    pub subscribers: usize,
    pub monthly_revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BusinessOverview {
    pub business_id: String,
    pub subscribers_by_status: SubscriptionStatusCounts,
    pub plans: Vec<PlanStats>,
    pub monthly_recurring_revenue: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriberRow {
    pub subscription: Subscription,
    pub plan_name: Option<String>,
}

/// Subscriptions that count as paying this period.
fn is_paying(subscription: &Subscription) -> bool {
    subscription.status.has_access()
}

fn find_plan<'a>(plans: &'a [Plan], id: &str) -> Option<&'a Plan> {
    plans.iter().find(|p| p.id == id)
}

/// Monthly revenue of the paying subscriptions, accumulated in f64 and
/// rounded once at the end.
fn monthly_revenue<'a>(plans: &[Plan], subscriptions: impl Iterator<Item = &'a Subscription>) -> i64 {
    subscriptions
        .filter(|s| is_paying(s))
        .filter_map(|s| find_plan(plans, &s.plan_id))
        .map(Plan::monthly_equivalent)
        .sum::<f64>()
        .round() as i64
}

pub fn compute_admin_overview(snapshot: &CatalogSnapshot) -> AdminOverview {
    let mut by_status = BusinessStatusCounts::default();
    for business in &snapshot.businesses {
        match business.status {
            BusinessStatus::Active => by_status.active += 1,
            BusinessStatus::Pending => by_status.pending += 1,
            BusinessStatus::Suspended => by_status.suspended += 1,
        }
    }

    AdminOverview {
        total_businesses: snapshot.businesses.len(),
        businesses_by_status: by_status,
        active_subscriptions: snapshot.subscriptions.iter().filter(|s| is_paying(s)).count(),
        total_customers: snapshot
            .users
            .iter()
            .filter(|u| u.user_type == Role::Customer)
            .count(),
        monthly_recurring_revenue: monthly_revenue(&snapshot.plans, snapshot.subscriptions.iter()),
    }
}

pub fn compute_business_overview(snapshot: &CatalogSnapshot, business_id: &str) -> BusinessOverview {
    let own: Vec<&Subscription> = snapshot
        .subscriptions
        .iter()
        .filter(|s| s.business_id == business_id)
        .collect();

    let mut by_status = SubscriptionStatusCounts::default();
    for subscription in &own {
        by_status.add(subscription.status);
    }

    let plans = snapshot
        .plans
        .iter()
        .filter(|p| p.business_id == business_id)
        .map(|plan| {
            let on_plan: Vec<&Subscription> = own
                .iter()
                .copied()
                .filter(|s| s.plan_id == plan.id)
                .collect();
            PlanStats {
                plan_id: plan.id.clone(),
                name: plan.name.clone(),
                subscribers: on_plan.iter().filter(|s| is_paying(s)).count(),
                monthly_revenue: monthly_revenue(&snapshot.plans, on_plan.iter().copied()),
            }
        })
        .collect();

    BusinessOverview {
        business_id: business_id.to_string(),
        subscribers_by_status: by_status,
        plans,
        monthly_recurring_revenue: monthly_revenue(&snapshot.plans, own.iter().copied()),
    }
}

/// Aggregates for the admin and business dashboards, computed from the
/// catalog cache.
#[derive(Clone)]
pub struct DashboardUseCases {
    catalog: CatalogStore,
}

impl DashboardUseCases {
    pub fn new(catalog: CatalogStore) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    /// Refresh the cache the actor's dashboard reads.
    pub async fn refresh(&self, actor: &Principal) -> AppResult<()> {
        self.catalog.refresh_all(actor).await
    }

    pub fn admin_overview(&self, actor: &Principal) -> AppResult<AdminOverview> {
        if !actor.is(Role::Admin) {
            return Err(AppError::AuthForbidden);
        }
        Ok(compute_admin_overview(&self.catalog.snapshot()))
    }

    pub fn business_overview(&self, actor: &Principal) -> AppResult<BusinessOverview> {
        if !actor.is(Role::Business) {
            return Err(AppError::AuthForbidden);
        }
        Ok(compute_business_overview(&self.catalog.snapshot(), &actor.id))
    }

    /// The business's subscribers, optionally narrowed to one status.
    #[instrument(skip(self, actor), fields(business_id = %actor.id))]
    pub async fn subscribers(
        &self,
        actor: &Principal,
        status: Option<SubscriptionStatus>,
    ) -> AppResult<Vec<SubscriberRow>> {
        if !actor.is(Role::Business) {
            return Err(AppError::AuthForbidden);
        }
        let filter = SubscriptionFilter {
            business_id: Some(actor.id.clone()),
            status,
            ..Default::default()
        };
        let subscriptions = self.catalog.refresh_subscriptions(actor, &filter).await?;

        Ok(subscriptions
            .into_iter()
            .map(|subscription| SubscriberRow {
                plan_name: self.catalog.plan(&subscription.plan_id).map(|p| p.name),
                subscription,
            })
            .collect())
    }
}
