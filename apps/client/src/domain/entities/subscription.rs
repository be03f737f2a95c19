use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use suscridash_types::SubscriptionStatus;

/// One customer's subscription to one plan of one business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub customer_id: String,
    pub business_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub next_billing_date: Option<DateTime<Utc>>,
    /// e.g. "Visa **** 4242"
    #[serde(default)]
    pub payment_method_summary: Option<String>,
}

impl Subscription {
    /// Whether plan features are usable at `now`.
    ///
    /// A cancellation keeps access until the next billing date.
    pub fn has_access_at(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            SubscriptionStatus::Active => true,
            SubscriptionStatus::CancelPending => {
                self.next_billing_date.is_some_and(|next| now < next)
            }
            SubscriptionStatus::Pending | SubscriptionStatus::Cancelled => false,
        }
    }

    /// A pending cancellation whose paid period has ended.
    pub fn has_lapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::CancelPending
            && self.next_billing_date.is_none_or(|next| now >= next)
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    pub customer_id: String,
    pub business_id: String,
    pub plan_id: String,
    pub status: SubscriptionStatus,
}

/// Partial edit of a subscription; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_billing_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method_summary: Option<String>,
}

/// Query for listing subscriptions; every present field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubscriptionStatus>,
}

impl SubscriptionFilter {
    pub fn for_customer(customer_id: &str) -> Self {
        Self {
            customer_id: Some(customer_id.to_string()),
            ..Default::default()
        }
    }

    pub fn for_business(business_id: &str) -> Self {
        Self {
            business_id: Some(business_id.to_string()),
            ..Default::default()
        }
    }

    pub fn for_plan(plan_id: &str) -> Self {
        Self {
            plan_id: Some(plan_id.to_string()),
            ..Default::default()
        }
    }

    pub fn matches(&self, subscription: &Subscription) -> bool {
        self.customer_id
            .as_ref()
            .is_none_or(|id| *id == subscription.customer_id)
            && self
                .business_id
                .as_ref()
                .is_none_or(|id| *id == subscription.business_id)
            && self
                .plan_id
                .as_ref()
                .is_none_or(|id| *id == subscription.plan_id)
            && self.status.is_none_or(|s| s == subscription.status)
    }
}
