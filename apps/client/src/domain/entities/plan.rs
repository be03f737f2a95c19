use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use suscridash_types::PlanStatus;

const MONTHS_PER_YEAR: u32 = 12;

/// How often a plan charges.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[derive(Default)]
pub enum BillingPeriod {
    #[default]
    Monthly,
    Yearly,
}

impl BillingPeriod {
    pub fn months(&self) -> u32 {
        match self {
            BillingPeriod::Monthly => 1,
            BillingPeriod::Yearly => MONTHS_PER_YEAR,
        }
    }

    /// The billing date one period after `from`, clamped to the end of a
    /// shorter month (Jan 31 + 1 month = Feb 28/29).
    ///
    /// `None` only when the result falls outside the representable range.
    pub fn advance(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        from.checked_add_months(Months::new(self.months()))
    }
}

/// A priced offering belonging to exactly one business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub business_id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Minor-unit-free amount in `currency` (CLP has no decimals)
    pub monthly_price: i64,
    #[serde(default)]
    pub yearly_price: Option<i64>,
    pub currency: String,
    #[serde(default)]
    pub billing_period: BillingPeriod,
    #[serde(default)]
    pub features: Vec<String>,
    pub status: PlanStatus,
}

impl Plan {
    /// Amount charged per period for the given billing period.
    ///
    /// A plan without a yearly price bills twelve monthly prices per year,
    /// capped at `i64::MAX`.
    pub fn price_for(&self, period: BillingPeriod) -> i64 {
        match period {
            BillingPeriod::Monthly => self.monthly_price,
            BillingPeriod::Yearly => self
                .yearly_price
                .unwrap_or_else(|| self.monthly_price.saturating_mul(MONTHS_PER_YEAR as i64)),
        }
    }

    /// Amount charged for the plan's own billing period.
    pub fn period_price(&self) -> i64 {
        self.price_for(self.billing_period)
    }

    /// Monthly-equivalent revenue of one subscriber, as f64 so callers can
    /// accumulate before rounding.
    pub fn monthly_equivalent(&self) -> f64 {
        self.period_price() as f64 / self.billing_period.months() as f64
    }

    pub fn is_offered(&self) -> bool {
        self.status.is_offered()
    }
}

/// A plan as submitted for creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlan {
    pub business_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub monthly_price: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yearly_price: Option<i64>,
    pub currency: String,
    pub billing_period: BillingPeriod,
    pub features: Vec<String>,
    pub status: PlanStatus,
}

/// Partial edit of a plan; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yearly_price: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_period: Option<BillingPeriod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PlanStatus>,
}

impl PlanChanges {
    /// The plan as it would look after these changes, for validation
    /// before anything is sent.
    pub fn applied_to(&self, plan: &Plan) -> Plan {
        let mut next = plan.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(description) = &self.description {
            next.description = Some(description.clone());
        }
        if let Some(price) = self.monthly_price {
            next.monthly_price = price;
        }
        if let Some(price) = self.yearly_price {
            next.yearly_price = Some(price);
        }
        if let Some(currency) = &self.currency {
            next.currency = currency.clone();
        }
        if let Some(period) = self.billing_period {
            next.billing_period = period;
        }
        if let Some(features) = &self.features {
            next.features = features.clone();
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        next
    }
}
