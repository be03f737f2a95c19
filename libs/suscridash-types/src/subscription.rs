use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lifecycle status of a customer's subscription to one business plan.
///
/// `none` (no record) is not a status; a subscription record is born
/// `Pending` when a plan is selected.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionStatus {
    /// Plan selected, payment not yet captured
    Pending,
    /// Paid and running
    Active,
    /// Cancellation requested; usable until the next billing date
    CancelPending,
    /// Terminal
    #[serde(alias = "canceled")]
    #[strum(to_string = "cancelled", serialize = "canceled")]
    Cancelled,
}

impl SubscriptionStatus {
    /// Valid transitions from this status.
    ///
    /// `Active -> Active` is listed because a plan change rewrites an active
    /// record in place.
    pub fn valid_transitions(&self) -> &'static [SubscriptionStatus] {
        match self {
            SubscriptionStatus::Pending => &[SubscriptionStatus::Active, SubscriptionStatus::Cancelled],
            SubscriptionStatus::Active => &[SubscriptionStatus::Active, SubscriptionStatus::CancelPending],
            SubscriptionStatus::CancelPending => &[
                SubscriptionStatus::Active,
                SubscriptionStatus::Cancelled,
            ],
            SubscriptionStatus::Cancelled => &[],
        }
    }

    /// Check if transition to the given status is valid
    pub fn can_transition_to(&self, new_status: SubscriptionStatus) -> bool {
        self.valid_transitions().contains(&new_status)
    }

    /// Returns true for every status except the terminal one.
    ///
    /// At most one open subscription may exist per (customer, business).
    pub fn is_open(&self) -> bool {
        !matches!(self, SubscriptionStatus::Cancelled)
    }

    /// Returns true if the subscription currently grants access to plan features
    /// (subject to the next billing date for `CancelPending`).
    pub fn has_access(&self) -> bool {
        matches!(
            self,
            SubscriptionStatus::Active | SubscriptionStatus::CancelPending
        )
    }
}

/// Status of a subscription-selling business.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum BusinessStatus {
    Active,
    Pending,
    Suspended,
}

impl BusinessStatus {
    pub fn valid_transitions(&self) -> &'static [BusinessStatus] {
        match self {
            BusinessStatus::Pending => &[BusinessStatus::Active, BusinessStatus::Suspended],
            BusinessStatus::Active => &[BusinessStatus::Suspended],
            BusinessStatus::Suspended => &[BusinessStatus::Active],
        }
    }

    /// Same-status writes are accepted as no-ops.
    pub fn can_transition_to(&self, new_status: BusinessStatus) -> bool {
        *self == new_status || self.valid_transitions().contains(&new_status)
    }

    /// Only active businesses are offered to new subscribers.
    pub fn accepts_subscribers(&self) -> bool {
        matches!(self, BusinessStatus::Active)
    }
}

/// Whether a plan is offered to new subscribers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PlanStatus {
    Active,
    Inactive,
}

impl PlanStatus {
    pub fn can_transition_to(&self, _new_status: PlanStatus) -> bool {
        // Plans toggle freely between the two states.
        true
    }

    pub fn is_offered(&self) -> bool {
        matches!(self, PlanStatus::Active)
    }
}
