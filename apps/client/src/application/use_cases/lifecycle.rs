use std::sync::Arc;

use chrono::{DateTime, Utc};
use suscridash_types::{Role, SubscriptionStatus};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::payment_gateway::{CaptureReceipt, CaptureRequest, PaymentGateway},
        use_cases::catalog::{CatalogStore, EntityKind, InFlightGuard, run_detached},
    },
    domain::entities::{
        business::Business,
        card::CardDetails,
        coupon::Coupon,
        plan::Plan,
        principal::Principal,
        subscription::{NewSubscription, Subscription, SubscriptionChanges, SubscriptionFilter},
    },
    validators::validate_card,
};

/// Payment form as submitted by the customer.
#[derive(Debug, Clone)]
pub struct PaymentForm {
    pub card: CardDetails,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub subscription: Subscription,
    pub receipt: CaptureReceipt,
    pub coupon: Option<Coupon>,
}

/// A subscription together with what the customer sees about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionDetails {
    pub subscription: Subscription,
    pub plan: Option<Plan>,
    pub business: Option<Business>,
    pub has_access: bool,
}

/// What the customer's subscriptions landing shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerView {
    /// Nothing usable yet: browse businesses and their plans
    Catalog { businesses: Vec<Business> },
    /// At least one subscription grants access
    Subscribed {
        subscriptions: Vec<SubscriptionDetails>,
    },
}

fn require_customer(actor: &Principal) -> AppResult<()> {
    if actor.is(Role::Customer) {
        Ok(())
    } else {
        Err(AppError::AuthForbidden)
    }
}

fn parse_coupon(code: Option<&str>) -> AppResult<Option<Coupon>> {
    match code.map(str::trim).filter(|c| !c.is_empty()) {
        None => Ok(None),
        Some(code) => Coupon::find(code)
            .map(Some)
            .ok_or_else(|| AppError::ValidationFailed("Invalid coupon code".into())),
    }
}

/// Drives one customer's subscriptions from plan selection to cancellation.
///
/// State always comes from the authoritative subscription records; nothing
/// about "has an active subscription" is remembered locally.
#[derive(Clone)]
pub struct LifecycleManager {
    catalog: CatalogStore,
    payments: Arc<dyn PaymentGateway>,
}

impl LifecycleManager {
    pub fn new(catalog: CatalogStore, payments: Arc<dyn PaymentGateway>) -> Self {
        Self { catalog, payments }
    }

    async fn open_subscription(
        &self,
        actor: &Principal,
        business_id: &str,
    ) -> AppResult<Option<Subscription>> {
        let subscriptions = self
            .catalog
            .refresh_subscriptions(actor, &SubscriptionFilter::for_business(business_id))
            .await?;
        Ok(subscriptions.into_iter().find(Subscription::is_open))
    }

    async fn owned_subscription(&self, actor: &Principal, id: &str) -> AppResult<Subscription> {
        require_customer(actor)?;
        let subscription = self.catalog.fetch_subscription(actor, id).await?;
        if subscription.customer_id != actor.id {
            return Err(AppError::AuthForbidden);
        }
        Ok(subscription)
    }

    /// Select a plan.
    ///
    /// Creates a pending subscription when the customer has none with this
    /// business; otherwise it is a plan change on the existing record, which
    /// keeps its id and start date.
    #[instrument(skip(self, actor), fields(customer_id = %actor.id))]
    pub async fn select_plan(&self, actor: &Principal, plan_id: &str) -> AppResult<Subscription> {
        require_customer(actor)?;

        let plan = self.catalog.fetch_plan(actor, plan_id).await?;
        if !plan.is_offered() {
            return Err(AppError::ValidationFailed(
                "Plan is not available for new subscriptions".into(),
            ));
        }
        let business = self.catalog.fetch_business(actor, &plan.business_id).await?;
        if !business.status.accepts_subscribers() {
            return Err(AppError::ValidationFailed(
                "Business is not accepting subscribers".into(),
            ));
        }

        let Some(existing) = self.open_subscription(actor, &plan.business_id).await? else {
            let created = self
                .catalog
                .create_subscription(
                    actor,
                    NewSubscription {
                        customer_id: actor.id.clone(),
                        business_id: plan.business_id.clone(),
                        plan_id: plan.id.clone(),
                        status: SubscriptionStatus::Pending,
                    },
                )
                .await?;
            info!(subscription_id = %created.id, plan_id = %plan.id, "Plan selected");
            return Ok(created);
        };

        if existing.plan_id == plan.id {
            return match existing.status {
                // Still awaiting payment for the same plan.
                SubscriptionStatus::Pending => Ok(existing),
                _ => Err(AppError::ValidationFailed(
                    "Already subscribed to this plan".into(),
                )),
            };
        }

        let changes = match existing.status {
            SubscriptionStatus::Pending => SubscriptionChanges {
                plan_id: Some(plan.id.clone()),
                ..Default::default()
            },
            _ => SubscriptionChanges {
                plan_id: Some(plan.id.clone()),
                status: Some(SubscriptionStatus::Active),
                ..Default::default()
            },
        };
        let changed = self
            .catalog
            .update_subscription(actor, &existing.id, changes)
            .await?;
        info!(
            subscription_id = %changed.id,
            from_plan = %existing.plan_id,
            to_plan = %plan.id,
            "Plan changed"
        );
        Ok(changed)
    }

    /// Capture the first payment and activate the subscription.
    ///
    /// Each call is one attempt with its own idempotency key and is never
    /// retried here. On any failure the subscription stays pending. The
    /// subscription is reserved from the status read until activation, so
    /// a concurrent attempt fails with `Conflict` instead of charging twice.
    #[instrument(skip(self, actor, form), fields(customer_id = %actor.id))]
    pub async fn capture_payment(
        &self,
        actor: &Principal,
        subscription_id: &str,
        form: PaymentForm,
    ) -> AppResult<PaymentOutcome> {
        require_customer(actor)?;
        validate_card(&form.card)?;
        let coupon = parse_coupon(form.coupon_code.as_deref())?;

        let slot = self
            .catalog
            .reserve(EntityKind::Subscription, subscription_id)?;
        let this = self.clone();
        let actor = actor.clone();
        let subscription_id = subscription_id.to_string();
        run_detached(async move {
            this.capture_reserved(&actor, &slot, &subscription_id, form.card, coupon)
                .await
        })
        .await
    }

    async fn capture_reserved(
        &self,
        actor: &Principal,
        slot: &InFlightGuard,
        subscription_id: &str,
        card: CardDetails,
        coupon: Option<Coupon>,
    ) -> AppResult<PaymentOutcome> {
        let subscription = self.owned_subscription(actor, subscription_id).await?;
        if subscription.status != SubscriptionStatus::Pending {
            return Err(AppError::Conflict(
                "Subscription is not awaiting payment".into(),
            ));
        }

        let plan = self.catalog.fetch_plan(actor, &subscription.plan_id).await?;
        let amount = plan.period_price();
        let amount = coupon.map_or(amount, |c| c.apply(amount));

        let request = CaptureRequest {
            subscription_id: subscription.id.clone(),
            amount,
            currency: plan.currency.clone(),
            card,
            idempotency_key: Uuid::new_v4(),
        };
        let receipt = match self.payments.capture(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(
                    subscription_id = %subscription.id,
                    idempotency_key = %request.idempotency_key,
                    error = %e,
                    "Payment capture failed"
                );
                return Err(e);
            }
        };

        let start = receipt.captured_at;
        let next_billing = plan
            .billing_period
            .advance(start)
            .ok_or_else(|| AppError::Unknown("Next billing date out of range".into()))?;

        let activated = match self
            .catalog
            .activate_subscription(
                actor,
                slot,
                &subscription.id,
                start,
                next_billing,
                request.card.summary(),
            )
            .await
        {
            Ok(activated) => activated,
            Err(e) => {
                error!(
                    subscription_id = %subscription.id,
                    transaction_id = %receipt.transaction_id,
                    error = %e,
                    "Payment captured but subscription could not be activated"
                );
                return Err(e);
            }
        };

        info!(
            subscription_id = %activated.id,
            transaction_id = %receipt.transaction_id,
            amount,
            "Subscription activated"
        );
        Ok(PaymentOutcome {
            subscription: activated,
            receipt,
            coupon,
        })
    }

    /// Request cancellation; access continues until the next billing date.
    #[instrument(skip(self, actor), fields(customer_id = %actor.id))]
    pub async fn cancel(&self, actor: &Principal, subscription_id: &str) -> AppResult<Subscription> {
        let subscription = self.owned_subscription(actor, subscription_id).await?;
        if subscription.status != SubscriptionStatus::Active {
            return Err(AppError::Conflict(format!(
                "Cannot cancel a {} subscription",
                subscription.status
            )));
        }

        let changes = SubscriptionChanges {
            status: Some(SubscriptionStatus::CancelPending),
            ..Default::default()
        };
        let cancelled = self
            .catalog
            .update_subscription(actor, subscription_id, changes)
            .await?;
        info!(subscription_id, next_billing_date = ?cancelled.next_billing_date, "Cancellation requested");
        Ok(cancelled)
    }

    /// Undo a pending cancellation before its period ends.
    #[instrument(skip(self, actor), fields(customer_id = %actor.id))]
    pub async fn reactivate(
        &self,
        actor: &Principal,
        subscription_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        let subscription = self.owned_subscription(actor, subscription_id).await?;
        if subscription.status != SubscriptionStatus::CancelPending {
            return Err(AppError::Conflict(format!(
                "Cannot reactivate a {} subscription",
                subscription.status
            )));
        }
        if subscription.has_lapsed_at(now) {
            return Err(AppError::Conflict(
                "The billing period has already ended; subscribe again".into(),
            ));
        }

        let changes = SubscriptionChanges {
            status: Some(SubscriptionStatus::Active),
            ..Default::default()
        };
        let reactivated = self
            .catalog
            .update_subscription(actor, subscription_id, changes)
            .await?;
        info!(subscription_id, "Subscription reactivated");
        Ok(reactivated)
    }

    /// Move every pending cancellation whose period has ended to
    /// `cancelled`. Individual failures are logged and skipped.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn expire_lapsed(
        &self,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Subscription>> {
        let filter = SubscriptionFilter {
            status: Some(SubscriptionStatus::CancelPending),
            ..Default::default()
        };
        let candidates = self.catalog.refresh_subscriptions(actor, &filter).await?;

        let mut expired = Vec::new();
        for subscription in candidates.into_iter().filter(|s| s.has_lapsed_at(now)) {
            match self
                .catalog
                .expire_subscription(actor, &subscription.id, now)
                .await
            {
                Ok(cancelled) => {
                    info!(subscription_id = %cancelled.id, "Subscription expired");
                    expired.push(cancelled);
                }
                Err(e) => {
                    warn!(subscription_id = %subscription.id, error = %e, "Failed to expire subscription");
                }
            }
        }
        Ok(expired)
    }

    /// The customer's subscriptions with their plan and business, newest
    /// state from the service.
    #[instrument(skip(self, actor), fields(customer_id = %actor.id))]
    pub async fn my_subscriptions(
        &self,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<SubscriptionDetails>> {
        require_customer(actor)?;
        let subscriptions = self
            .catalog
            .refresh_subscriptions(actor, &SubscriptionFilter::for_customer(&actor.id))
            .await?;

        let mut details = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            let plan = match self.catalog.plan(&subscription.plan_id) {
                Some(plan) => Some(plan),
                None => self.catalog.fetch_plan(actor, &subscription.plan_id).await.ok(),
            };
            let business = match self.catalog.business(&subscription.business_id) {
                Some(business) => Some(business),
                None => self
                    .catalog
                    .fetch_business(actor, &subscription.business_id)
                    .await
                    .ok(),
            };
            details.push(SubscriptionDetails {
                has_access: subscription.has_access_at(now),
                subscription,
                plan,
                business,
            });
        }
        Ok(details)
    }

    /// What the subscriptions landing shows: the customer's subscriptions
    /// when any grants access, the business catalog otherwise.
    #[instrument(skip(self, actor), fields(customer_id = %actor.id))]
    pub async fn customer_overview(
        &self,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> AppResult<CustomerView> {
        let subscriptions = self.my_subscriptions(actor, now).await?;
        if subscriptions.iter().any(|s| s.has_access) {
            return Ok(CustomerView::Subscribed { subscriptions });
        }

        let businesses = self
            .catalog
            .refresh_businesses(actor)
            .await?
            .into_iter()
            .filter(|b| b.status.accepts_subscribers())
            .collect();
        Ok(CustomerView::Catalog { businesses })
    }
}
