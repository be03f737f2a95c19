use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use strum::{AsRefStr, Display};
use suscridash_types::{Role, SubscriptionStatus, UserDto};
use tracing::{info, instrument, warn};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::catalog_service::CatalogService,
    domain::entities::{
        business::{Business, BusinessChanges, NewBusiness},
        plan::{NewPlan, Plan, PlanChanges},
        principal::{AuthToken, Principal},
        settings::SystemSettings,
        subscription::{NewSubscription, Subscription, SubscriptionChanges, SubscriptionFilter},
    },
    validators::{
        is_valid_email, validate_new_business, validate_new_plan, validate_plan, validate_settings,
    },
};

// ============================================================================
// Cache
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    Business,
    Plan,
    Subscription,
    /// A (customer, business) pair, keyed `customer/business`
    Enrollment,
    Settings,
}

trait Keyed {
    fn key(&self) -> &str;
}

impl Keyed for Business {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Plan {
    fn key(&self) -> &str {
        &self.id
    }
}

impl Keyed for Subscription {
    fn key(&self) -> &str {
        &self.id
    }
}

fn upsert<T: Keyed>(list: &mut Vec<T>, item: T) {
    match list.iter_mut().find(|existing| existing.key() == item.key()) {
        Some(existing) => *existing = item,
        None => list.push(item),
    }
}

fn remove<T: Keyed>(list: &mut Vec<T>, id: &str) {
    list.retain(|item| item.key() != id);
}

/// Last-known state of the catalog, as returned by the service.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub businesses: Vec<Business>,
    pub plans: Vec<Plan>,
    pub subscriptions: Vec<Subscription>,
    pub users: Vec<UserDto>,
    /// Only loaded for admins
    pub settings: Option<SystemSettings>,
}

struct CatalogInner {
    service: Arc<dyn CatalogService>,
    cache: RwLock<CatalogSnapshot>,
    in_flight: Mutex<HashSet<(EntityKind, String)>>,
}

impl CatalogInner {
    fn read<R>(&self, f: impl FnOnce(&CatalogSnapshot) -> R) -> R {
        f(&self.cache.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn write(&self, f: impl FnOnce(&mut CatalogSnapshot)) {
        f(&mut self.cache.write().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Marks one entity as having a mutation outstanding; released on drop.
pub(crate) struct InFlightGuard {
    inner: Arc<CatalogInner>,
    key: (EntityKind, String),
}

impl InFlightGuard {
    fn acquire(inner: &Arc<CatalogInner>, kind: EntityKind, id: &str) -> AppResult<Self> {
        let key = (kind, id.to_string());
        let mut in_flight = inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(key.clone()) {
            return Err(AppError::Conflict(format!(
                "An update to {} {} is already in progress",
                kind, id
            )));
        }
        Ok(Self {
            inner: inner.clone(),
            key,
        })
    }

    fn covers(&self, inner: &Arc<CatalogInner>, kind: EntityKind, id: &str) -> bool {
        Arc::ptr_eq(&self.inner, inner) && self.key.0 == kind && self.key.1 == id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

/// Run a mutation on its own task so the write and the cache
/// reconciliation complete even if the caller stops waiting.
pub(crate) async fn run_detached<T, F>(mutation: F) -> AppResult<T>
where
    T: Send + 'static,
    F: Future<Output = AppResult<T>> + Send + 'static,
{
    match tokio::spawn(mutation).await {
        Ok(result) => result,
        Err(e) => Err(AppError::Unknown(format!("Catalog mutation task failed: {}", e))),
    }
}

// ============================================================================
// Authorization helpers
// ============================================================================

fn require_admin(actor: &Principal) -> AppResult<()> {
    if actor.is(Role::Admin) {
        Ok(())
    } else {
        Err(AppError::AuthForbidden)
    }
}

/// Admins manage every business; a business principal manages only itself.
fn require_business_manager(actor: &Principal, business_id: &str) -> AppResult<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Business if actor.id == business_id => Ok(()),
        _ => Err(AppError::AuthForbidden),
    }
}

fn require_subscription_owner(actor: &Principal, subscription: &Subscription) -> AppResult<()> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Customer if actor.id == subscription.customer_id => Ok(()),
        _ => Err(AppError::AuthForbidden),
    }
}

/// Narrow a subscription query to what the actor may see.
fn scope_filter(actor: &Principal, filter: &SubscriptionFilter) -> AppResult<SubscriptionFilter> {
    let mut scoped = filter.clone();
    match actor.role {
        Role::Admin => {}
        Role::Business => scoped.business_id = Some(actor.id.clone()),
        Role::Customer => scoped.customer_id = Some(actor.id.clone()),
        Role::Unknown => return Err(AppError::AuthForbidden),
    }
    Ok(scoped)
}

fn require_known(actor: &Principal) -> AppResult<()> {
    if actor.role.is_known() {
        Ok(())
    } else {
        Err(AppError::AuthForbidden)
    }
}

async fn open_subscriptions(
    service: &dyn CatalogService,
    token: &AuthToken,
    filter: &SubscriptionFilter,
) -> AppResult<usize> {
    let subscriptions = service.list_subscriptions(token, filter).await?;
    Ok(subscriptions
        .iter()
        .filter(|s| filter.matches(s) && s.is_open())
        .count())
}

// ============================================================================
// Subscription writes
// ============================================================================

/// The path a subscription write arrives through.
#[derive(Debug, Clone, Copy)]
enum WriteOrigin {
    /// Plan changes, cancellation requests and reactivation
    Direct,
    /// Activation after the first payment was captured
    Capture,
    /// Closing a pending cancellation whose period ended
    Expiry(DateTime<Utc>),
}

impl WriteOrigin {
    fn admits(self, current: &Subscription, changes: &SubscriptionChanges) -> AppResult<()> {
        match self {
            WriteOrigin::Direct => {
                if changes.start_date.is_some()
                    || changes.next_billing_date.is_some()
                    || changes.payment_method_summary.is_some()
                {
                    return Err(AppError::ValidationFailed(
                        "Billing details are set only by a captured payment".into(),
                    ));
                }
                match (current.status, changes.status) {
                    (SubscriptionStatus::Pending, Some(SubscriptionStatus::Active)) => Err(
                        AppError::Conflict("Activation requires a captured payment".into()),
                    ),
                    (SubscriptionStatus::CancelPending, Some(SubscriptionStatus::Cancelled)) => {
                        Err(AppError::Conflict(
                            "A cancellation takes effect when the billing period ends".into(),
                        ))
                    }
                    _ => Ok(()),
                }
            }
            WriteOrigin::Capture if current.status != SubscriptionStatus::Pending => Err(
                AppError::Conflict("Subscription is not awaiting payment".into()),
            ),
            WriteOrigin::Expiry(now) if !current.has_lapsed_at(now) => Err(AppError::Conflict(
                "Subscription billing period has not ended".into(),
            )),
            WriteOrigin::Capture | WriteOrigin::Expiry(_) => Ok(()),
        }
    }
}

/// Read, check and write one subscription. The caller holds its slot.
async fn write_subscription(
    inner: &CatalogInner,
    actor: &Principal,
    id: &str,
    changes: &SubscriptionChanges,
    origin: WriteOrigin,
) -> AppResult<Subscription> {
    let token = &actor.auth_token;
    let current = inner.service.get_subscription(token, id).await?;
    require_subscription_owner(actor, &current)?;

    if let Some(next) = changes.status.filter(|s| !current.status.can_transition_to(*s)) {
        return Err(AppError::Conflict(format!(
            "Subscription cannot move from {} to {}",
            current.status, next
        )));
    }
    origin.admits(&current, changes)?;
    if let Some(plan_id) = &changes.plan_id {
        let plan = inner.service.get_plan(token, plan_id).await?;
        if plan.business_id != current.business_id {
            return Err(AppError::ValidationFailed(
                "Plan does not belong to this business".into(),
            ));
        }
    }

    let updated = inner.service.update_subscription(token, id, changes).await?;
    inner.write(|c| upsert(&mut c.subscriptions, updated.clone()));
    info!(
        subscription_id = %id,
        from = %current.status,
        to = %updated.status,
        ?origin,
        "Subscription updated"
    );
    Ok(updated)
}

// ============================================================================
// Catalog Store
// ============================================================================

/// In-memory cache of businesses, plans and subscriptions, mutated only
/// through server round-trips.
///
/// Every successful write replaces the cached entity with the record the
/// service returned. Failed writes leave the cache untouched. At most one
/// mutation per entity is outstanding at a time.
#[derive(Clone)]
pub struct CatalogStore {
    inner: Arc<CatalogInner>,
}

impl CatalogStore {
    pub fn new(service: Arc<dyn CatalogService>) -> Self {
        Self {
            inner: Arc::new(CatalogInner {
                service,
                cache: RwLock::new(CatalogSnapshot::default()),
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    // ========================================================================
    // Cached reads
    // ========================================================================

    pub fn snapshot(&self) -> CatalogSnapshot {
        self.inner.read(|c| c.clone())
    }

    pub fn businesses(&self) -> Vec<Business> {
        self.inner.read(|c| c.businesses.clone())
    }

    pub fn business(&self, id: &str) -> Option<Business> {
        self.inner
            .read(|c| c.businesses.iter().find(|b| b.id == id).cloned())
    }

    pub fn plans_for(&self, business_id: &str) -> Vec<Plan> {
        self.inner.read(|c| {
            c.plans
                .iter()
                .filter(|p| p.business_id == business_id)
                .cloned()
                .collect()
        })
    }

    pub fn plan(&self, id: &str) -> Option<Plan> {
        self.inner.read(|c| c.plans.iter().find(|p| p.id == id).cloned())
    }

    /// Plans a new subscriber may choose: the plan is active and its
    /// business, when known, accepts subscribers.
    pub fn offered_plans(&self, business_id: &str) -> Vec<Plan> {
        self.inner.read(|c| {
            let business_open = c
                .businesses
                .iter()
                .find(|b| b.id == business_id)
                .is_none_or(|b| b.status.accepts_subscribers());
            if !business_open {
                return Vec::new();
            }
            c.plans
                .iter()
                .filter(|p| p.business_id == business_id && p.is_offered())
                .cloned()
                .collect()
        })
    }

    pub fn subscriptions_matching(&self, filter: &SubscriptionFilter) -> Vec<Subscription> {
        self.inner.read(|c| {
            c.subscriptions
                .iter()
                .filter(|s| filter.matches(s))
                .cloned()
                .collect()
        })
    }

    pub fn subscription(&self, id: &str) -> Option<Subscription> {
        self.inner
            .read(|c| c.subscriptions.iter().find(|s| s.id == id).cloned())
    }

    pub fn users(&self) -> Vec<UserDto> {
        self.inner.read(|c| c.users.clone())
    }

    // ========================================================================
    // Refresh (server -> cache); failures keep the last-known cache
    // ========================================================================

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn refresh_businesses(&self, actor: &Principal) -> AppResult<Vec<Business>> {
        require_known(actor)?;
        let businesses = self
            .inner
            .service
            .list_businesses(&actor.auth_token)
            .await?;
        self.inner.write(|c| c.businesses = businesses.clone());
        Ok(businesses)
    }

    /// Refresh all plans, or only those of one business.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn refresh_plans(
        &self,
        actor: &Principal,
        business_id: Option<&str>,
    ) -> AppResult<Vec<Plan>> {
        require_known(actor)?;
        let plans = self
            .inner
            .service
            .list_plans(&actor.auth_token, business_id)
            .await?;
        self.inner.write(|c| match business_id {
            Some(id) => {
                c.plans.retain(|p| p.business_id != id);
                c.plans.extend(plans.iter().cloned());
            }
            None => c.plans = plans.clone(),
        });
        Ok(plans)
    }

    /// Refresh the subscriptions matching `filter`, narrowed to what the
    /// actor may see.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn refresh_subscriptions(
        &self,
        actor: &Principal,
        filter: &SubscriptionFilter,
    ) -> AppResult<Vec<Subscription>> {
        let scoped = scope_filter(actor, filter)?;
        let subscriptions = self
            .inner
            .service
            .list_subscriptions(&actor.auth_token, &scoped)
            .await?;
        self.inner.write(|c| {
            c.subscriptions.retain(|s| !scoped.matches(s));
            c.subscriptions.extend(subscriptions.iter().cloned());
        });
        Ok(subscriptions)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn refresh_users(&self, actor: &Principal) -> AppResult<Vec<UserDto>> {
        require_admin(actor)?;
        let users = self.inner.service.list_users(&actor.auth_token).await?;
        self.inner.write(|c| c.users = users.clone());
        Ok(users)
    }

    /// Refresh everything the actor's dashboard reads.
    pub async fn refresh_all(&self, actor: &Principal) -> AppResult<()> {
        self.refresh_businesses(actor).await?;
        let own_business = actor.is(Role::Business).then_some(actor.id.as_str());
        self.refresh_plans(actor, own_business).await?;
        self.refresh_subscriptions(actor, &SubscriptionFilter::default())
            .await?;
        if actor.is(Role::Admin) {
            self.refresh_users(actor).await?;
        }
        Ok(())
    }

    /// Read one business from the service and reconcile the cache with it.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn fetch_business(&self, actor: &Principal, id: &str) -> AppResult<Business> {
        require_known(actor)?;
        let business = self
            .inner
            .service
            .get_business(&actor.auth_token, id)
            .await?;
        self.inner
            .write(|c| upsert(&mut c.businesses, business.clone()));
        Ok(business)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn fetch_plan(&self, actor: &Principal, id: &str) -> AppResult<Plan> {
        require_known(actor)?;
        let plan = self.inner.service.get_plan(&actor.auth_token, id).await?;
        self.inner.write(|c| upsert(&mut c.plans, plan.clone()));
        Ok(plan)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn fetch_subscription(&self, actor: &Principal, id: &str) -> AppResult<Subscription> {
        require_known(actor)?;
        let subscription = self
            .inner
            .service
            .get_subscription(&actor.auth_token, id)
            .await?;
        require_subscription_owner(actor, &subscription).or_else(|_| {
            require_business_manager(actor, &subscription.business_id)
        })?;
        self.inner
            .write(|c| upsert(&mut c.subscriptions, subscription.clone()));
        Ok(subscription)
    }

    // ========================================================================
    // System settings (admin)
    // ========================================================================

    /// Cached settings, when an admin has loaded them.
    pub fn cached_settings(&self) -> Option<SystemSettings> {
        self.inner.read(|c| c.settings.clone())
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn settings(&self, actor: &Principal) -> AppResult<SystemSettings> {
        require_admin(actor)?;
        let settings = self.inner.service.get_settings(&actor.auth_token).await?;
        self.inner.write(|c| c.settings = Some(settings.clone()));
        Ok(settings)
    }

    #[instrument(skip(self, actor, settings), fields(actor_id = %actor.id))]
    pub async fn update_settings(
        &self,
        actor: &Principal,
        settings: SystemSettings,
    ) -> AppResult<SystemSettings> {
        require_admin(actor)?;
        validate_settings(&settings)?;

        let guard = InFlightGuard::acquire(&self.inner, EntityKind::Settings, "system")?;
        let inner = self.inner.clone();
        let token = actor.auth_token.clone();
        run_detached(async move {
            let _guard = guard;
            let saved = inner.service.update_settings(&token, &settings).await?;
            inner.write(|c| c.settings = Some(saved.clone()));
            info!(currency = %saved.currency, "System settings updated");
            Ok(saved)
        })
        .await
    }

    // ========================================================================
    // Business mutations (admin)
    // ========================================================================

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn create_business(
        &self,
        actor: &Principal,
        business: NewBusiness,
    ) -> AppResult<Business> {
        require_admin(actor)?;
        validate_new_business(&business)?;

        let inner = self.inner.clone();
        let token = actor.auth_token.clone();
        run_detached(async move {
            let created = inner.service.create_business(&token, &business).await?;
            inner.write(|c| upsert(&mut c.businesses, created.clone()));
            info!(business_id = %created.id, "Business created");
            Ok(created)
        })
        .await
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn update_business(
        &self,
        actor: &Principal,
        id: &str,
        changes: BusinessChanges,
    ) -> AppResult<Business> {
        require_admin(actor)?;
        if changes.is_empty() {
            return Err(AppError::ValidationFailed("Nothing to update".into()));
        }
        if changes
            .contact_email
            .as_deref()
            .is_some_and(|email| !is_valid_email(email))
        {
            return Err(AppError::ValidationFailed(
                "Contact email format is invalid".into(),
            ));
        }

        let guard = InFlightGuard::acquire(&self.inner, EntityKind::Business, id)?;
        let inner = self.inner.clone();
        let token = actor.auth_token.clone();
        let id = id.to_string();
        run_detached(async move {
            let _guard = guard;
            let current = inner.service.get_business(&token, &id).await?;
            if let Some(next) = changes.status.filter(|s| !current.status.can_transition_to(*s)) {
                return Err(AppError::Conflict(format!(
                    "Business cannot move from {} to {}",
                    current.status, next
                )));
            }

            let updated = inner.service.update_business(&token, &id, &changes).await?;
            inner.write(|c| upsert(&mut c.businesses, updated.clone()));
            info!(business_id = %id, status = %updated.status, "Business updated");
            Ok(updated)
        })
        .await
    }

    /// Delete a business that has no open subscriptions.
    ///
    /// Its plans and historical subscriptions stay in place.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn delete_business(&self, actor: &Principal, id: &str) -> AppResult<()> {
        require_admin(actor)?;

        let guard = InFlightGuard::acquire(&self.inner, EntityKind::Business, id)?;
        let inner = self.inner.clone();
        let token = actor.auth_token.clone();
        let id = id.to_string();
        run_detached(async move {
            let _guard = guard;
            let open = open_subscriptions(
                inner.service.as_ref(),
                &token,
                &SubscriptionFilter::for_business(&id),
            )
            .await?;
            if open > 0 {
                warn!(business_id = %id, open, "Refusing to delete business with open subscriptions");
                return Err(AppError::Conflict(format!(
                    "Business has {} open subscription(s)",
                    open
                )));
            }

            inner.service.delete_business(&token, &id).await?;
            inner.write(|c| remove(&mut c.businesses, &id));
            info!(business_id = %id, "Business deleted");
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Plan mutations (admin or owning business)
    // ========================================================================

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn create_plan(&self, actor: &Principal, plan: NewPlan) -> AppResult<Plan> {
        require_business_manager(actor, &plan.business_id)?;
        validate_new_plan(&plan)?;

        let inner = self.inner.clone();
        let token = actor.auth_token.clone();
        run_detached(async move {
            // Surfaces NotFound for an unknown business before anything is written.
            inner.service.get_business(&token, &plan.business_id).await?;
            let created = inner.service.create_plan(&token, &plan).await?;
            inner.write(|c| upsert(&mut c.plans, created.clone()));
            info!(plan_id = %created.id, business_id = %created.business_id, "Plan created");
            Ok(created)
        })
        .await
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn update_plan(
        &self,
        actor: &Principal,
        id: &str,
        changes: PlanChanges,
    ) -> AppResult<Plan> {
        require_known(actor)?;

        let guard = InFlightGuard::acquire(&self.inner, EntityKind::Plan, id)?;
        let inner = self.inner.clone();
        let actor = actor.clone();
        let id = id.to_string();
        run_detached(async move {
            let _guard = guard;
            let token = &actor.auth_token;
            let current = inner.service.get_plan(token, &id).await?;
            require_business_manager(&actor, &current.business_id)?;
            validate_plan(&changes.applied_to(&current))?;
            if let Some(next) = changes.status.filter(|s| !current.status.can_transition_to(*s)) {
                return Err(AppError::Conflict(format!(
                    "Plan cannot move from {} to {}",
                    current.status, next
                )));
            }

            let updated = inner.service.update_plan(token, &id, &changes).await?;
            inner.write(|c| upsert(&mut c.plans, updated.clone()));
            info!(plan_id = %id, "Plan updated");
            Ok(updated)
        })
        .await
    }

    /// Delete a plan nobody is subscribed to.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn delete_plan(&self, actor: &Principal, id: &str) -> AppResult<()> {
        require_known(actor)?;

        let guard = InFlightGuard::acquire(&self.inner, EntityKind::Plan, id)?;
        let inner = self.inner.clone();
        let actor = actor.clone();
        let id = id.to_string();
        run_detached(async move {
            let _guard = guard;
            let token = &actor.auth_token;
            let current = inner.service.get_plan(token, &id).await?;
            require_business_manager(&actor, &current.business_id)?;

            let open = open_subscriptions(
                inner.service.as_ref(),
                token,
                &SubscriptionFilter::for_plan(&id),
            )
            .await?;
            if open > 0 {
                warn!(plan_id = %id, open, "Refusing to delete plan with open subscriptions");
                return Err(AppError::Conflict(format!(
                    "Plan has {} open subscription(s)",
                    open
                )));
            }

            inner.service.delete_plan(token, &id).await?;
            inner.write(|c| remove(&mut c.plans, &id));
            info!(plan_id = %id, "Plan deleted");
            Ok(())
        })
        .await
    }

    // ========================================================================
    // Subscription mutations
    // ========================================================================

    /// Create a subscription, keeping at most one open subscription per
    /// (customer, business).
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn create_subscription(
        &self,
        actor: &Principal,
        subscription: NewSubscription,
    ) -> AppResult<Subscription> {
        match actor.role {
            Role::Admin => {}
            Role::Customer if actor.id == subscription.customer_id => {}
            _ => return Err(AppError::AuthForbidden),
        }

        let enrollment = format!("{}/{}", subscription.customer_id, subscription.business_id);
        let guard = InFlightGuard::acquire(&self.inner, EntityKind::Enrollment, &enrollment)?;
        let inner = self.inner.clone();
        let token = actor.auth_token.clone();
        run_detached(async move {
            let _guard = guard;
            let plan = inner.service.get_plan(&token, &subscription.plan_id).await?;
            if plan.business_id != subscription.business_id {
                return Err(AppError::ValidationFailed(
                    "Plan does not belong to this business".into(),
                ));
            }
            if !plan.is_offered() {
                return Err(AppError::ValidationFailed(
                    "Plan is not available for new subscriptions".into(),
                ));
            }

            let pair = SubscriptionFilter {
                customer_id: Some(subscription.customer_id.clone()),
                business_id: Some(subscription.business_id.clone()),
                ..Default::default()
            };
            if open_subscriptions(inner.service.as_ref(), &token, &pair).await? > 0 {
                return Err(AppError::Conflict(
                    "Customer already has an open subscription with this business".into(),
                ));
            }

            let created = inner
                .service
                .create_subscription(&token, &subscription)
                .await?;
            inner.write(|c| upsert(&mut c.subscriptions, created.clone()));
            info!(subscription_id = %created.id, plan_id = %created.plan_id, "Subscription created");
            Ok(created)
        })
        .await
    }

    /// Apply changes to a subscription, enforcing the lifecycle transition
    /// table on status writes.
    ///
    /// Activating a pending subscription, closing a pending cancellation and
    /// writing billing details are not available here: those happen only
    /// after a captured payment or once the billing period has ended.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn update_subscription(
        &self,
        actor: &Principal,
        id: &str,
        changes: SubscriptionChanges,
    ) -> AppResult<Subscription> {
        require_known(actor)?;
        if changes == SubscriptionChanges::default() {
            return Err(AppError::ValidationFailed("Nothing to update".into()));
        }

        let guard = InFlightGuard::acquire(&self.inner, EntityKind::Subscription, id)?;
        let inner = self.inner.clone();
        let actor = actor.clone();
        let id = id.to_string();
        run_detached(async move {
            let _guard = guard;
            write_subscription(&inner, &actor, &id, &changes, WriteOrigin::Direct).await
        })
        .await
    }

    /// Claim the mutation slot of one entity until the guard is dropped.
    pub(crate) fn reserve(&self, kind: EntityKind, id: &str) -> AppResult<InFlightGuard> {
        InFlightGuard::acquire(&self.inner, kind, id)
    }

    /// Activate a pending subscription whose first payment was captured.
    ///
    /// `slot` must be this store's reservation of the subscription, taken
    /// before its status was read for the capture.
    pub(crate) async fn activate_subscription(
        &self,
        actor: &Principal,
        slot: &InFlightGuard,
        id: &str,
        start: DateTime<Utc>,
        next_billing: DateTime<Utc>,
        payment_method_summary: String,
    ) -> AppResult<Subscription> {
        if !slot.covers(&self.inner, EntityKind::Subscription, id) {
            return Err(AppError::Unknown(format!(
                "Activation of subscription {} without its reservation",
                id
            )));
        }
        let changes = SubscriptionChanges {
            status: Some(SubscriptionStatus::Active),
            start_date: Some(start),
            next_billing_date: Some(next_billing),
            payment_method_summary: Some(payment_method_summary),
            ..Default::default()
        };
        write_subscription(&self.inner, actor, id, &changes, WriteOrigin::Capture).await
    }

    /// Close a pending cancellation whose paid period ended before `now`.
    pub(crate) async fn expire_subscription(
        &self,
        actor: &Principal,
        id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Subscription> {
        let guard = InFlightGuard::acquire(&self.inner, EntityKind::Subscription, id)?;
        let inner = self.inner.clone();
        let actor = actor.clone();
        let id = id.to_string();
        run_detached(async move {
            let _guard = guard;
            let changes = SubscriptionChanges {
                status: Some(SubscriptionStatus::Cancelled),
                ..Default::default()
            };
            write_subscription(&inner, &actor, &id, &changes, WriteOrigin::Expiry(now)).await
        })
        .await
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn delete_subscription(&self, actor: &Principal, id: &str) -> AppResult<()> {
        require_admin(actor)?;

        let guard = InFlightGuard::acquire(&self.inner, EntityKind::Subscription, id)?;
        let inner = self.inner.clone();
        let token = actor.auth_token.clone();
        let id = id.to_string();
        run_detached(async move {
            let _guard = guard;
            inner.service.delete_subscription(&token, &id).await?;
            inner.write(|c| remove(&mut c.subscriptions, &id));
            info!(subscription_id = %id, "Subscription deleted");
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use suscridash_types::{BusinessStatus, PlanStatus, SubscriptionStatus};

    use crate::test_utils::{
        InMemoryCatalogService, create_test_new_plan, create_test_principal,
        create_test_subscription,
    };

    fn admin() -> Principal {
        create_test_principal(Role::Admin, |p| p.id = "admin-1".into())
    }

    fn business(id: &str) -> Principal {
        create_test_principal(Role::Business, |p| p.id = id.into())
    }

    fn customer(id: &str) -> Principal {
        create_test_principal(Role::Customer, |p| p.id = id.into())
    }

    fn new_business() -> NewBusiness {
        NewBusiness {
            legal_name: "Tech Solutions SA".into(),
            contact_email: "tech@solutions.cl".into(),
            tax_id: "76543210-1".into(),
            status: None,
        }
    }

    fn setup() -> (Arc<InMemoryCatalogService>, CatalogStore) {
        let service = Arc::new(InMemoryCatalogService::new());
        let store = CatalogStore::new(service.clone());
        (service, store)
    }

    #[tokio::test]
    async fn test_create_business_caches_canonical_record() {
        let (service, store) = setup();
        let created = store.create_business(&admin(), new_business()).await.unwrap();

        // Server-side defaulting is reflected, not the draft.
        assert_eq!(created.status, BusinessStatus::Pending);
        assert_eq!(created.subscriber_count, 0);
        assert_eq!(store.business(&created.id), Some(created.clone()));

        let read_back = store.fetch_business(&admin(), &created.id).await.unwrap();
        assert_eq!(read_back, created);
        assert_eq!(service.businesses().len(), 1);
    }

    #[tokio::test]
    async fn test_only_admin_manages_businesses() {
        let (service, store) = setup();
        let result = store.create_business(&business("b1"), new_business()).await;
        assert_eq!(result, Err(AppError::AuthForbidden));
        assert!(service.businesses().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let (service, store) = setup();
        let created = store.create_business(&admin(), new_business()).await.unwrap();
        service.fail_next(AppError::Transient("connection reset".into()));

        let changes = BusinessChanges {
            legal_name: Some("Otro Nombre".into()),
            ..Default::default()
        };
        let result = store.update_business(&admin(), &created.id, changes).await;
        assert!(matches!(result, Err(AppError::Transient(_))));
        assert_eq!(store.business(&created.id), Some(created));
    }

    #[tokio::test]
    async fn test_business_status_transitions_are_enforced() {
        let (_, store) = setup();
        let created = store.create_business(&admin(), new_business()).await.unwrap();
        let to = |status| BusinessChanges {
            status: Some(status),
            ..Default::default()
        };

        let active = store
            .update_business(&admin(), &created.id, to(BusinessStatus::Active))
            .await
            .unwrap();
        assert_eq!(active.status, BusinessStatus::Active);

        let back = store
            .update_business(&admin(), &created.id, to(BusinessStatus::Pending))
            .await;
        assert!(matches!(back, Err(AppError::Conflict(_))));
        assert_eq!(store.business(&created.id).unwrap().status, BusinessStatus::Active);

        // Same-status write is accepted.
        assert!(
            store
                .update_business(&admin(), &created.id, to(BusinessStatus::Active))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_delete_business_with_open_subscriptions_conflicts() {
        let (service, store) = setup();
        let b = service.seed_business(|b| b.status = BusinessStatus::Active);
        let plan = service.seed_plan(&b.id, |_| {});
        for customer_id in ["c1", "c2"] {
            service.seed_subscription(create_test_subscription(customer_id, &b.id, &plan.id, |s| {
                s.status = SubscriptionStatus::Active
            }));
        }
        store.refresh_all(&admin()).await.unwrap();

        let result = store.delete_business(&admin(), &b.id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(store.business(&b.id).is_some());
        assert_eq!(service.businesses().len(), 1);
        let subs = store.subscriptions_matching(&SubscriptionFilter::for_business(&b.id));
        assert!(subs.iter().all(|s| s.status == SubscriptionStatus::Active));
        assert_eq!(subs.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_business_keeps_history() {
        let (service, store) = setup();
        let b = service.seed_business(|_| {});
        let plan = service.seed_plan(&b.id, |_| {});
        let old = service.seed_subscription(create_test_subscription("c1", &b.id, &plan.id, |s| {
            s.status = SubscriptionStatus::Cancelled
        }));
        store.refresh_all(&admin()).await.unwrap();

        store.delete_business(&admin(), &b.id).await.unwrap();
        assert!(store.business(&b.id).is_none());
        assert!(store.subscription(&old.id).is_some());
        assert!(store.plan(&plan.id).is_some());
        assert!(service.subscription(&old.id).is_some());
    }

    #[tokio::test]
    async fn test_business_manages_only_its_own_plans() {
        let (service, store) = setup();
        let mine = service.seed_business(|b| b.id = "b1".into());
        let theirs = service.seed_business(|b| b.id = "b2".into());

        let created = store
            .create_plan(&business("b1"), create_test_new_plan(&mine.id, |_| {}))
            .await
            .unwrap();
        assert_eq!(created.business_id, "b1");

        let denied = store
            .create_plan(&business("b1"), create_test_new_plan(&theirs.id, |_| {}))
            .await;
        assert_eq!(denied, Err(AppError::AuthForbidden));
    }

    #[tokio::test]
    async fn test_plan_pricing_rules_on_create() {
        let (service, store) = setup();
        let b = service.seed_business(|_| {});

        let free = store
            .create_plan(&admin(), create_test_new_plan(&b.id, |p| {
                p.monthly_price = 0;
                p.yearly_price = None;
            }))
            .await;
        assert!(free.is_ok());

        let surcharge = store
            .create_plan(&admin(), create_test_new_plan(&b.id, |p| {
                p.monthly_price = 10_000;
                p.yearly_price = Some(130_000);
            }))
            .await;
        assert!(matches!(surcharge, Err(AppError::ValidationFailed(_))));
        assert_eq!(service.plans().len(), 1);
    }

    #[tokio::test]
    async fn test_update_plan_validates_merged_result() {
        let (service, store) = setup();
        let b = service.seed_business(|_| {});
        let plan = service.seed_plan(&b.id, |p| {
            p.monthly_price = 19_900;
            p.yearly_price = Some(179_900);
        });

        let changes = PlanChanges {
            monthly_price: Some(10_000),
            ..Default::default()
        };
        let result = store.update_plan(&admin(), &plan.id, changes).await;
        assert!(matches!(result, Err(AppError::ValidationFailed(_))));

        let deactivate = PlanChanges {
            status: Some(PlanStatus::Inactive),
            ..Default::default()
        };
        let updated = store.update_plan(&admin(), &plan.id, deactivate).await.unwrap();
        assert_eq!(updated.status, PlanStatus::Inactive);
        assert!(store.offered_plans(&b.id).is_empty());
    }

    #[tokio::test]
    async fn test_delete_plan_with_subscribers_conflicts() {
        let (service, store) = setup();
        let b = service.seed_business(|_| {});
        let plan = service.seed_plan(&b.id, |_| {});
        service.seed_subscription(create_test_subscription("c1", &b.id, &plan.id, |s| {
            s.status = SubscriptionStatus::CancelPending
        }));

        let result = store.delete_plan(&admin(), &plan.id).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert!(service.plan(&plan.id).is_some());
    }

    #[tokio::test]
    async fn test_delete_unused_plan() {
        let (service, store) = setup();
        let b = service.seed_business(|b| b.id = "b1".into());
        let plan = service.seed_plan(&b.id, |_| {});
        store.refresh_plans(&business("b1"), Some("b1")).await.unwrap();

        store.delete_plan(&business("b1"), &plan.id).await.unwrap();
        assert!(store.plan(&plan.id).is_none());
        assert!(service.plan(&plan.id).is_none());
    }

    #[tokio::test]
    async fn test_second_open_subscription_for_same_business_conflicts() {
        let (service, store) = setup();
        let b = service.seed_business(|b| b.status = BusinessStatus::Active);
        let basic = service.seed_plan(&b.id, |_| {});
        let premium = service.seed_plan(&b.id, |p| p.name = "Premium".into());
        let c = customer("c1");

        let new_sub = |plan_id: &str| NewSubscription {
            customer_id: "c1".into(),
            business_id: b.id.clone(),
            plan_id: plan_id.into(),
            status: SubscriptionStatus::Pending,
        };
        store.create_subscription(&c, new_sub(&basic.id)).await.unwrap();
        let second = store.create_subscription(&c, new_sub(&premium.id)).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let open = service
            .subscriptions()
            .into_iter()
            .filter(|s| s.customer_id == "c1" && s.is_open())
            .count();
        assert_eq!(open, 1);
    }

    #[tokio::test]
    async fn test_customer_cannot_subscribe_someone_else() {
        let (service, store) = setup();
        let b = service.seed_business(|_| {});
        let plan = service.seed_plan(&b.id, |_| {});
        let result = store
            .create_subscription(
                &customer("c1"),
                NewSubscription {
                    customer_id: "c2".into(),
                    business_id: b.id.clone(),
                    plan_id: plan.id.clone(),
                    status: SubscriptionStatus::Pending,
                },
            )
            .await;
        assert_eq!(result, Err(AppError::AuthForbidden));
    }

    #[tokio::test]
    async fn test_illegal_subscription_transition_is_rejected() {
        let (service, store) = setup();
        let b = service.seed_business(|_| {});
        let plan = service.seed_plan(&b.id, |_| {});
        let sub = service.seed_subscription(create_test_subscription("c1", &b.id, &plan.id, |s| {
            s.status = SubscriptionStatus::Cancelled
        }));

        let changes = SubscriptionChanges {
            status: Some(SubscriptionStatus::Active),
            ..Default::default()
        };
        let result = store.update_subscription(&admin(), &sub.id, changes).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(service.subscription(&sub.id).unwrap().status, SubscriptionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_refresh_scopes_subscriptions_to_actor() {
        let (service, store) = setup();
        let b1 = service.seed_business(|b| b.id = "b1".into());
        let b2 = service.seed_business(|b| b.id = "b2".into());
        let p1 = service.seed_plan(&b1.id, |_| {});
        let p2 = service.seed_plan(&b2.id, |_| {});
        service.seed_subscription(create_test_subscription("c1", &b1.id, &p1.id, |_| {}));
        service.seed_subscription(create_test_subscription("c2", &b2.id, &p2.id, |_| {}));

        let seen = store
            .refresh_subscriptions(&business("b1"), &SubscriptionFilter::default())
            .await
            .unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].business_id, "b1");

        let own = store
            .refresh_subscriptions(&customer("c2"), &SubscriptionFilter::default())
            .await
            .unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].customer_id, "c2");
    }

    #[tokio::test]
    async fn test_transient_refresh_keeps_last_known_cache() {
        let (service, store) = setup();
        service.seed_business(|_| {});
        store.refresh_businesses(&admin()).await.unwrap();

        service.fail_next(AppError::Transient("503".into()));
        assert!(store.refresh_businesses(&admin()).await.is_err());
        assert_eq!(store.businesses().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_edit_of_same_entity_is_rejected() {
        let (service, store) = setup();
        let b = service.seed_business(|_| {});
        service.set_delay(Duration::from_millis(100));

        let first = {
            let store = store.clone();
            let id = b.id.clone();
            tokio::spawn(async move {
                let changes = BusinessChanges {
                    legal_name: Some("Primero".into()),
                    ..Default::default()
                };
                store.update_business(&admin(), &id, changes).await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let changes = BusinessChanges {
            legal_name: Some("Segundo".into()),
            ..Default::default()
        };
        let second = store.update_business(&admin(), &b.id, changes).await;
        assert!(matches!(second, Err(AppError::Conflict(_))));

        let first = first.await.unwrap().unwrap();
        assert_eq!(first.legal_name, "Primero");

        // Released once the first write completed.
        service.set_delay(Duration::ZERO);
        let third = BusinessChanges {
            legal_name: Some("Tercero".into()),
            ..Default::default()
        };
        assert!(store.update_business(&admin(), &b.id, third).await.is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_mutation_still_completes_and_reconciles() {
        let (service, store) = setup();
        let b = service.seed_business(|_| {});
        store.refresh_businesses(&admin()).await.unwrap();
        service.set_delay(Duration::from_millis(50));

        let changes = BusinessChanges {
            legal_name: Some("Renombrada".into()),
            ..Default::default()
        };
        let abandoned =
            tokio::time::timeout(Duration::from_millis(10), store.update_business(&admin(), &b.id, changes))
                .await;
        assert!(abandoned.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(service.business(&b.id).unwrap().legal_name, "Renombrada");
        assert_eq!(store.business(&b.id).unwrap().legal_name, "Renombrada");
    }

    fn seeded_subscription(
        service: &InMemoryCatalogService,
        status: SubscriptionStatus,
    ) -> Subscription {
        let b = service.seed_business(|_| {});
        let plan = service.seed_plan(&b.id, |_| {});
        service.seed_subscription(create_test_subscription("c1", &b.id, &plan.id, |s| {
            s.status = status
        }))
    }

    #[tokio::test]
    async fn test_direct_activation_without_payment_is_rejected() {
        let (service, store) = setup();
        let sub = seeded_subscription(&service, SubscriptionStatus::Pending);

        for actor in [customer("c1"), admin()] {
            let changes = SubscriptionChanges {
                status: Some(SubscriptionStatus::Active),
                ..Default::default()
            };
            let result = store.update_subscription(&actor, &sub.id, changes).await;
            assert!(matches!(result, Err(AppError::Conflict(_))));
        }
        assert_eq!(service.subscription(&sub.id).unwrap().status, SubscriptionStatus::Pending);
    }

    #[tokio::test]
    async fn test_customer_cannot_force_cancellation_before_period_ends() {
        let (service, store) = setup();
        let sub = seeded_subscription(&service, SubscriptionStatus::CancelPending);

        let changes = SubscriptionChanges {
            status: Some(SubscriptionStatus::Cancelled),
            ..Default::default()
        };
        let result = store.update_subscription(&customer("c1"), &sub.id, changes).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(
            service.subscription(&sub.id).unwrap().status,
            SubscriptionStatus::CancelPending
        );
    }

    #[tokio::test]
    async fn test_direct_write_of_billing_details_is_rejected() {
        let (service, store) = setup();
        let sub = seeded_subscription(&service, SubscriptionStatus::Active);

        let changes = SubscriptionChanges {
            payment_method_summary: Some("Visa **** 4242".into()),
            ..Default::default()
        };
        let result = store.update_subscription(&customer("c1"), &sub.id, changes).await;
        assert!(matches!(result, Err(AppError::ValidationFailed(_))));
        assert_eq!(service.subscription(&sub.id).unwrap(), sub);
    }

    #[tokio::test]
    async fn test_activation_requires_the_subscription_reservation() {
        let (service, store) = setup();
        let sub = seeded_subscription(&service, SubscriptionStatus::Pending);
        let other = store.reserve(EntityKind::Subscription, "another-id").unwrap();
        let now = Utc::now();

        let result = store
            .activate_subscription(&customer("c1"), &other, &sub.id, now, now, "Visa **** 4242".into())
            .await;
        assert!(matches!(result, Err(AppError::Unknown(_))));

        let slot = store.reserve(EntityKind::Subscription, &sub.id).unwrap();
        let activated = store
            .activate_subscription(&customer("c1"), &slot, &sub.id, now, now, "Visa **** 4242".into())
            .await
            .unwrap();
        assert_eq!(activated.status, SubscriptionStatus::Active);
        assert_eq!(activated.start_date, Some(now));
    }

    #[tokio::test]
    async fn test_concurrent_enrollments_create_one_subscription() {
        let (service, store) = setup();
        let b = service.seed_business(|b| b.status = BusinessStatus::Active);
        let plan = service.seed_plan(&b.id, |_| {});
        service.set_delay(Duration::from_millis(20));

        let new_sub = || NewSubscription {
            customer_id: "c1".into(),
            business_id: b.id.clone(),
            plan_id: plan.id.clone(),
            status: SubscriptionStatus::Pending,
        };
        let c = customer("c1");
        let (first, second) = tokio::join!(
            store.create_subscription(&c, new_sub()),
            store.create_subscription(&c, new_sub())
        );

        assert_eq!([&first, &second].iter().filter(|r| r.is_ok()).count(), 1);
        assert!(matches!(first.or(second), Ok(_)));
        assert_eq!(service.subscriptions().len(), 1);
    }

    #[tokio::test]
    async fn test_created_plan_reads_back_unchanged() {
        let (service, store) = setup();
        let b = service.seed_business(|b| b.id = "b1".into());

        let created = store
            .create_plan(&business("b1"), create_test_new_plan(&b.id, |p| {
                p.name = "Plan Anual".into();
                p.features = vec!["Soporte 24/7".into()];
            }))
            .await
            .unwrap();
        let fetched = store.fetch_plan(&business("b1"), &created.id).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(service.plan(&created.id), Some(created.clone()));
        assert_eq!(store.plan(&created.id), Some(created));
    }

    #[tokio::test]
    async fn test_created_subscription_reads_back_unchanged() {
        let (service, store) = setup();
        let b = service.seed_business(|b| b.status = BusinessStatus::Active);
        let plan = service.seed_plan(&b.id, |_| {});
        let c = customer("c1");

        let created = store
            .create_subscription(
                &c,
                NewSubscription {
                    customer_id: "c1".into(),
                    business_id: b.id.clone(),
                    plan_id: plan.id.clone(),
                    status: SubscriptionStatus::Pending,
                },
            )
            .await
            .unwrap();
        let fetched = store.fetch_subscription(&c, &created.id).await.unwrap();

        assert_eq!(fetched, created);
        assert_eq!(fetched.plan_id, plan.id);
        assert_eq!(fetched.status, SubscriptionStatus::Pending);
        assert_eq!(service.subscription(&created.id), Some(created));
    }

    #[tokio::test]
    async fn test_settings_are_admin_only() {
        let (service, store) = setup();
        assert_eq!(store.settings(&business("b1")).await, Err(AppError::AuthForbidden));

        let changed = SystemSettings {
            currency: "USD".into(),
            ..Default::default()
        };
        let denied = store.update_settings(&customer("c1"), changed).await;
        assert_eq!(denied, Err(AppError::AuthForbidden));
        assert_eq!(service.settings(), SystemSettings::default());
        assert!(store.cached_settings().is_none());
    }

    #[tokio::test]
    async fn test_update_settings_caches_saved_record() {
        let (service, store) = setup();
        let loaded = store.settings(&admin()).await.unwrap();
        assert_eq!(store.cached_settings(), Some(loaded.clone()));

        let changed = SystemSettings {
            system_name: "  Mi Plataforma ".into(),
            currency: "USD".into(),
            session_timeout: 45,
            ..loaded
        };
        let saved = store.update_settings(&admin(), changed).await.unwrap();
        assert_eq!(saved.system_name, "Mi Plataforma");
        assert_eq!(store.cached_settings(), Some(saved.clone()));
        assert_eq!(service.settings(), saved);
    }

    #[tokio::test]
    async fn test_invalid_settings_are_not_sent() {
        let (service, store) = setup();
        let changed = SystemSettings {
            currency: "ARS".into(),
            ..Default::default()
        };
        let result = store.update_settings(&admin(), changed).await;
        assert!(matches!(result, Err(AppError::ValidationFailed(_))));
        assert_eq!(service.settings(), SystemSettings::default());
    }
}
