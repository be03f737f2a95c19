//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use jsonwebtoken::{EncodingKey, Header, encode};
use suscridash_types::{
    BusinessStatus, PlanStatus, Role, SubscriptionStatus, TokenClaims, UserDto,
};
use uuid::Uuid;

use crate::domain::entities::{
    business::Business,
    plan::{BillingPeriod, NewPlan, Plan},
    principal::{AuthToken, Principal},
    subscription::Subscription,
};

pub const TEST_JWT_SECRET: &[u8] = b"test-secret";

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Create a test identity-service user with sensible defaults.
pub fn create_test_user(role: Role, overrides: impl FnOnce(&mut UserDto)) -> UserDto {
    let id = short_id();
    let is_business = role == Role::Business;
    let mut user = UserDto {
        email: format!("user-{}@ejemplo.cl", id),
        id,
        name: "Usuario de Prueba".to_string(),
        user_type: role,
        business_name: is_business.then(|| "Mi Empresa SA".to_string()),
        tax_id: is_business.then(|| "12345678-9".to_string()),
    };
    overrides(&mut user);
    user
}

/// Create a test principal holding an opaque token.
pub fn create_test_principal(role: Role, overrides: impl FnOnce(&mut Principal)) -> Principal {
    let token = AuthToken::new(format!("test-token-{}", short_id()));
    let mut principal = Principal::from_user(create_test_user(role, |_| {}), token);
    overrides(&mut principal);
    principal
}

/// Create a test business with sensible defaults.
pub fn create_test_business(overrides: impl FnOnce(&mut Business)) -> Business {
    let mut business = Business {
        id: short_id(),
        legal_name: "Tech Solutions SA".to_string(),
        contact_email: "contacto@techsolutions.cl".to_string(),
        tax_id: "76543210-1".to_string(),
        status: BusinessStatus::Active,
        subscriber_count: 0,
    };
    overrides(&mut business);
    business
}

/// Create a test plan with sensible defaults.
pub fn create_test_plan(business_id: &str, overrides: impl FnOnce(&mut Plan)) -> Plan {
    let mut plan = Plan {
        id: short_id(),
        business_id: business_id.to_string(),
        name: "Plan Básico".to_string(),
        description: Some("Acceso a las funciones esenciales".to_string()),
        monthly_price: 19_900,
        yearly_price: Some(179_900),
        currency: "CLP".to_string(),
        billing_period: BillingPeriod::Monthly,
        features: vec!["Soporte por email".to_string(), "5 usuarios".to_string()],
        status: PlanStatus::Active,
    };
    overrides(&mut plan);
    plan
}

/// Create a plan draft with the same defaults as `create_test_plan`.
pub fn create_test_new_plan(business_id: &str, overrides: impl FnOnce(&mut NewPlan)) -> NewPlan {
    let plan = create_test_plan(business_id, |_| {});
    let mut draft = NewPlan {
        business_id: plan.business_id,
        name: plan.name,
        description: plan.description,
        monthly_price: plan.monthly_price,
        yearly_price: plan.yearly_price,
        currency: plan.currency,
        billing_period: plan.billing_period,
        features: plan.features,
        status: plan.status,
    };
    overrides(&mut draft);
    draft
}

/// Create a test subscription, pending by default.
pub fn create_test_subscription(
    customer_id: &str,
    business_id: &str,
    plan_id: &str,
    overrides: impl FnOnce(&mut Subscription),
) -> Subscription {
    let mut subscription = Subscription {
        id: short_id(),
        customer_id: customer_id.to_string(),
        business_id: business_id.to_string(),
        plan_id: plan_id.to_string(),
        status: SubscriptionStatus::Pending,
        start_date: None,
        next_billing_date: None,
        payment_method_summary: None,
    };
    overrides(&mut subscription);
    subscription
}

/// Sign an HS256 access token for `user` expiring at `exp` (Unix seconds).
pub fn mint_token(user: &UserDto, exp: i64) -> String {
    let claims = TokenClaims {
        user_id: user.id.clone(),
        email: user.email.clone(),
        user_type: String::from(user.user_type),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_JWT_SECRET),
    )
    .unwrap()
}
