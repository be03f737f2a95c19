use suscridash_types::{RegisterRequest, Role};
use validator::ValidateEmail;

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::{
        business::NewBusiness,
        card::CardDetails,
        plan::{NewPlan, Plan},
        settings::{SUPPORTED_CURRENCIES, SystemSettings},
    },
};

const MIN_PASSWORD_LEN: usize = 6;
const MIN_CARD_DIGITS: usize = 13;
const MONTHS_PER_YEAR: i64 = 12;

/// Validates that the input looks like a valid email address
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    !email.is_empty() && email.validate_email()
}

fn invalid(msg: &str) -> AppError {
    AppError::ValidationFailed(msg.to_string())
}

fn require(value: &str, msg: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(invalid(msg));
    }
    Ok(())
}

pub fn validate_login(email: &str, password: &str) -> AppResult<()> {
    require(email, "Email is required")?;
    require(password, "Password is required")?;
    if !is_valid_email(email) {
        return Err(invalid("Email format is invalid"));
    }
    Ok(())
}

pub fn validate_registration(req: &RegisterRequest, terms_accepted: bool) -> AppResult<()> {
    require(&req.full_name, "Full name is required")?;
    if !is_valid_email(&req.email) {
        return Err(invalid("Email format is invalid"));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(invalid("Password must be at least 6 characters"));
    }
    if req.password != req.confirm_password {
        return Err(invalid("Passwords do not match"));
    }
    if !terms_accepted {
        return Err(invalid("Terms and conditions must be accepted"));
    }
    match req.user_type {
        Role::Business => {
            require(
                req.business_name.as_deref().unwrap_or_default(),
                "Business name is required",
            )?;
            require(req.tax_id.as_deref().unwrap_or_default(), "Tax ID is required")?;
        }
        Role::Customer => {}
        Role::Admin | Role::Unknown => {
            return Err(invalid("Only business and customer accounts can register"));
        }
    }
    Ok(())
}

pub fn validate_new_business(business: &NewBusiness) -> AppResult<()> {
    require(&business.legal_name, "Legal name is required")?;
    require(&business.tax_id, "Tax ID is required")?;
    if !is_valid_email(&business.contact_email) {
        return Err(invalid("Contact email format is invalid"));
    }
    Ok(())
}

/// Monthly price must be non-negative; a yearly price is a discount, never
/// a surcharge.
pub fn validate_plan_pricing(monthly_price: i64, yearly_price: Option<i64>) -> AppResult<()> {
    if monthly_price < 0 {
        return Err(invalid("Monthly price cannot be negative"));
    }
    if let Some(yearly) = yearly_price {
        if yearly < 0 {
            return Err(invalid("Yearly price cannot be negative"));
        }
        if yearly > monthly_price.saturating_mul(MONTHS_PER_YEAR) {
            return Err(invalid("Yearly price cannot exceed 12 monthly payments"));
        }
    }
    Ok(())
}

fn validate_plan_fields(
    name: &str,
    currency: &str,
    features: &[String],
    monthly_price: i64,
    yearly_price: Option<i64>,
) -> AppResult<()> {
    require(name, "Plan name is required")?;
    require(currency, "Currency is required")?;
    if features.iter().any(|f| f.trim().is_empty()) {
        return Err(invalid("Plan features cannot be blank"));
    }
    validate_plan_pricing(monthly_price, yearly_price)
}

pub fn validate_plan(plan: &Plan) -> AppResult<()> {
    validate_plan_fields(
        &plan.name,
        &plan.currency,
        &plan.features,
        plan.monthly_price,
        plan.yearly_price,
    )
}

pub fn validate_new_plan(plan: &NewPlan) -> AppResult<()> {
    validate_plan_fields(
        &plan.name,
        &plan.currency,
        &plan.features,
        plan.monthly_price,
        plan.yearly_price,
    )
}

pub fn validate_card(card: &CardDetails) -> AppResult<()> {
    if card.number().len() < MIN_CARD_DIGITS {
        return Err(invalid("Card number must have 13 to 16 digits"));
    }
    require(card.holder_name(), "Card holder name is required")?;
    match card.expiry_parts() {
        Some((month, _)) if (1..=12).contains(&month) => {}
        _ => return Err(invalid("Expiry must be a valid MM/YY date")),
    }
    if card.cvv().len() < 3 {
        return Err(invalid("CVV must have 3 or 4 digits"));
    }
    Ok(())
}

pub fn validate_settings(settings: &SystemSettings) -> AppResult<()> {
    require(&settings.system_name, "System name is required")?;
    if !SUPPORTED_CURRENCIES.contains(&settings.currency.as_str()) {
        return Err(invalid("Currency must be CLP, USD or EUR"));
    }
    if settings.session_timeout == 0 {
        return Err(invalid("Session timeout must be at least 1 minute"));
    }
    let logo = settings.logo_url.trim();
    if !logo.is_empty() && url::Url::parse(logo).is_err() {
        return Err(invalid("Logo URL is invalid"));
    }
    Ok(())
}
