use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{app_error::AppResult, domain::entities::card::CardDetails};

/// One capture attempt. A retry must reuse `idempotency_key`; a new
/// attempt gets a new one.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub subscription_id: String,
    pub amount: i64,
    pub currency: String,
    pub card: CardDetails,
    pub idempotency_key: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureReceipt {
    pub transaction_id: String,
    pub amount: i64,
    pub captured_at: DateTime<Utc>,
}

/// External payment collaborator.
///
/// Fails with `PaymentDeclined` when the card is refused and `Transient`
/// when the gateway cannot be reached.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture(&self, req: &CaptureRequest) -> AppResult<CaptureReceipt>;
}
