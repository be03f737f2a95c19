use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_gateway::{CaptureReceipt, CaptureRequest, PaymentGateway},
    domain::entities::payment_scenario::PaymentScenario,
};

/// Dummy payment gateway.
///
/// Simulates captures locally without any external call. The outcome is
/// driven by the card number (see `PaymentScenario`). A capture repeated
/// with the same idempotency key replays the original receipt instead of
/// charging again.
#[derive(Default)]
pub struct DummyPaymentGateway {
    keys: Mutex<Vec<Uuid>>,
    receipts: Mutex<HashMap<Uuid, CaptureReceipt>>,
}

impl DummyPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct idempotency keys seen so far, in arrival order.
    pub fn idempotency_keys(&self) -> Vec<Uuid> {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn remember_key(&self, key: Uuid) {
        let mut keys = self
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    /// Process payment scenario and return the gateway's verdict
    fn process_scenario(&self, scenario: PaymentScenario) -> AppResult<()> {
        match scenario {
            PaymentScenario::Success => Ok(()),
            PaymentScenario::GatewayUnavailable => Err(AppError::Transient(
                "Payment gateway is unavailable".to_string(),
            )),
            declined => Err(AppError::PaymentDeclined(
                declined
                    .decline_message()
                    .unwrap_or("Your card was declined.")
                    .to_string(),
            )),
        }
    }
}

#[async_trait]
impl PaymentGateway for DummyPaymentGateway {
    async fn capture(&self, req: &CaptureRequest) -> AppResult<CaptureReceipt> {
        self.remember_key(req.idempotency_key);

        if let Some(receipt) = self
            .receipts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&req.idempotency_key)
        {
            tracing::debug!(
                transaction_id = %receipt.transaction_id,
                "Dummy: Replaying capture for known idempotency key"
            );
            return Ok(receipt.clone());
        }

        let scenario = PaymentScenario::from_card_number(req.card.number());
        tracing::debug!(
            subscription_id = %req.subscription_id,
            scenario = %scenario,
            amount = req.amount,
            currency = %req.currency,
            "Dummy: Processing capture"
        );
        self.process_scenario(scenario)?;

        let receipt = CaptureReceipt {
            transaction_id: format!("dummy_txn_{}", Uuid::new_v4()),
            amount: req.amount,
            captured_at: Utc::now(),
        };
        self.receipts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(req.idempotency_key, receipt.clone());
        Ok(receipt)
    }
}
