use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::value_objects::settlement::{
    PaymentConfirmation, PaymentFailure, SettlementOutcome,
};

/// Atomic settlement units. Each call runs in one database transaction that locks and
/// re-reads the rows it touches, so concurrent or repeated deliveries of the same
/// verdict converge on one result.
#[async_trait]
#[automock]
pub trait PaymentSettlementRepository {
    /// Completes a pending transaction, activates (or creates) its subscription,
    /// completes the intent and counts the promo code use.
    async fn confirm_payment(&self, confirmation: PaymentConfirmation) -> Result<SettlementOutcome>;

    /// Fails a pending transaction and its tentative subscription.
    async fn fail_payment(&self, failure: PaymentFailure) -> Result<SettlementOutcome>;

    /// Activates a subscription that has no transaction row, paid through its stored
    /// transaction reference.
    async fn confirm_subscription_payment(
        &self,
        subscription_id: Uuid,
        paid_at: DateTime<Utc>,
        gateway_response: Value,
    ) -> Result<SettlementOutcome>;

    async fn fail_subscription_payment(&self, subscription_id: Uuid) -> Result<SettlementOutcome>;
}
