use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::entities::{
    payment_transactions::PaymentTransactionEntity, subscriptions::SubscriptionEntity,
};
use crate::domain::value_objects::{
    enums::{
        subscription_statuses::SubscriptionStatus, subscription_types::SubscriptionType,
        transaction_statuses::TransactionStatus,
    },
    money::Amount,
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Pending,
    Completed,
    Failed,
    NotFound,
    Error,
}

impl PollStatus {
    pub fn from_transaction(status: TransactionStatus) -> Self {
        match status {
            TransactionStatus::Pending => PollStatus::Pending,
            TransactionStatus::Completed => PollStatus::Completed,
            TransactionStatus::Failed => PollStatus::Failed,
        }
    }
}

/// Identifiers a polling client may send. All optional and all untrusted; `status`
/// is accepted so it can be logged and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusQuery {
    #[serde(default, alias = "transaction_id", alias = "txn_id")]
    pub transaction_id: Option<String>,
    #[serde(default, alias = "payment_intent_id", alias = "intentId")]
    pub payment_intent_id: Option<String>,
    #[serde(default, alias = "invoice_id")]
    pub invoice_id: Option<String>,
    #[serde(default, alias = "subscription_id")]
    pub subscription_id: Option<String>,
    #[serde(default, alias = "order_number")]
    pub order_number: Option<String>,
    #[serde(default, alias = "transaction_no")]
    pub transaction_no: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub attempt: Option<u32>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl PaymentStatusQuery {
    pub fn transaction_id(&self) -> Option<&str> {
        non_blank(&self.transaction_id)
    }

    pub fn payment_intent_id(&self) -> Option<Uuid> {
        non_blank(&self.payment_intent_id).and_then(|v| Uuid::parse_str(v).ok())
    }

    pub fn invoice_id(&self) -> Option<&str> {
        non_blank(&self.invoice_id)
    }

    pub fn subscription_id(&self) -> Option<Uuid> {
        non_blank(&self.subscription_id).and_then(|v| Uuid::parse_str(v).ok())
    }

    pub fn order_number(&self) -> Option<&str> {
        non_blank(&self.order_number)
    }

    pub fn transaction_no(&self) -> Option<&str> {
        non_blank(&self.transaction_no)
    }

    /// True when the caller names a gateway-side identifier, which always warrants
    /// asking the gateway again.
    pub fn has_gateway_identifier(&self) -> bool {
        self.invoice_id().is_some() || self.transaction_no().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_id().is_none()
            && non_blank(&self.payment_intent_id).is_none()
            && self.invoice_id().is_none()
            && non_blank(&self.subscription_id).is_none()
            && self.order_number().is_none()
            && self.transaction_no().is_none()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: Uuid,
    pub status: TransactionStatus,
    pub amount: String,
    pub currency: String,
    pub payment_method: String,
    pub order_number: String,
    pub invoice_id: Option<String>,
    pub transaction_no: Option<String>,
    pub subscription_id: Option<Uuid>,
    pub payment_intent_id: Option<Uuid>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&PaymentTransactionEntity> for TransactionView {
    fn from(value: &PaymentTransactionEntity) -> Self {
        Self {
            id: value.id,
            status: TransactionStatus::from_str(&value.status),
            amount: Amount::from_minor(value.amount_minor).to_string(),
            currency: value.currency.clone(),
            payment_method: value.payment_method.clone(),
            order_number: value.order_number.clone(),
            invoice_id: value.paylink_invoice_id.clone(),
            transaction_no: value.transaction_no.clone(),
            subscription_id: value.subscription_id,
            payment_intent_id: value.payment_intent_id,
            paid_at: value.paid_at,
            created_at: value.created_at,
        }
    }
}

/// Status a subscription is presented with. A passed `expired_date` wins over
/// whatever is stored; nothing is written back.
pub fn effective_subscription_status(
    stored: SubscriptionStatus,
    expired_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> SubscriptionStatus {
    match expired_date {
        Some(expired_date) if expired_date < now => SubscriptionStatus::Expired,
        _ => stored,
    }
}

/// Whole days left, rounded up. Zero unless the subscription is effectively active
/// with a complete date range.
pub fn remaining_days(
    status: SubscriptionStatus,
    started_date: Option<DateTime<Utc>>,
    expired_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> i64 {
    match (status, started_date, expired_date) {
        (SubscriptionStatus::Active, Some(_), Some(expired_date)) if expired_date > now => {
            let seconds = (expired_date - now).num_seconds();
            (seconds + 86_399) / 86_400
        }
        _ => 0,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionView {
    pub id: Uuid,
    pub plan_id: Option<Uuid>,
    pub subscription_type: SubscriptionType,
    pub status: SubscriptionStatus,
    pub payment_confirmed: bool,
    pub started_date: Option<DateTime<Utc>>,
    pub expired_date: Option<DateTime<Utc>>,
    pub remaining_days: i64,
}

impl SubscriptionView {
    pub fn from_entity(entity: &SubscriptionEntity, now: DateTime<Utc>) -> Self {
        let status = effective_subscription_status(
            SubscriptionStatus::from_str(&entity.status),
            entity.expired_date,
            now,
        );

        Self {
            id: entity.id,
            plan_id: entity.plan_id,
            subscription_type: SubscriptionType::from_str(&entity.subscription_type)
                .unwrap_or_default(),
            status,
            payment_confirmed: entity.payment_confirmed,
            started_date: entity.started_date,
            expired_date: entity.expired_date,
            remaining_days: remaining_days(status, entity.started_date, entity.expired_date, now),
        }
    }
}

/// Body of every status polling response. Always served with HTTP 200.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusEnvelope {
    pub status: PollStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription: Option<SubscriptionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

impl PaymentStatusEnvelope {
    pub fn new(status: PollStatus) -> Self {
        let message = match status {
            PollStatus::Pending => "Payment is still being processed",
            PollStatus::Completed => "Payment completed successfully",
            PollStatus::Failed => "Payment failed",
            PollStatus::NotFound => "Payment not found",
            PollStatus::Error => "Unable to check payment status right now",
        };

        Self {
            status,
            message: message.to_string(),
            transaction: None,
            subscription: None,
            retry_after_ms: None,
        }
    }

    pub fn not_found() -> Self {
        Self::new(PollStatus::NotFound)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::new(PollStatus::Error)
        }
    }

    pub fn with_transaction(mut self, transaction: &PaymentTransactionEntity) -> Self {
        self.transaction = Some(TransactionView::from(transaction));
        self
    }

    pub fn with_subscription(mut self, subscription: Option<SubscriptionView>) -> Self {
        self.subscription = subscription;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn subscription(status: &str, expired_date: Option<DateTime<Utc>>) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            plan_id: None,
            subscription_type: "monthly".to_string(),
            status: status.to_string(),
            payment_confirmed: true,
            started_date: Some(now - Duration::days(40)),
            expired_date,
            transaction_id: None,
            payment_intent_id: None,
            transaction_reference: None,
            contact_name: None,
            contact_email: None,
            contact_phone: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn passed_expiry_overrides_stored_active_without_touching_it() {
        let now = Utc::now();
        let entity = subscription("active", Some(now - Duration::days(1)));

        let view = SubscriptionView::from_entity(&entity, now);

        assert_eq!(view.status, SubscriptionStatus::Expired);
        assert_eq!(view.remaining_days, 0);
        assert_eq!(entity.status, "active");
    }

    #[test]
    fn active_subscription_reports_remaining_days() {
        let now = Utc::now();
        let entity = subscription("active", Some(now + Duration::days(10) - Duration::hours(1)));

        let view = SubscriptionView::from_entity(&entity, now);

        assert_eq!(view.status, SubscriptionStatus::Active);
        assert_eq!(view.remaining_days, 10);
    }

    #[test]
    fn failed_subscription_has_no_remaining_time() {
        let now = Utc::now();
        let entity = subscription("payment_failed", Some(now + Duration::days(3)));

        let view = SubscriptionView::from_entity(&entity, now);

        assert_eq!(view.status, SubscriptionStatus::PaymentFailed);
        assert_eq!(view.remaining_days, 0);
    }

    #[test]
    fn envelope_serializes_snake_case_status() {
        let value = serde_json::to_value(PaymentStatusEnvelope::not_found()).unwrap();
        assert_eq!(value, json!({ "status": "not_found", "message": "Payment not found" }));
    }

    #[test]
    fn query_accepts_aliases_and_ignores_blank_values() {
        let query: PaymentStatusQuery = serde_json::from_value(json!({
            "txn_id": "SUB-1",
            "invoice_id": "  ",
            "subscriptionId": "not-a-uuid",
            "status": "success"
        }))
        .unwrap();

        assert_eq!(query.transaction_id(), Some("SUB-1"));
        assert_eq!(query.invoice_id(), None);
        assert_eq!(query.subscription_id(), None);
        assert!(!query.has_gateway_identifier());
        assert!(!query.is_empty());
    }
}
