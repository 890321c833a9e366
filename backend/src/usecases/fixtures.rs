use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::{
        payment_intents::PaymentIntentEntity, payment_transactions::PaymentTransactionEntity,
        plans::PlanEntity, promo_codes::PromoCodeEntity, subscriptions::SubscriptionEntity,
        users::UserProfileEntity,
    },
    value_objects::{
        enums::{
            payment_intent_statuses::PaymentIntentStatus,
            subscription_statuses::SubscriptionStatus, transaction_statuses::TransactionStatus,
        },
        gateway::{CreatedInvoice, GatewayInvoice, GatewayLookup, GatewayStatus, NewInvoice},
    },
};
use crates::payments::paylink_client::PaylinkError;
use serde_json::json;
use uuid::Uuid;

use crate::usecases::payment_gateway::PaymentGateway;

pub const ORDER_NUMBER: &str = "SUB-123";
pub const INVOICE_ID: &str = "INV-1";
pub const TRANSACTION_NO: &str = "TXN-1";

pub fn transaction(status: TransactionStatus) -> PaymentTransactionEntity {
    let now = Utc::now();
    PaymentTransactionEntity {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        payment_intent_id: Some(Uuid::new_v4()),
        subscription_id: None,
        amount_minor: 9_000,
        currency: "SAR".to_string(),
        payment_method: "card".to_string(),
        status: status.as_str().to_string(),
        order_number: ORDER_NUMBER.to_string(),
        paylink_invoice_id: Some(INVOICE_ID.to_string()),
        transaction_no: Some(TRANSACTION_NO.to_string()),
        paylink_reference: None,
        gateway_response: None,
        paid_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn subscription(status: SubscriptionStatus, confirmed: bool) -> SubscriptionEntity {
    let now = Utc::now();
    let (started_date, expired_date) = if confirmed {
        (Some(now), Some(now + Duration::days(30)))
    } else {
        (None, None)
    };

    SubscriptionEntity {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        plan_id: Some(Uuid::new_v4()),
        subscription_type: "monthly".to_string(),
        status: status.to_string(),
        payment_confirmed: confirmed,
        started_date,
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

pub fn intent(status: PaymentIntentStatus, expires_at: DateTime<Utc>) -> PaymentIntentEntity {
    let now = Utc::now();
    PaymentIntentEntity {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        plan_id: Some(Uuid::new_v4()),
        subscription_type: "monthly".to_string(),
        amount_minor: 10_000,
        discount_minor: 1_000,
        net_amount_minor: 9_000,
        currency: "SAR".to_string(),
        promo_code: Some("SAVE10".to_string()),
        payment_method: "card".to_string(),
        transaction_reference: Some(ORDER_NUMBER.to_string()),
        status: status.as_str().to_string(),
        created_at: now,
        expires_at,
        updated_at: now,
    }
}

pub fn plan(monthly_price_minor: i64) -> PlanEntity {
    PlanEntity {
        id: Uuid::new_v4(),
        name: "Pro".to_string(),
        description: Some("Pro plan".to_string()),
        weekly_price_minor: None,
        monthly_price_minor: Some(monthly_price_minor),
        yearly_price_minor: None,
        currency: "SAR".to_string(),
        is_active: true,
        created_at: Utc::now(),
    }
}

pub fn promo_code(code: &str, percent: i64) -> PromoCodeEntity {
    PromoCodeEntity {
        id: Uuid::new_v4(),
        code: code.to_string(),
        discount_type: "percentage".to_string(),
        discount_value: percent,
        max_uses: Some(100),
        used_count: 3,
        is_active: true,
        expires_at: None,
        created_at: Utc::now(),
    }
}

pub fn profile(user_id: Uuid) -> UserProfileEntity {
    UserProfileEntity {
        id: user_id,
        full_name: Some("Sara Customer".to_string()),
        email: Some("sara@example.com".to_string()),
        phone: Some("0500000000".to_string()),
        created_at: Utc::now(),
    }
}

fn lookup(status: GatewayStatus, paid_date: Option<DateTime<Utc>>, order_number: &str) -> GatewayLookup {
    let mut data = GatewayInvoice::with_status(status);
    data.raw_status = Some(format!("{status:?}"));
    data.paid_date = paid_date;
    data.order_number = Some(order_number.to_string());
    data.transaction_no = Some(TRANSACTION_NO.to_string());
    data.raw = json!({
        "orderStatus": format!("{status:?}"),
        "orderNumber": order_number,
        "transactionNo": TRANSACTION_NO,
    });
    GatewayLookup::found(data)
}

pub fn paid_lookup(paid_at: DateTime<Utc>) -> GatewayLookup {
    lookup(GatewayStatus::Paid, Some(paid_at), ORDER_NUMBER)
}

pub fn paid_without_date_lookup() -> GatewayLookup {
    lookup(GatewayStatus::Paid, None, ORDER_NUMBER)
}

pub fn pending_lookup() -> GatewayLookup {
    lookup(GatewayStatus::Pending, None, ORDER_NUMBER)
}

pub fn failed_lookup(code: &str) -> GatewayLookup {
    let mut failed = lookup(GatewayStatus::Failed, None, ORDER_NUMBER);
    failed.data.error_code = Some(code.to_string());
    failed
}

pub fn lookup_for_other_order(paid_at: DateTime<Utc>) -> GatewayLookup {
    lookup(GatewayStatus::Paid, Some(paid_at), "SUB-999")
}

/// Gateway that takes `delay` to answer anything, and then only says "pending".
pub struct SlowGateway {
    pub delay: std::time::Duration,
}

#[async_trait]
impl PaymentGateway for SlowGateway {
    fn currency(&self) -> String {
        "SAR".to_string()
    }

    async fn create_invoice(&self, _invoice: NewInvoice) -> Result<CreatedInvoice, PaylinkError> {
        tokio::time::sleep(self.delay).await;
        Err(PaylinkError::Unavailable("slow gateway".to_string()))
    }

    async fn get_invoice(&self, _invoice_id: &str) -> GatewayLookup {
        tokio::time::sleep(self.delay).await;
        pending_lookup()
    }

    async fn get_transaction_by_number(&self, _transaction_no: &str) -> GatewayLookup {
        tokio::time::sleep(self.delay).await;
        pending_lookup()
    }
}
