use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::payment_transactions;

/// One attempt to pay. Every identifier the gateway may echo back is stored so a
/// callback can be matched whichever one it carries.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_transactions)]
pub struct PaymentTransactionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_intent_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: String,
    pub status: String,
    pub order_number: String,
    pub paylink_invoice_id: Option<String>,
    pub transaction_no: Option<String>,
    pub paylink_reference: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_transactions)]
pub struct InsertPaymentTransactionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub payment_intent_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    pub amount_minor: i64,
    pub currency: String,
    pub payment_method: String,
    pub status: String,
    pub order_number: String,
    pub paylink_invoice_id: Option<String>,
    pub transaction_no: Option<String>,
    pub paylink_reference: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
}
