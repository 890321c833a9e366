use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::payment_intents;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_intents)]
pub struct PaymentIntentEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub subscription_type: String,
    pub amount_minor: i64,
    pub discount_minor: i64,
    pub net_amount_minor: i64,
    pub currency: String,
    pub promo_code: Option<String>,
    pub payment_method: String,
    pub transaction_reference: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_intents)]
pub struct InsertPaymentIntentEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub subscription_type: String,
    pub amount_minor: i64,
    pub discount_minor: i64,
    pub net_amount_minor: i64,
    pub currency: String,
    pub promo_code: Option<String>,
    pub payment_method: String,
    pub transaction_reference: Option<String>,
    pub status: String,
    pub expires_at: DateTime<Utc>,
}
