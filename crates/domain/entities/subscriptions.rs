use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::subscriptions;

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscriptions)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub subscription_type: String,
    pub status: String,
    pub payment_confirmed: bool,
    pub started_date: Option<DateTime<Utc>>,
    pub expired_date: Option<DateTime<Utc>>,
    pub transaction_id: Option<Uuid>,
    pub payment_intent_id: Option<Uuid>,
    pub transaction_reference: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscriptions)]
pub struct InsertSubscriptionEntity {
    pub user_id: Uuid,
    pub plan_id: Option<Uuid>,
    pub subscription_type: String,
    pub status: String,
    pub payment_confirmed: bool,
    pub started_date: Option<DateTime<Utc>>,
    pub expired_date: Option<DateTime<Utc>>,
    pub transaction_id: Option<Uuid>,
    pub payment_intent_id: Option<Uuid>,
    pub transaction_reference: Option<String>,
}
