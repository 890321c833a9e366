use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::subscription_types::SubscriptionType,
    infra::db::postgres::schema::subscription_plans,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscription_plans)]
pub struct PlanEntity {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub weekly_price_minor: Option<i64>,
    pub monthly_price_minor: Option<i64>,
    pub yearly_price_minor: Option<i64>,
    pub currency: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl PlanEntity {
    /// Catalog price for one interval, in minor units. Non-positive prices count as missing.
    pub fn price_for(&self, subscription_type: SubscriptionType) -> Option<i64> {
        let price = match subscription_type {
            SubscriptionType::Weekly => self.weekly_price_minor,
            SubscriptionType::Monthly => self.monthly_price_minor,
            SubscriptionType::Yearly => self.yearly_price_minor,
        };
        price.filter(|value| *value > 0)
    }
}
