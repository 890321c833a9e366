use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::discount_types::DiscountType,
    infra::db::postgres::schema::promo_codes,
};

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = promo_codes)]
pub struct PromoCodeEntity {
    pub id: Uuid,
    pub code: String,
    pub discount_type: String,
    /// Percent for `percentage` codes, minor units for `fixed` codes.
    pub discount_value: i64,
    pub max_uses: Option<i32>,
    pub used_count: i32,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl PromoCodeEntity {
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        if !self.is_active {
            return false;
        }
        if self.expires_at.is_some_and(|expires_at| expires_at <= now) {
            return false;
        }
        match self.max_uses {
            Some(max_uses) => self.used_count < max_uses,
            None => true,
        }
    }

    /// Discount in minor units for `amount_minor`, never more than the amount itself.
    pub fn discount_for(&self, amount_minor: i64, now: DateTime<Utc>) -> i64 {
        if !self.is_redeemable(now) || amount_minor <= 0 {
            return 0;
        }

        let discount = match DiscountType::from_str(&self.discount_type) {
            Some(DiscountType::Percentage) => {
                let percent = self.discount_value.clamp(0, 100);
                amount_minor * percent / 100
            }
            Some(DiscountType::Fixed) => self.discount_value.max(0),
            None => 0,
        };

        discount.min(amount_minor)
    }
}
