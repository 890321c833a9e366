use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;

use crate::{
    domain::{
        entities::promo_codes::PromoCodeEntity, repositories::promo_codes::PromoCodeRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::promo_codes},
};

pub struct PromoCodePostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PromoCodePostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PromoCodeRepository for PromoCodePostgres {
    async fn find_by_code(&self, code: &str) -> Result<Option<PromoCodeEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let pattern = code
            .trim()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");

        let promo = promo_codes::table
            .filter(promo_codes::code.ilike(pattern))
            .select(PromoCodeEntity::as_select())
            .first::<PromoCodeEntity>(&mut conn)
            .optional()?;

        Ok(promo)
    }
}
