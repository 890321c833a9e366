use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::payment_intents::{InsertPaymentIntentEntity, PaymentIntentEntity},
        repositories::payment_intents::PaymentIntentRepository,
        value_objects::enums::payment_intent_statuses::PaymentIntentStatus,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_intents},
};

pub struct PaymentIntentPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentIntentPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentIntentRepository for PaymentIntentPostgres {
    async fn create(&self, insert_payment_intent_entity: InsertPaymentIntentEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(payment_intents::table)
            .values(&insert_payment_intent_entity)
            .returning(payment_intents::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id(&self, payment_intent_id: Uuid) -> Result<Option<PaymentIntentEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let intent = payment_intents::table
            .find(payment_intent_id)
            .select(PaymentIntentEntity::as_select())
            .first::<PaymentIntentEntity>(&mut conn)
            .optional()?;

        Ok(intent)
    }

    async fn set_transaction_reference(
        &self,
        payment_intent_id: Uuid,
        transaction_reference: &str,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(payment_intents::table.find(payment_intent_id))
            .set((
                payment_intents::transaction_reference.eq(Some(transaction_reference.to_string())),
                payment_intents::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_expired(&self, payment_intent_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let updated = update(payment_intents::table.find(payment_intent_id))
            .filter(payment_intents::status.eq(PaymentIntentStatus::Pending.as_str()))
            .filter(payment_intents::expires_at.lt(now))
            .set((
                payment_intents::status.eq(PaymentIntentStatus::Expired.as_str()),
                payment_intents::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

        Ok(updated > 0)
    }
}
