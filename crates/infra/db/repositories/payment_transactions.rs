use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::payment_transactions::{
            InsertPaymentTransactionEntity, PaymentTransactionEntity,
        },
        repositories::payment_transactions::PaymentTransactionRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::payment_transactions},
};

pub struct PaymentTransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentTransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentTransactionRepository for PaymentTransactionPostgres {
    async fn create(
        &self,
        insert_payment_transaction_entity: InsertPaymentTransactionEntity,
    ) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = insert_into(payment_transactions::table)
            .values(&insert_payment_transaction_entity)
            .returning(payment_transactions::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(result)
    }

    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<PaymentTransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let transaction = payment_transactions::table
            .find(transaction_id)
            .select(PaymentTransactionEntity::as_select())
            .first::<PaymentTransactionEntity>(&mut conn)
            .optional()?;

        Ok(transaction)
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<PaymentTransactionEntity>> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Ok(None);
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;

        if let Ok(transaction_id) = Uuid::parse_str(reference) {
            let by_id = payment_transactions::table
                .find(transaction_id)
                .select(PaymentTransactionEntity::as_select())
                .first::<PaymentTransactionEntity>(&mut conn)
                .optional()?;
            if by_id.is_some() {
                return Ok(by_id);
            }
        }

        let by_invoice = payment_transactions::table
            .filter(payment_transactions::paylink_invoice_id.eq(reference))
            .order(payment_transactions::created_at.desc())
            .select(PaymentTransactionEntity::as_select())
            .first::<PaymentTransactionEntity>(&mut conn)
            .optional()?;
        if by_invoice.is_some() {
            return Ok(by_invoice);
        }

        let by_gateway_reference = payment_transactions::table
            .filter(
                payment_transactions::paylink_reference
                    .eq(reference)
                    .or(payment_transactions::transaction_no.eq(reference)),
            )
            .order(payment_transactions::created_at.desc())
            .select(PaymentTransactionEntity::as_select())
            .first::<PaymentTransactionEntity>(&mut conn)
            .optional()?;
        if by_gateway_reference.is_some() {
            return Ok(by_gateway_reference);
        }

        let by_order_number = payment_transactions::table
            .filter(payment_transactions::order_number.eq(reference))
            .order(payment_transactions::created_at.desc())
            .select(PaymentTransactionEntity::as_select())
            .first::<PaymentTransactionEntity>(&mut conn)
            .optional()?;

        Ok(by_order_number)
    }

    async fn find_latest_by_payment_intent_id(
        &self,
        payment_intent_id: Uuid,
    ) -> Result<Option<PaymentTransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let transaction = payment_transactions::table
            .filter(payment_transactions::payment_intent_id.eq(payment_intent_id))
            .order(payment_transactions::created_at.desc())
            .select(PaymentTransactionEntity::as_select())
            .first::<PaymentTransactionEntity>(&mut conn)
            .optional()?;

        Ok(transaction)
    }

    async fn find_latest_by_subscription_id(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<PaymentTransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let transaction = payment_transactions::table
            .filter(payment_transactions::subscription_id.eq(subscription_id))
            .order(payment_transactions::created_at.desc())
            .select(PaymentTransactionEntity::as_select())
            .first::<PaymentTransactionEntity>(&mut conn)
            .optional()?;

        Ok(transaction)
    }

    async fn record_gateway_snapshot(
        &self,
        transaction_id: Uuid,
        transaction_no: Option<String>,
        gateway_response: Value,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        update(payment_transactions::table.find(transaction_id))
            .set((
                payment_transactions::gateway_response.eq(Some(gateway_response)),
                payment_transactions::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

        if let Some(transaction_no) = transaction_no {
            update(payment_transactions::table.find(transaction_id))
                .filter(payment_transactions::transaction_no.is_null())
                .set(payment_transactions::transaction_no.eq(Some(transaction_no)))
                .execute(&mut conn)?;
        }

        Ok(())
    }
}
