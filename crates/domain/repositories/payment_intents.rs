use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payment_intents::{InsertPaymentIntentEntity, PaymentIntentEntity};

#[async_trait]
#[automock]
pub trait PaymentIntentRepository {
    async fn create(&self, insert_payment_intent_entity: InsertPaymentIntentEntity) -> Result<Uuid>;

    async fn find_by_id(&self, payment_intent_id: Uuid) -> Result<Option<PaymentIntentEntity>>;

    async fn set_transaction_reference(
        &self,
        payment_intent_id: Uuid,
        transaction_reference: &str,
    ) -> Result<()>;

    /// Moves a `pending` intent past its `expires_at` to `expired`. Returns whether a
    /// row changed.
    async fn mark_expired(&self, payment_intent_id: Uuid) -> Result<bool>;
}
