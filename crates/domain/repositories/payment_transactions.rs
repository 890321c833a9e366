use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use serde_json::Value;
use uuid::Uuid;

use crate::domain::entities::payment_transactions::{
    InsertPaymentTransactionEntity, PaymentTransactionEntity,
};

#[async_trait]
#[automock]
pub trait PaymentTransactionRepository {
    async fn create(
        &self,
        insert_payment_transaction_entity: InsertPaymentTransactionEntity,
    ) -> Result<Uuid>;

    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<PaymentTransactionEntity>>;

    /// Resolves any identifier we or the gateway may hold for a transaction. Columns are
    /// tried in order: id, paylink_invoice_id, paylink_reference / transaction_no,
    /// order_number. First match wins.
    async fn find_by_reference(&self, reference: &str)
    -> Result<Option<PaymentTransactionEntity>>;

    async fn find_latest_by_payment_intent_id(
        &self,
        payment_intent_id: Uuid,
    ) -> Result<Option<PaymentTransactionEntity>>;

    async fn find_latest_by_subscription_id(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<PaymentTransactionEntity>>;

    /// Stores a gateway snapshot for audit and fills in a transaction number learned
    /// later. Never touches the status.
    async fn record_gateway_snapshot(
        &self,
        transaction_id: Uuid,
        transaction_no: Option<String>,
        gateway_response: Value,
    ) -> Result<()>;
}
