use std::sync::Arc;

use chrono::{DateTime, Utc};
use crates::domain::{
    entities::{payment_transactions::PaymentTransactionEntity, subscriptions::SubscriptionEntity},
    repositories::{
        payment_intents::PaymentIntentRepository, payment_settlement::PaymentSettlementRepository,
        payment_transactions::PaymentTransactionRepository, subscriptions::SubscriptionRepository,
    },
    value_objects::{
        enums::{
            payment_intent_statuses::PaymentIntentStatus,
            subscription_statuses::SubscriptionStatus, transaction_statuses::TransactionStatus,
        },
        payment_status::{PaymentStatusEnvelope, PaymentStatusQuery, PollStatus, SubscriptionView},
        polling_policy::PollingPolicy,
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    payment_gateway::PaymentGateway,
    settlement::{GatewayHints, SettlementUseCase},
};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("a payment identifier is required")]
    MissingIdentifier,
    #[error("payment status check ran out of time")]
    TimedOut,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

const POLLING_EXHAUSTED_MESSAGE: &str =
    "Your payment is still being confirmed. We will email you as soon as it completes.";

pub struct PaymentStatusUseCase<T, I, S, R, G>
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    I: PaymentIntentRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    transaction_repo: Arc<T>,
    intent_repo: Arc<I>,
    subscription_repo: Arc<S>,
    settlement: Arc<SettlementUseCase<T, R, G>>,
    policy: PollingPolicy,
    deadline: Option<std::time::Duration>,
}

impl<T, I, S, R, G> PaymentStatusUseCase<T, I, S, R, G>
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    I: PaymentIntentRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(
        transaction_repo: Arc<T>,
        intent_repo: Arc<I>,
        subscription_repo: Arc<S>,
        settlement: Arc<SettlementUseCase<T, R, G>>,
        policy: PollingPolicy,
    ) -> Self {
        Self {
            transaction_repo,
            intent_repo,
            subscription_repo,
            settlement,
            policy,
            deadline: None,
        }
    }

    /// Caps one status check, gateway round trips included. Past it the client gets an
    /// `error` envelope with a retry hint; the payment itself is left untouched.
    pub fn with_deadline(mut self, deadline: std::time::Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Authoritative status for a polling client. Never fails; internal errors come
    /// back as an `error` envelope so the client keeps polling.
    pub async fn check(&self, query: PaymentStatusQuery) -> PaymentStatusEnvelope {
        let attempt = query.attempt.unwrap_or(0);
        if let Some(claimed_status) = query.status.as_deref() {
            debug!(%claimed_status, "payment_status: client-reported status ignored");
        }

        let resolved = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.resolve(&query, Utc::now()))
                .await
                .unwrap_or_else(|_| Err(StatusError::TimedOut)),
            None => self.resolve(&query, Utc::now()).await,
        };

        let envelope = match resolved {
            Ok(envelope) => envelope,
            Err(StatusError::MissingIdentifier) => {
                return PaymentStatusEnvelope::error(StatusError::MissingIdentifier.to_string());
            }
            Err(StatusError::TimedOut) => {
                warn!(
                    transaction_id = ?query.transaction_id(),
                    order_number = ?query.order_number(),
                    deadline_ms = ?self.deadline.map(|deadline| deadline.as_millis()),
                    "payment_status: status check ran past its deadline"
                );
                PaymentStatusEnvelope::error("Payment confirmation is taking longer than usual")
            }
            Err(StatusError::Internal(err)) => {
                error!(
                    transaction_id = ?query.transaction_id(),
                    order_number = ?query.order_number(),
                    error = ?err,
                    "payment_status: status check failed"
                );
                PaymentStatusEnvelope::error("Unable to check payment status right now")
            }
        };

        self.with_retry_hint(envelope, attempt)
    }

    fn with_retry_hint(&self, mut envelope: PaymentStatusEnvelope, attempt: u32) -> PaymentStatusEnvelope {
        if !matches!(envelope.status, PollStatus::Pending | PollStatus::Error) {
            return envelope;
        }

        match self.policy.next_delay(attempt) {
            Some(delay) => envelope.retry_after_ms = Some(delay.as_millis() as u64),
            None if envelope.status == PollStatus::Pending => {
                envelope.message = POLLING_EXHAUSTED_MESSAGE.to_string();
            }
            None => {}
        }
        envelope
    }

    async fn resolve(
        &self,
        query: &PaymentStatusQuery,
        now: DateTime<Utc>,
    ) -> Result<PaymentStatusEnvelope, StatusError> {
        if query.is_empty() {
            return Err(StatusError::MissingIdentifier);
        }

        if let Some(transaction) = self.find_transaction(query).await? {
            return self.transaction_status(transaction, query, now).await;
        }

        if let Some(subscription_id) = query.subscription_id() {
            if let Some(subscription) = self.subscription_repo.find_by_id(subscription_id).await? {
                return self.subscription_status(subscription, now).await;
            }
        }

        info!(
            transaction_id = ?query.transaction_id(),
            invoice_id = ?query.invoice_id(),
            order_number = ?query.order_number(),
            "payment_status: nothing matched"
        );
        Ok(PaymentStatusEnvelope::not_found())
    }

    async fn find_transaction(
        &self,
        query: &PaymentStatusQuery,
    ) -> anyhow::Result<Option<PaymentTransactionEntity>> {
        if let Some(transaction_id) = query.transaction_id() {
            if let Some(found) = self.transaction_repo.find_by_reference(transaction_id).await? {
                return Ok(Some(found));
            }
        }

        if let Some(payment_intent_id) = query.payment_intent_id() {
            if let Some(found) = self
                .transaction_repo
                .find_latest_by_payment_intent_id(payment_intent_id)
                .await?
            {
                return Ok(Some(found));
            }
        }

        let references = [query.invoice_id(), query.transaction_no(), query.order_number()];
        for reference in references.into_iter().flatten() {
            if let Some(found) = self.transaction_repo.find_by_reference(reference).await? {
                return Ok(Some(found));
            }
        }

        if let Some(subscription_id) = query.subscription_id() {
            return self
                .transaction_repo
                .find_latest_by_subscription_id(subscription_id)
                .await;
        }

        Ok(None)
    }

    async fn transaction_status(
        &self,
        mut transaction: PaymentTransactionEntity,
        query: &PaymentStatusQuery,
        now: DateTime<Utc>,
    ) -> Result<PaymentStatusEnvelope, StatusError> {
        let stored = TransactionStatus::from_str(&transaction.status);
        let mut status = stored;
        let mut subscription_id = transaction.subscription_id;

        let verify = stored == TransactionStatus::Pending
            || (query.has_gateway_identifier() && stored != TransactionStatus::Completed);

        if verify {
            let hints = GatewayHints {
                transaction_no: query.transaction_no().map(str::to_string),
                invoice_id: query.invoice_id().map(str::to_string),
            };
            let resolution = self.settlement.resolve(&transaction, &hints).await?;

            if resolution.status == TransactionStatus::Pending {
                if let Some(payment_intent_id) = transaction.payment_intent_id {
                    self.expire_intent_if_due(payment_intent_id, now).await;
                }
            }

            if resolution.status != stored {
                if let Some(updated) = self.transaction_repo.find_by_id(transaction.id).await? {
                    transaction = updated;
                }
            }

            status = resolution.status;
            subscription_id = resolution.subscription_id.or(subscription_id);
        }

        let subscription = match subscription_id {
            Some(subscription_id) => self.subscription_view(subscription_id, now).await,
            None => None,
        };

        Ok(PaymentStatusEnvelope::new(PollStatus::from_transaction(status))
            .with_transaction(&transaction)
            .with_subscription(subscription))
    }

    async fn subscription_status(
        &self,
        subscription: SubscriptionEntity,
        now: DateTime<Utc>,
    ) -> Result<PaymentStatusEnvelope, StatusError> {
        let resolution = self.settlement.resolve_subscription(&subscription).await?;

        let subscription = match &resolution.outcome {
            Some(_) => self
                .subscription_repo
                .find_by_id(subscription.id)
                .await?
                .unwrap_or(subscription),
            None => subscription,
        };

        let status = match &resolution.outcome {
            Some(outcome) if outcome.is_completed() => PollStatus::Completed,
            Some(outcome) if outcome.is_failed() => PollStatus::Failed,
            _ => match SubscriptionStatus::from_str(&subscription.status) {
                SubscriptionStatus::PaymentFailed | SubscriptionStatus::Cancelled => PollStatus::Failed,
                _ => PollStatus::Pending,
            },
        };

        Ok(PaymentStatusEnvelope::new(status)
            .with_subscription(Some(SubscriptionView::from_entity(&subscription, now))))
    }

    async fn subscription_view(&self, subscription_id: Uuid, now: DateTime<Utc>) -> Option<SubscriptionView> {
        match self.subscription_repo.find_by_id(subscription_id).await {
            Ok(subscription) => subscription.map(|entity| SubscriptionView::from_entity(&entity, now)),
            Err(err) => {
                warn!(%subscription_id, db_error = ?err, "payment_status: failed to load subscription");
                None
            }
        }
    }

    /// A pending intent past its TTL becomes `expired`. The transaction stays pending
    /// so a late confirmation can still complete it.
    async fn expire_intent_if_due(&self, payment_intent_id: Uuid, now: DateTime<Utc>) {
        let intent = match self.intent_repo.find_by_id(payment_intent_id).await {
            Ok(Some(intent)) => intent,
            Ok(None) => return,
            Err(err) => {
                warn!(%payment_intent_id, db_error = ?err, "payment_status: failed to load payment intent");
                return;
            }
        };

        if PaymentIntentStatus::from_str(&intent.status) != Some(PaymentIntentStatus::Pending)
            || intent.expires_at > now
        {
            return;
        }

        match self.intent_repo.mark_expired(payment_intent_id).await {
            Ok(true) => info!(%payment_intent_id, "payment_status: payment intent expired"),
            Ok(false) => {}
            Err(err) => {
                warn!(%payment_intent_id, db_error = ?err, "payment_status: failed to expire payment intent")
            }
        }
    }
}
