use std::sync::Arc;

use crates::domain::{
    entities::payment_transactions::PaymentTransactionEntity,
    repositories::{
        payment_settlement::PaymentSettlementRepository,
        payment_transactions::PaymentTransactionRepository,
    },
    value_objects::{
        callback_payload::{CallbackChannel, CallbackPayload, ThreeDsOutcome},
        enums::transaction_statuses::TransactionStatus,
        gateway::GatewayVerdict,
    },
};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::usecases::{
    payment_gateway::PaymentGateway,
    settlement::{GatewayHints, Resolution, SettlementUseCase},
};

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("callback could not be matched to a transaction")]
    Ambiguous,
    #[error("callback handling ran out of time")]
    TimedOut,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectStatus {
    Success,
    Failed,
    Pending,
    Error,
}

impl RedirectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectStatus::Success => "success",
            RedirectStatus::Failed => "failed",
            RedirectStatus::Pending => "pending",
            RedirectStatus::Error => "error",
        }
    }
}

/// Where the customer's browser goes after a callback. Every callback ends here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRedirect {
    pub status: RedirectStatus,
    pub transaction_id: Option<Uuid>,
    pub order_number: Option<String>,
    pub subscription_id: Option<Uuid>,
    pub code: Option<String>,
}

impl CallbackRedirect {
    pub fn new(status: RedirectStatus) -> Self {
        Self {
            status,
            transaction_id: None,
            order_number: None,
            subscription_id: None,
            code: None,
        }
    }

    fn for_transaction(status: RedirectStatus, transaction: &PaymentTransactionEntity) -> Self {
        Self {
            transaction_id: Some(transaction.id),
            order_number: Some(transaction.order_number.clone()),
            subscription_id: transaction.subscription_id,
            ..Self::new(status)
        }
    }

    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("status", self.status.as_str().to_string())];
        if let Some(transaction_id) = self.transaction_id {
            pairs.push(("txn_id", transaction_id.to_string()));
        }
        if let Some(order_number) = &self.order_number {
            pairs.push(("orderNumber", order_number.clone()));
        }
        if let Some(subscription_id) = self.subscription_id {
            pairs.push(("subscriptionId", subscription_id.to_string()));
        }
        if let Some(code) = &self.code {
            pairs.push(("code", code.clone()));
        }
        pairs
    }

    /// Status page URL carrying the outcome. A status page that is not an absolute URL
    /// gets the query appended as is.
    pub fn to_url(&self, status_page_url: &str) -> String {
        let pairs = self.query_pairs();
        match Url::parse(status_page_url) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .extend_pairs(pairs.iter().map(|(key, value)| (*key, value.as_str())));
                url.to_string()
            }
            Err(_) => {
                let query = serde_urlencoded::to_string(&pairs).unwrap_or_default();
                let separator = if status_page_url.contains('?') { '&' } else { '?' };
                format!("{status_page_url}{separator}{query}")
            }
        }
    }
}

pub struct ReconciliationUseCase<T, R, G>
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    transaction_repo: Arc<T>,
    settlement: Arc<SettlementUseCase<T, R, G>>,
    deadline: Option<std::time::Duration>,
}

impl<T, R, G> ReconciliationUseCase<T, R, G>
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(transaction_repo: Arc<T>, settlement: Arc<SettlementUseCase<T, R, G>>) -> Self {
        Self {
            transaction_repo,
            settlement,
            deadline: None,
        }
    }

    /// Caps one callback, gateway round trips included. Past it the customer is sent to
    /// the pending page and polling takes over.
    pub fn with_deadline(mut self, deadline: std::time::Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Entry point for every gateway callback. Never fails: unmatched payloads land on
    /// the pending page and internal errors on the error page.
    pub async fn handle_callback(
        &self,
        channel: CallbackChannel,
        payload: &CallbackPayload,
    ) -> CallbackRedirect {
        info!(
            channel = channel.as_str(),
            path = payload.path(),
            reported_status = ?payload.reported_status(),
            "reconciliation: callback received"
        );
        debug!(
            channel = channel.as_str(),
            payload = %payload.sanitized(),
            "reconciliation: callback payload"
        );

        let reconciled = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, self.reconcile(channel, payload))
                .await
                .unwrap_or_else(|_| Err(ReconciliationError::TimedOut)),
            None => self.reconcile(channel, payload).await,
        };

        match reconciled {
            Ok(redirect) => {
                info!(
                    channel = channel.as_str(),
                    status = redirect.status.as_str(),
                    transaction_id = ?redirect.transaction_id,
                    "reconciliation: callback handled"
                );
                redirect
            }
            Err(ReconciliationError::Ambiguous) => {
                warn!(
                    channel = channel.as_str(),
                    payload = %payload.sanitized(),
                    "reconciliation: callback matched no transaction, sending customer to pending page"
                );
                CallbackRedirect {
                    order_number: payload.primary_identifier().map(|identifier| identifier.value),
                    ..CallbackRedirect::new(RedirectStatus::Pending)
                }
            }
            Err(ReconciliationError::TimedOut) => {
                warn!(
                    channel = channel.as_str(),
                    deadline_ms = ?self.deadline.map(|deadline| deadline.as_millis()),
                    "reconciliation: callback ran past its deadline, sending customer to pending page"
                );
                CallbackRedirect {
                    order_number: payload.primary_identifier().map(|identifier| identifier.value),
                    ..CallbackRedirect::new(RedirectStatus::Pending)
                }
            }
            Err(ReconciliationError::Internal(err)) => {
                error!(
                    channel = channel.as_str(),
                    error = ?err,
                    "reconciliation: callback handling failed"
                );
                CallbackRedirect::new(RedirectStatus::Error)
            }
        }
    }

    async fn find_transaction(
        &self,
        payload: &CallbackPayload,
    ) -> Result<PaymentTransactionEntity, ReconciliationError> {
        for candidate in payload.identifier_candidates() {
            if let Some(transaction) = self.transaction_repo.find_by_reference(&candidate.value).await? {
                debug!(
                    transaction_id = %transaction.id,
                    identifier = %candidate.value,
                    source = ?candidate.source,
                    "reconciliation: transaction matched"
                );
                return Ok(transaction);
            }
        }

        Err(ReconciliationError::Ambiguous)
    }

    async fn reconcile(
        &self,
        channel: CallbackChannel,
        payload: &CallbackPayload,
    ) -> Result<CallbackRedirect, ReconciliationError> {
        let transaction = self.find_transaction(payload).await?;

        match TransactionStatus::from_str(&transaction.status) {
            TransactionStatus::Completed => {
                debug!(transaction_id = %transaction.id, "reconciliation: already completed");
                return Ok(CallbackRedirect::for_transaction(RedirectStatus::Success, &transaction));
            }
            TransactionStatus::Failed => {
                debug!(transaction_id = %transaction.id, "reconciliation: already failed");
                return Ok(CallbackRedirect::for_transaction(RedirectStatus::Failed, &transaction));
            }
            TransactionStatus::Pending => {}
        }

        let hints = GatewayHints {
            transaction_no: ["transactionNo", "transaction_no"]
                .iter()
                .find_map(|key| payload.any(key)),
            invoice_id: ["invoiceId", "invoice_id"].iter().find_map(|key| payload.any(key)),
        };

        let mut resolution = self.settlement.resolve(&transaction, &hints).await?;

        let three_ds_failed = channel == CallbackChannel::ThreeDSecure
            && payload.three_ds_outcome() == ThreeDsOutcome::Failed;

        if three_ds_failed && resolution.status == TransactionStatus::Pending {
            info!(
                transaction_id = %transaction.id,
                "reconciliation: 3-D Secure failed, checking the gateway once more"
            );
            let current = self
                .transaction_repo
                .find_by_id(transaction.id)
                .await?
                .unwrap_or(transaction.clone());
            resolution = self.settlement.resolve(&current, &hints).await?;
        }

        Ok(self.redirect_for(&transaction, &resolution, three_ds_failed, payload))
    }

    fn redirect_for(
        &self,
        transaction: &PaymentTransactionEntity,
        resolution: &Resolution,
        three_ds_failed: bool,
        payload: &CallbackPayload,
    ) -> CallbackRedirect {
        let mut redirect = CallbackRedirect::for_transaction(RedirectStatus::Pending, transaction);
        redirect.subscription_id = resolution.subscription_id;

        match resolution.status {
            TransactionStatus::Completed => redirect.status = RedirectStatus::Success,
            TransactionStatus::Failed => {
                redirect.status = RedirectStatus::Failed;
                redirect.code = resolution
                    .failure_code
                    .clone()
                    .or_else(|| gateway_failure_code(resolution))
                    .or_else(|| payload.error_code());
            }
            // The gateway has not confirmed the failure, so the row stays pending for a
            // later callback or poll. The customer still learns authentication failed.
            TransactionStatus::Pending if three_ds_failed => {
                redirect.status = RedirectStatus::Failed;
                redirect.code = payload
                    .error_code()
                    .or_else(|| Some("3DS_FAILED".to_string()));
            }
            TransactionStatus::Pending => {}
        }

        redirect
    }
}

fn gateway_failure_code(resolution: &Resolution) -> Option<String> {
    match resolution.lookup.as_ref()?.verdict() {
        GatewayVerdict::Failed { code } => code,
        _ => None,
    }
}
