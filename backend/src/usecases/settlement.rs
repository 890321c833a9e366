use std::sync::Arc;

use anyhow::Result;
use crates::domain::{
    entities::{payment_transactions::PaymentTransactionEntity, subscriptions::SubscriptionEntity},
    repositories::{
        payment_settlement::PaymentSettlementRepository,
        payment_transactions::PaymentTransactionRepository,
    },
    value_objects::{
        enums::transaction_statuses::TransactionStatus,
        gateway::{GatewayLookup, GatewayVerdict},
        settlement::{PaymentConfirmation, PaymentFailure, SettlementOutcome, SubscriptionState},
    },
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::usecases::payment_gateway::PaymentGateway;

/// Gateway identifiers supplied by the caller in addition to the ones stored on the
/// transaction.
#[derive(Debug, Clone, Default)]
pub struct GatewayHints {
    pub transaction_no: Option<String>,
    pub invoice_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GatewayQuery {
    TransactionNo(String),
    Invoice(String),
}

/// Transaction-number lookups come first; invoice lookups are the fallback.
fn gateway_queries(transaction: &PaymentTransactionEntity, hints: &GatewayHints) -> Vec<GatewayQuery> {
    let transaction_numbers = [
        hints.transaction_no.as_ref(),
        transaction.transaction_no.as_ref(),
        transaction.paylink_reference.as_ref(),
    ];
    let invoices = [hints.invoice_id.as_ref(), transaction.paylink_invoice_id.as_ref()];

    let mut queries: Vec<GatewayQuery> = Vec::new();
    let candidates = transaction_numbers
        .into_iter()
        .flatten()
        .map(|value| GatewayQuery::TransactionNo(value.trim().to_string()))
        .chain(
            invoices
                .into_iter()
                .flatten()
                .map(|value| GatewayQuery::Invoice(value.trim().to_string())),
        );

    for query in candidates {
        let blank = match &query {
            GatewayQuery::TransactionNo(value) | GatewayQuery::Invoice(value) => value.is_empty(),
        };
        if !blank && !queries.contains(&query) {
            queries.push(query);
        }
    }
    queries
}

/// A lookup that names a different order is about some other payment.
fn belongs_to(lookup: &GatewayLookup, transaction: &PaymentTransactionEntity) -> bool {
    match lookup.data.order_number.as_deref() {
        Some(order_number) => order_number.trim() == transaction.order_number,
        None => true,
    }
}

/// Where a transaction stands after asking the gateway and applying its verdict.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub subscription_id: Option<Uuid>,
    pub failure_code: Option<String>,
    pub lookup: Option<GatewayLookup>,
}

impl Resolution {
    fn status_after(outcome: &SettlementOutcome, stored: TransactionStatus) -> TransactionStatus {
        match outcome {
            SettlementOutcome::Conflict { current } => *current,
            SettlementOutcome::NotFound => stored,
            outcome if outcome.is_completed() => TransactionStatus::Completed,
            outcome if outcome.is_failed() => TransactionStatus::Failed,
            _ => stored,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionResolution {
    pub outcome: Option<SettlementOutcome>,
    pub lookup: Option<GatewayLookup>,
}

/// The one routine every entry point converges on: ask the gateway, then apply a
/// paid or failed verdict through the atomic settlement units.
pub struct SettlementUseCase<T, R, G>
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    transaction_repo: Arc<T>,
    settlement_repo: Arc<R>,
    gateway: Arc<G>,
}

impl<T, R, G> SettlementUseCase<T, R, G>
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    pub fn new(transaction_repo: Arc<T>, settlement_repo: Arc<R>, gateway: Arc<G>) -> Self {
        Self {
            transaction_repo,
            settlement_repo,
            gateway,
        }
    }

    /// Stops at the first lookup that settles the question. Otherwise returns the most
    /// informative lookup seen, or `None` when there was nothing to ask about.
    pub async fn verify(
        &self,
        transaction: &PaymentTransactionEntity,
        hints: &GatewayHints,
    ) -> Option<GatewayLookup> {
        let mut best: Option<GatewayLookup> = None;

        for query in gateway_queries(transaction, hints) {
            let lookup = match &query {
                GatewayQuery::TransactionNo(transaction_no) => {
                    self.gateway.get_transaction_by_number(transaction_no).await
                }
                GatewayQuery::Invoice(invoice_id) => self.gateway.get_invoice(invoice_id).await,
            };

            if !belongs_to(&lookup, transaction) {
                warn!(
                    transaction_id = %transaction.id,
                    order_number = %transaction.order_number,
                    gateway_order_number = ?lookup.data.order_number,
                    ?query,
                    "settlement: gateway lookup names another order, ignoring it"
                );
                continue;
            }

            debug!(
                transaction_id = %transaction.id,
                ?query,
                success = lookup.success,
                gateway_status = ?lookup.data.status,
                "settlement: gateway lookup"
            );

            if lookup.verdict() != GatewayVerdict::Undetermined {
                return Some(lookup);
            }

            let replace = match &best {
                None => true,
                Some(current) => !current.success && lookup.success,
            };
            if replace {
                best = Some(lookup);
            }
        }

        best
    }

    /// Applies a lookup's verdict. Undetermined verdicts only leave an audit snapshot
    /// behind; the transaction stays where it was.
    pub async fn apply(
        &self,
        transaction: &PaymentTransactionEntity,
        lookup: Option<GatewayLookup>,
    ) -> Result<Resolution> {
        let stored = TransactionStatus::from_str(&transaction.status);
        let mut resolution = Resolution {
            transaction_id: transaction.id,
            status: stored,
            subscription_id: transaction.subscription_id,
            failure_code: None,
            lookup: None,
        };

        let Some(lookup) = lookup else {
            return Ok(resolution);
        };

        match lookup.verdict() {
            GatewayVerdict::Paid { paid_at } => {
                let outcome = self
                    .settlement_repo
                    .confirm_payment(PaymentConfirmation {
                        transaction_id: transaction.id,
                        paid_at,
                        transaction_no: lookup.data.transaction_no.clone(),
                        gateway_response: lookup.data.raw.clone(),
                    })
                    .await?;

                resolution.status = Resolution::status_after(&outcome, stored);
                resolution.subscription_id = outcome.subscription_id().or(transaction.subscription_id);
            }
            GatewayVerdict::Failed { code } => {
                let outcome = self
                    .settlement_repo
                    .fail_payment(PaymentFailure {
                        transaction_id: transaction.id,
                        code: code.clone(),
                        gateway_response: lookup.data.raw.clone(),
                    })
                    .await?;

                resolution.status = Resolution::status_after(&outcome, stored);
                resolution.subscription_id = outcome.subscription_id().or(transaction.subscription_id);
                resolution.failure_code = code;
            }
            GatewayVerdict::Undetermined => {
                if lookup.success {
                    if let Err(err) = self
                        .transaction_repo
                        .record_gateway_snapshot(
                            transaction.id,
                            lookup.data.transaction_no.clone(),
                            lookup.data.raw.clone(),
                        )
                        .await
                    {
                        warn!(
                            transaction_id = %transaction.id,
                            db_error = ?err,
                            "settlement: failed to store gateway snapshot"
                        );
                    }
                }
                info!(
                    transaction_id = %transaction.id,
                    gateway_available = lookup.success,
                    gateway_status = ?lookup.data.status,
                    "settlement: gateway verdict undetermined, transaction left as is"
                );
            }
        }

        resolution.lookup = Some(lookup);
        Ok(resolution)
    }

    pub async fn resolve(
        &self,
        transaction: &PaymentTransactionEntity,
        hints: &GatewayHints,
    ) -> Result<Resolution> {
        let lookup = self.verify(transaction, hints).await;
        self.apply(transaction, lookup).await
    }

    /// Last resort for subscriptions that were never given a transaction row: check the
    /// gateway with the reference stored on the subscription itself.
    pub async fn resolve_subscription(
        &self,
        subscription: &SubscriptionEntity,
    ) -> Result<SubscriptionResolution> {
        if SubscriptionState::from(subscription).is_confirmed_active() {
            return Ok(SubscriptionResolution {
                outcome: Some(SettlementOutcome::AlreadyCompleted {
                    subscription_id: Some(subscription.id),
                }),
                lookup: None,
            });
        }

        let Some(reference) = subscription
            .transaction_reference
            .as_deref()
            .map(str::trim)
            .filter(|reference| !reference.is_empty())
        else {
            return Ok(SubscriptionResolution {
                outcome: None,
                lookup: None,
            });
        };

        let lookup = self.gateway.get_transaction_by_number(reference).await;
        let outcome = match lookup.verdict() {
            GatewayVerdict::Paid { paid_at } => Some(
                self.settlement_repo
                    .confirm_subscription_payment(subscription.id, paid_at, lookup.data.raw.clone())
                    .await?,
            ),
            GatewayVerdict::Failed { .. } => Some(
                self.settlement_repo
                    .fail_subscription_payment(subscription.id)
                    .await?,
            ),
            GatewayVerdict::Undetermined => None,
        };

        info!(
            subscription_id = %subscription.id,
            %reference,
            gateway_status = ?lookup.data.status,
            ?outcome,
            "settlement: subscription checked against its gateway reference"
        );

        Ok(SubscriptionResolution {
            outcome,
            lookup: Some(lookup),
        })
    }
}
