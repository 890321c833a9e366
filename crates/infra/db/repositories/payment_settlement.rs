use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{PgConnection, RunQueryDsl, insert_into, prelude::*, update};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            payment_intents::PaymentIntentEntity, payment_transactions::PaymentTransactionEntity,
            subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
        },
        repositories::payment_settlement::PaymentSettlementRepository,
        value_objects::{
            enums::{
                payment_intent_statuses::PaymentIntentStatus,
                subscription_statuses::SubscriptionStatus, subscription_types::SubscriptionType,
                transaction_statuses::TransactionStatus,
            },
            settlement::{
                ActivationPlan, FailurePlan, PaymentConfirmation, PaymentFailure,
                SettlementContext, SettlementOutcome, SubscriptionState, SubscriptionWrite,
                plan_activation, plan_failure,
            },
        },
    },
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{payment_intents, payment_transactions, promo_codes, subscriptions},
    },
};

type TxResult<T> = std::result::Result<T, diesel::result::Error>;

pub struct PaymentSettlementPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentSettlementPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn lock_transaction(
    conn: &mut PgConnection,
    transaction_id: Uuid,
) -> TxResult<Option<PaymentTransactionEntity>> {
    payment_transactions::table
        .find(transaction_id)
        .select(PaymentTransactionEntity::as_select())
        .for_update()
        .first::<PaymentTransactionEntity>(conn)
        .optional()
}

fn lock_intent(
    conn: &mut PgConnection,
    payment_intent_id: Option<Uuid>,
) -> TxResult<Option<PaymentIntentEntity>> {
    let Some(payment_intent_id) = payment_intent_id else {
        return Ok(None);
    };

    payment_intents::table
        .find(payment_intent_id)
        .select(PaymentIntentEntity::as_select())
        .for_update()
        .first::<PaymentIntentEntity>(conn)
        .optional()
}

fn lock_subscription(
    conn: &mut PgConnection,
    subscription_id: Option<Uuid>,
) -> TxResult<Option<SubscriptionEntity>> {
    let Some(subscription_id) = subscription_id else {
        return Ok(None);
    };

    subscriptions::table
        .find(subscription_id)
        .select(SubscriptionEntity::as_select())
        .for_update()
        .first::<SubscriptionEntity>(conn)
        .optional()
}

fn subscription_type_of(
    intent: Option<&PaymentIntentEntity>,
    subscription: Option<&SubscriptionEntity>,
) -> SubscriptionType {
    intent
        .and_then(|intent| SubscriptionType::from_str(&intent.subscription_type))
        .or_else(|| {
            subscription.and_then(|subscription| {
                SubscriptionType::from_str(&subscription.subscription_type)
            })
        })
        .unwrap_or_default()
}

fn activate_subscription(
    conn: &mut PgConnection,
    subscription_id: Uuid,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    transaction_id: Option<Uuid>,
    now: DateTime<Utc>,
) -> TxResult<()> {
    update(subscriptions::table.find(subscription_id))
        .set((
            subscriptions::status.eq(SubscriptionStatus::Active.to_string()),
            subscriptions::payment_confirmed.eq(true),
            subscriptions::started_date.eq(Some(starts_at)),
            subscriptions::expired_date.eq(Some(ends_at)),
            subscriptions::updated_at.eq(now),
        ))
        .execute(conn)?;

    if let Some(transaction_id) = transaction_id {
        update(subscriptions::table.find(subscription_id))
            .set(subscriptions::transaction_id.eq(Some(transaction_id)))
            .execute(conn)?;
    }

    Ok(())
}

fn renew_subscription(
    conn: &mut PgConnection,
    subscription_id: Uuid,
    ends_at: DateTime<Utc>,
    transaction_id: Uuid,
    now: DateTime<Utc>,
) -> TxResult<()> {
    update(subscriptions::table.find(subscription_id))
        .set((
            subscriptions::expired_date.eq(Some(ends_at)),
            subscriptions::transaction_id.eq(Some(transaction_id)),
            subscriptions::updated_at.eq(now),
        ))
        .execute(conn)?;

    Ok(())
}

fn fail_subscription(
    conn: &mut PgConnection,
    subscription_id: Uuid,
    now: DateTime<Utc>,
) -> TxResult<()> {
    update(subscriptions::table.find(subscription_id))
        .set((
            subscriptions::status.eq(SubscriptionStatus::PaymentFailed.to_string()),
            subscriptions::payment_confirmed.eq(false),
            subscriptions::started_date.eq(None::<DateTime<Utc>>),
            subscriptions::expired_date.eq(None::<DateTime<Utc>>),
            subscriptions::updated_at.eq(now),
        ))
        .execute(conn)?;

    Ok(())
}

fn set_intent_status(
    conn: &mut PgConnection,
    payment_intent_id: Uuid,
    status: PaymentIntentStatus,
    now: DateTime<Utc>,
) -> TxResult<()> {
    update(payment_intents::table.find(payment_intent_id))
        .set((
            payment_intents::status.eq(status.as_str()),
            payment_intents::updated_at.eq(now),
        ))
        .execute(conn)?;

    Ok(())
}

fn count_promo_use(conn: &mut PgConnection, code: &str) -> TxResult<()> {
    update(promo_codes::table.filter(promo_codes::code.eq(code)))
        .set(promo_codes::used_count.eq(promo_codes::used_count + 1))
        .execute(conn)?;

    Ok(())
}

#[async_trait]
impl PaymentSettlementRepository for PaymentSettlementPostgres {
    async fn confirm_payment(&self, confirmation: PaymentConfirmation) -> Result<SettlementOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let outcome = conn.transaction::<SettlementOutcome, diesel::result::Error, _>(|conn| {
            let Some(transaction) = lock_transaction(conn, confirmation.transaction_id)? else {
                return Ok(SettlementOutcome::NotFound);
            };
            let intent = lock_intent(conn, transaction.payment_intent_id)?;
            let subscription = lock_subscription(conn, transaction.subscription_id)?;

            let subscription_type = subscription_type_of(intent.as_ref(), subscription.as_ref());
            let context = SettlementContext {
                transaction_status: TransactionStatus::from_str(&transaction.status),
                intent_status: intent
                    .as_ref()
                    .and_then(|intent| PaymentIntentStatus::from_str(&intent.status)),
                subscription: subscription.as_ref().map(SubscriptionState::from),
                subscription_type,
                has_promo_code: intent
                    .as_ref()
                    .is_some_and(|intent| intent.promo_code.is_some()),
            };

            let (write, complete_intent, promo_use) = match plan_activation(&context, now) {
                ActivationPlan::AlreadyCompleted => {
                    return Ok(SettlementOutcome::AlreadyCompleted {
                        subscription_id: transaction.subscription_id,
                    });
                }
                ActivationPlan::Refused => {
                    return Ok(SettlementOutcome::Conflict {
                        current: TransactionStatus::Failed,
                    });
                }
                ActivationPlan::Apply {
                    subscription,
                    complete_intent,
                    count_promo_use,
                } => (subscription, complete_intent, count_promo_use),
            };

            let subscription_id = match write {
                SubscriptionWrite::Insert { starts_at, ends_at } => {
                    insert_into(subscriptions::table)
                        .values(&InsertSubscriptionEntity {
                            user_id: transaction.user_id,
                            plan_id: intent.as_ref().and_then(|intent| intent.plan_id),
                            subscription_type: subscription_type.to_string(),
                            status: SubscriptionStatus::Active.to_string(),
                            payment_confirmed: true,
                            started_date: Some(starts_at),
                            expired_date: Some(ends_at),
                            transaction_id: Some(transaction.id),
                            payment_intent_id: transaction.payment_intent_id,
                            transaction_reference: Some(transaction.order_number.clone()),
                        })
                        .returning(subscriptions::id)
                        .get_result::<Uuid>(conn)?
                }
                SubscriptionWrite::Activate {
                    id,
                    starts_at,
                    ends_at,
                } => {
                    activate_subscription(conn, id, starts_at, ends_at, Some(transaction.id), now)?;
                    id
                }
                SubscriptionWrite::Renew { id, ends_at } => {
                    renew_subscription(conn, id, ends_at, transaction.id, now)?;
                    id
                }
            };

            update(payment_transactions::table.find(transaction.id))
                .set((
                    payment_transactions::status.eq(TransactionStatus::Completed.as_str()),
                    payment_transactions::subscription_id.eq(Some(subscription_id)),
                    payment_transactions::paid_at.eq(Some(confirmation.paid_at)),
                    payment_transactions::gateway_response
                        .eq(Some(confirmation.gateway_response.clone())),
                    payment_transactions::updated_at.eq(now),
                ))
                .execute(conn)?;

            if transaction.transaction_no.is_none() {
                if let Some(transaction_no) = &confirmation.transaction_no {
                    update(payment_transactions::table.find(transaction.id))
                        .set(payment_transactions::transaction_no.eq(Some(transaction_no.clone())))
                        .execute(conn)?;
                }
            }

            if let Some(intent) = intent.as_ref() {
                if complete_intent {
                    set_intent_status(conn, intent.id, PaymentIntentStatus::Completed, now)?;
                }
                if promo_use {
                    if let Some(code) = intent.promo_code.as_deref() {
                        count_promo_use(conn, code)?;
                    }
                }
            }

            Ok(SettlementOutcome::Activated { subscription_id })
        })?;

        match &outcome {
            SettlementOutcome::Activated { subscription_id } => info!(
                transaction_id = %confirmation.transaction_id,
                %subscription_id,
                "settlement: payment confirmed and subscription activated"
            ),
            SettlementOutcome::Conflict { current } => warn!(
                transaction_id = %confirmation.transaction_id,
                current = current.as_str(),
                "settlement: paid verdict for a transaction already failed, keeping failed"
            ),
            _ => {}
        }

        Ok(outcome)
    }

    async fn fail_payment(&self, failure: PaymentFailure) -> Result<SettlementOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let outcome = conn.transaction::<SettlementOutcome, diesel::result::Error, _>(|conn| {
            let Some(transaction) = lock_transaction(conn, failure.transaction_id)? else {
                return Ok(SettlementOutcome::NotFound);
            };
            let intent = lock_intent(conn, transaction.payment_intent_id)?;
            let subscription = lock_subscription(conn, transaction.subscription_id)?;

            let context = SettlementContext {
                transaction_status: TransactionStatus::from_str(&transaction.status),
                intent_status: intent
                    .as_ref()
                    .and_then(|intent| PaymentIntentStatus::from_str(&intent.status)),
                subscription: subscription.as_ref().map(SubscriptionState::from),
                subscription_type: subscription_type_of(intent.as_ref(), subscription.as_ref()),
                has_promo_code: false,
            };

            let (fail_subscription_id, fail_intent) = match plan_failure(&context) {
                FailurePlan::AlreadyFailed => return Ok(SettlementOutcome::AlreadyFailed),
                FailurePlan::Refused => {
                    return Ok(SettlementOutcome::Conflict {
                        current: TransactionStatus::Completed,
                    });
                }
                FailurePlan::Apply {
                    fail_subscription,
                    fail_intent,
                } => (fail_subscription, fail_intent),
            };

            update(payment_transactions::table.find(transaction.id))
                .set((
                    payment_transactions::status.eq(TransactionStatus::Failed.as_str()),
                    payment_transactions::gateway_response
                        .eq(Some(failure.gateway_response.clone())),
                    payment_transactions::updated_at.eq(now),
                ))
                .execute(conn)?;

            if let Some(subscription_id) = fail_subscription_id {
                fail_subscription(conn, subscription_id, now)?;
            }

            if let (true, Some(intent)) = (fail_intent, intent.as_ref()) {
                set_intent_status(conn, intent.id, PaymentIntentStatus::Failed, now)?;
            }

            Ok(SettlementOutcome::Failed {
                subscription_id: fail_subscription_id,
            })
        })?;

        match &outcome {
            SettlementOutcome::Failed { .. } => info!(
                transaction_id = %failure.transaction_id,
                code = failure.code.as_deref().unwrap_or("-"),
                "settlement: payment marked failed"
            ),
            SettlementOutcome::Conflict { .. } => warn!(
                transaction_id = %failure.transaction_id,
                "settlement: failed verdict for a completed transaction, keeping completed"
            ),
            _ => {}
        }

        Ok(outcome)
    }

    async fn confirm_subscription_payment(
        &self,
        subscription_id: Uuid,
        paid_at: DateTime<Utc>,
        gateway_response: Value,
    ) -> Result<SettlementOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let outcome = conn.transaction::<SettlementOutcome, diesel::result::Error, _>(|conn| {
            let Some(subscription) = lock_subscription(conn, Some(subscription_id))? else {
                return Ok(SettlementOutcome::NotFound);
            };
            let intent = lock_intent(conn, subscription.payment_intent_id)?;

            let state = SubscriptionState::from(&subscription);
            let transaction_status = if state.is_confirmed_active() {
                TransactionStatus::Completed
            } else {
                TransactionStatus::Pending
            };
            let context = SettlementContext {
                transaction_status,
                intent_status: intent
                    .as_ref()
                    .and_then(|intent| PaymentIntentStatus::from_str(&intent.status)),
                subscription: Some(state),
                subscription_type: subscription_type_of(intent.as_ref(), Some(&subscription)),
                has_promo_code: intent
                    .as_ref()
                    .is_some_and(|intent| intent.promo_code.is_some()),
            };

            let ActivationPlan::Apply {
                subscription: write,
                complete_intent,
                count_promo_use: promo_use,
            } = plan_activation(&context, now)
            else {
                return Ok(SettlementOutcome::AlreadyCompleted {
                    subscription_id: Some(subscription.id),
                });
            };

            if let SubscriptionWrite::Activate {
                id,
                starts_at,
                ends_at,
            } = write
            {
                activate_subscription(conn, id, starts_at, ends_at, None, now)?;
            }

            if let Some(intent) = intent.as_ref() {
                if complete_intent {
                    set_intent_status(conn, intent.id, PaymentIntentStatus::Completed, now)?;
                }
                if promo_use {
                    if let Some(code) = intent.promo_code.as_deref() {
                        count_promo_use(conn, code)?;
                    }
                }
            }

            Ok(SettlementOutcome::Activated {
                subscription_id: subscription.id,
            })
        })?;

        info!(
            %subscription_id,
            %paid_at,
            gateway_status = gateway_response
                .get("orderStatus")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("-"),
            ?outcome,
            "settlement: subscription confirmed through its stored reference"
        );

        Ok(outcome)
    }

    async fn fail_subscription_payment(&self, subscription_id: Uuid) -> Result<SettlementOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let outcome = conn.transaction::<SettlementOutcome, diesel::result::Error, _>(|conn| {
            let Some(subscription) = lock_subscription(conn, Some(subscription_id))? else {
                return Ok(SettlementOutcome::NotFound);
            };

            match SubscriptionStatus::from_str(&subscription.status) {
                SubscriptionStatus::Active => Ok(SettlementOutcome::Conflict {
                    current: TransactionStatus::Completed,
                }),
                SubscriptionStatus::PaymentFailed => Ok(SettlementOutcome::AlreadyFailed),
                _ => {
                    fail_subscription(conn, subscription.id, now)?;
                    Ok(SettlementOutcome::Failed {
                        subscription_id: Some(subscription.id),
                    })
                }
            }
        })?;

        info!(%subscription_id, ?outcome, "settlement: subscription payment failure applied");

        Ok(outcome)
    }
}
