use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::entities::subscriptions::SubscriptionEntity;
use crate::domain::value_objects::enums::{
    payment_intent_statuses::PaymentIntentStatus, subscription_statuses::SubscriptionStatus,
    subscription_types::SubscriptionType, transaction_statuses::TransactionStatus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionState {
    pub id: Uuid,
    pub status: SubscriptionStatus,
    pub payment_confirmed: bool,
    pub started_date: Option<DateTime<Utc>>,
    pub expired_date: Option<DateTime<Utc>>,
}

impl From<&SubscriptionEntity> for SubscriptionState {
    fn from(value: &SubscriptionEntity) -> Self {
        Self {
            id: value.id,
            status: SubscriptionStatus::from_str(&value.status),
            payment_confirmed: value.payment_confirmed,
            started_date: value.started_date,
            expired_date: value.expired_date,
        }
    }
}

impl SubscriptionState {
    pub fn is_confirmed_active(&self) -> bool {
        self.status == SubscriptionStatus::Active && self.payment_confirmed
    }
}

/// A paid verdict to apply to one transaction.
#[derive(Debug, Clone)]
pub struct PaymentConfirmation {
    pub transaction_id: Uuid,
    pub paid_at: DateTime<Utc>,
    pub transaction_no: Option<String>,
    pub gateway_response: Value,
}

/// A failed verdict to apply to one transaction.
#[derive(Debug, Clone)]
pub struct PaymentFailure {
    pub transaction_id: Uuid,
    pub code: Option<String>,
    pub gateway_response: Value,
}

/// What a settlement write ended up doing. Landing on an already terminal row is an
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Activated { subscription_id: Uuid },
    AlreadyCompleted { subscription_id: Option<Uuid> },
    Failed { subscription_id: Option<Uuid> },
    AlreadyFailed,
    /// The row already holds the opposite terminal status.
    Conflict { current: TransactionStatus },
    NotFound,
}

impl SettlementOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(
            self,
            SettlementOutcome::Activated { .. } | SettlementOutcome::AlreadyCompleted { .. }
        ) || *self
            == (SettlementOutcome::Conflict {
                current: TransactionStatus::Completed,
            })
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            SettlementOutcome::Failed { .. } | SettlementOutcome::AlreadyFailed
        ) || *self
            == (SettlementOutcome::Conflict {
                current: TransactionStatus::Failed,
            })
    }

    pub fn subscription_id(&self) -> Option<Uuid> {
        match self {
            SettlementOutcome::Activated { subscription_id } => Some(*subscription_id),
            SettlementOutcome::AlreadyCompleted { subscription_id }
            | SettlementOutcome::Failed { subscription_id } => *subscription_id,
            _ => None,
        }
    }
}

/// Rows as read (and locked) right before a settlement write.
#[derive(Debug, Clone)]
pub struct SettlementContext {
    pub transaction_status: TransactionStatus,
    pub intent_status: Option<PaymentIntentStatus>,
    pub subscription: Option<SubscriptionState>,
    pub subscription_type: SubscriptionType,
    pub has_promo_code: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionWrite {
    Insert {
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    },
    Activate {
        id: Uuid,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    },
    /// Already active through an earlier payment: the new period starts where the
    /// current one ends, or now if it has lapsed.
    Renew { id: Uuid, ends_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationPlan {
    AlreadyCompleted,
    /// The transaction already failed; the first terminal status stands.
    Refused,
    Apply {
        subscription: SubscriptionWrite,
        complete_intent: bool,
        count_promo_use: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailurePlan {
    AlreadyFailed,
    /// The transaction already completed; the first terminal status stands.
    Refused,
    Apply {
        fail_subscription: Option<Uuid>,
        fail_intent: bool,
    },
}

/// Decides what confirming a payment must write. Only a `pending` transaction moves,
/// so replaying the same confirmation is a no-op.
pub fn plan_activation(context: &SettlementContext, activated_at: DateTime<Utc>) -> ActivationPlan {
    match context.transaction_status {
        TransactionStatus::Completed => return ActivationPlan::AlreadyCompleted,
        TransactionStatus::Failed => return ActivationPlan::Refused,
        TransactionStatus::Pending => {}
    }

    let starts_at = activated_at;
    let ends_at = context.subscription_type.period_end(starts_at);

    let subscription = match &context.subscription {
        Some(existing) if existing.is_confirmed_active() => {
            let renews_from = existing
                .expired_date
                .map_or(activated_at, |expired_date| expired_date.max(activated_at));
            SubscriptionWrite::Renew {
                id: existing.id,
                ends_at: context.subscription_type.period_end(renews_from),
            }
        }
        Some(existing) => SubscriptionWrite::Activate {
            id: existing.id,
            starts_at,
            ends_at,
        },
        None => SubscriptionWrite::Insert { starts_at, ends_at },
    };

    let complete_intent = matches!(
        context.intent_status,
        Some(PaymentIntentStatus::Pending) | Some(PaymentIntentStatus::Expired)
    );

    ActivationPlan::Apply {
        subscription,
        complete_intent,
        count_promo_use: complete_intent && context.has_promo_code,
    }
}

/// Decides what a confirmed gateway failure must write. An active subscription paid by
/// another transaction is left alone.
pub fn plan_failure(context: &SettlementContext) -> FailurePlan {
    match context.transaction_status {
        TransactionStatus::Failed => return FailurePlan::AlreadyFailed,
        TransactionStatus::Completed => return FailurePlan::Refused,
        TransactionStatus::Pending => {}
    }

    let fail_subscription = context
        .subscription
        .as_ref()
        .filter(|subscription| subscription.status != SubscriptionStatus::Active)
        .map(|subscription| subscription.id);

    FailurePlan::Apply {
        fail_subscription,
        fail_intent: context.intent_status == Some(PaymentIntentStatus::Pending),
    }
}
