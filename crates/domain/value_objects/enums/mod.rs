pub mod discount_types;
pub mod payment_intent_statuses;
pub mod payment_methods;
pub mod subscription_statuses;
pub mod subscription_types;
pub mod transaction_statuses;
