pub mod payment_intents;
pub mod payment_settlement;
pub mod payment_transactions;
pub mod plans;
pub mod promo_codes;
pub mod subscriptions;
pub mod users;
