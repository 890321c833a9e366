pub mod callback_payload;
pub mod checkout;
pub mod enums;
pub mod gateway;
pub mod money;
pub mod payment_status;
pub mod polling_policy;
pub mod settlement;
