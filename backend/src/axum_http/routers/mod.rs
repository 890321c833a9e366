pub mod checkout;
pub mod paylink_callbacks;
pub mod payment_status;
