pub mod checkout;
pub mod payment_gateway;
pub mod payment_status;
pub mod reconciliation;
pub mod settlement;

#[cfg(test)]
pub mod fixtures;
