use std::time::Duration;

use crates::payments::paylink_client::PaylinkConfig;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub paylink: Paylink,
    pub payments: Payments,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

impl BackendServer {
    /// Budget for a payment handler's own work. Kept under the server timeout so the
    /// handler still answers with its envelope or redirect instead of a bare 408.
    pub fn handler_deadline(&self) -> Duration {
        Duration::from_millis(self.timeout.saturating_mul(800))
    }
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Paylink {
    pub base_url: String,
    pub fallback_base_url: Option<String>,
    pub api_id: String,
    pub secret_key: String,
    pub production: bool,
    pub persist_token: bool,
    pub currency: String,
    pub timeout_secs: u64,
    pub debug: bool,
}

impl Paylink {
    pub fn client_config(&self) -> PaylinkConfig {
        PaylinkConfig {
            base_url: self.base_url.clone(),
            fallback_base_url: self.fallback_base_url.clone(),
            api_id: self.api_id.clone(),
            secret_key: self.secret_key.clone(),
            persist_token: self.persist_token,
            currency: self.currency.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            debug: self.debug,
        }
    }
}

/// Where the gateway and the customer's browser are sent back to.
#[derive(Debug, Clone)]
pub struct Payments {
    pub public_base_url: String,
    pub callback_url: String,
    pub three_ds_callback_url: String,
    pub status_page_url: String,
    pub intent_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct UserSecret {
    pub secret: String,
}
