use anyhow::{Context, Ok, Result};
use crates::payments::paylink_client::{PRODUCTION_BASE_URL, SANDBOX_BASE_URL};

use crate::config::{
    config_model::{BackendServer, Database, DotEnvyConfig, Paylink, Payments, UserSecret},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();

    let backend_server = BackendServer {
        port: std::env::var("SERVER_PORT_BACKEND")
            .expect("SERVER_PORT_BACKEND is invalid")
            .parse()?,
        body_limit: std::env::var("SERVER_BODY_LIMIT")
            .expect("SERVER_BODY_LIMIT is invalid")
            .parse()?,
        timeout: std::env::var("SERVER_TIMEOUT")
            .expect("SERVER_TIMEOUT is invalid")
            .parse()?,
    };

    let database = Database {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL is invalid"),
    };

    let lookup = |key: &str| std::env::var(key).ok();
    let paylink = paylink_from_lookup(lookup)?;
    let payments = payments_from_lookup(lookup)?;

    Ok(DotEnvyConfig {
        backend_server,
        database,
        paylink,
        payments,
    })
}

pub fn get_stage() -> Stage {
    dotenvy::dotenv().ok();

    let stage_str = std::env::var("STAGE").unwrap_or("".to_string());
    Stage::try_from(&stage_str).unwrap_or_default()
}

pub fn get_user_secret() -> Result<UserSecret> {
    dotenvy::dotenv().ok();

    Ok(UserSecret {
        secret: std::env::var("JWT_USER_SECRET").expect("JWT_USER_SECRET is invalid"),
    })
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool> {
    match non_empty(lookup, key) {
        None => Ok(false),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow::anyhow!("{key} is not a boolean: {raw}")),
        },
    }
}

pub fn paylink_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Paylink> {
    let production = flag(&lookup, "PAYLINK_PRODUCTION")?;
    let default_base_url = if production {
        PRODUCTION_BASE_URL
    } else {
        SANDBOX_BASE_URL
    };

    let timeout_secs = match non_empty(&lookup, "PAYLINK_TIMEOUT_SECS") {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("PAYLINK_TIMEOUT_SECS is invalid: {raw}"))?,
        None => 15,
    };

    Ok(Paylink {
        base_url: non_empty(&lookup, "PAYLINK_BASE_URL")
            .unwrap_or_else(|| default_base_url.to_string()),
        fallback_base_url: non_empty(&lookup, "PAYLINK_FALLBACK_BASE_URL"),
        api_id: non_empty(&lookup, "PAYLINK_API_ID").unwrap_or_default(),
        secret_key: non_empty(&lookup, "PAYLINK_SECRET_KEY").unwrap_or_default(),
        production,
        persist_token: flag(&lookup, "PAYLINK_PERSIST_TOKEN")?,
        currency: non_empty(&lookup, "PAYLINK_CURRENCY").unwrap_or_else(|| "SAR".to_string()),
        timeout_secs,
        debug: flag(&lookup, "PAYLINK_DEBUG")?,
    })
}

pub fn payments_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Payments> {
    let public_base_url = non_empty(&lookup, "PAYMENTS_PUBLIC_BASE_URL")
        .context("PAYMENTS_PUBLIC_BASE_URL is invalid")?
        .trim_end_matches('/')
        .to_string();

    let intent_ttl_minutes = match non_empty(&lookup, "PAYMENT_INTENT_TTL_MINUTES") {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|minutes| *minutes > 0)
            .with_context(|| format!("PAYMENT_INTENT_TTL_MINUTES is invalid: {raw}"))?,
        None => 60,
    };

    Ok(Payments {
        callback_url: non_empty(&lookup, "PAYMENTS_DEFAULT_CALLBACK_URL")
            .unwrap_or_else(|| format!("{public_base_url}/api/v1/payments/paylink/callback")),
        three_ds_callback_url: format!("{public_base_url}/api/v1/payments/paylink/3ds-callback"),
        status_page_url: non_empty(&lookup, "PAYMENTS_STATUS_PAGE_URL")
            .unwrap_or_else(|| format!("{public_base_url}/payment/status")),
        public_base_url,
        intent_ttl_minutes,
    })
}
