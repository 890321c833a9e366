mod config;
mod discord;
mod layer;
mod notifier;
pub(crate) mod redaction;

use anyhow::Result;
use config::ObservabilityConfig;
use discord::DiscordWebhookSink;
use layer::ErrorAlertLayer;
use notifier::{AlertDispatcher, AlertSink};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Installs the global subscriber: fmt output with local RFC 3339 timestamps,
/// `RUST_LOG` filtering (default `info`) and optional Discord alerts. Must run inside
/// a tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);
    let mut warnings = config.warnings.clone();

    let alert_layer = match config.discord.as_ref() {
        Some(discord) => match DiscordWebhookSink::new(discord.webhook_url.clone()) {
            Ok(sink) => {
                let dispatcher = AlertDispatcher::spawn(vec![Arc::new(sink) as Arc<dyn AlertSink>]);
                Some(
                    ErrorAlertLayer::new(dispatcher, config.service_context.clone(), discord.min_level)
                        .with_filter(LevelFilter::from_level(discord.min_level)),
                )
            }
            Err(err) => {
                warnings.push(format!("Discord alerts disabled, http client failed to build: {err}"));
                None
            }
        },
        None => None,
    };
    let alerts_enabled = alert_layer.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    let service = &config.service_context;
    for warning in &warnings {
        warn!(
            service = %service.service_name,
            environment = %service.environment,
            %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %service.service_name,
        environment = %service.environment,
        component = %service.component,
        discord_alerts = alerts_enabled,
        "observability: initialised"
    );

    Ok(())
}
