use crate::{
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Router,
    http::{
        Method,
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    infra::db::postgres::postgres_connection::PgPoolSquad,
    payments::{paylink_client::PaylinkClient, token_cache::TokenCache},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let paylink_client = Arc::new(PaylinkClient::new(
        config.paylink.client_config(),
        Arc::new(TokenCache::default()),
    )?);
    info!(
        base_url = %config.paylink.base_url,
        production = config.paylink.production,
        "Paylink client is ready"
    );

    let payments = Router::new()
        .merge(routers::checkout::routes(
            Arc::clone(&db_pool),
            Arc::clone(&paylink_client),
            Arc::clone(&config),
        ))
        .merge(routers::paylink_callbacks::routes(
            Arc::clone(&db_pool),
            Arc::clone(&paylink_client),
            Arc::clone(&config),
        ))
        .merge(routers::payment_status::routes(
            Arc::clone(&db_pool),
            Arc::clone(&paylink_client),
            Arc::clone(&config),
        ));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1/payments", payments)
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!("Server is running on port {}", config.backend_server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
    };

    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
