use crate::config::config_model::DotEnvyConfig;
use crate::usecases::{
    payment_gateway::PaymentGateway, payment_status::PaymentStatusUseCase,
    settlement::SettlementUseCase,
};
use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use crates::{
    domain::{
        repositories::{
            payment_intents::PaymentIntentRepository,
            payment_settlement::PaymentSettlementRepository,
            payment_transactions::PaymentTransactionRepository,
            subscriptions::SubscriptionRepository,
        },
        value_objects::{
            payment_status::{PaymentStatusEnvelope, PaymentStatusQuery},
            polling_policy::PollingPolicy,
        },
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            payment_intents::PaymentIntentPostgres, payment_settlement::PaymentSettlementPostgres,
            payment_transactions::PaymentTransactionPostgres, subscriptions::SubscriptionPostgres,
        },
    },
    payments::paylink_client::PaylinkClient,
};
use std::sync::Arc;
use tracing::warn;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    paylink_client: Arc<PaylinkClient>,
    config: Arc<DotEnvyConfig>,
) -> Router {
    let transaction_repository = Arc::new(PaymentTransactionPostgres::new(Arc::clone(&db_pool)));
    let settlement_usecase = SettlementUseCase::new(
        Arc::clone(&transaction_repository),
        Arc::new(PaymentSettlementPostgres::new(Arc::clone(&db_pool))),
        paylink_client,
    );
    let payment_status_usecase = PaymentStatusUseCase::new(
        transaction_repository,
        Arc::new(PaymentIntentPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(settlement_usecase),
        PollingPolicy::default(),
    )
    .with_deadline(config.backend_server.handler_deadline());

    Router::new()
        .route("/status", get(check_payment_status))
        .with_state(Arc::new(payment_status_usecase))
}

/// Always 200: polling clients read the outcome from the envelope.
pub async fn check_payment_status<T, I, S, R, G>(
    State(payment_status_usecase): State<Arc<PaymentStatusUseCase<T, I, S, R, G>>>,
    query: Result<Query<PaymentStatusQuery>, QueryRejection>,
) -> impl IntoResponse
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    I: PaymentIntentRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let envelope = match query {
        Ok(Query(query)) => payment_status_usecase.check(query).await,
        Err(rejection) => {
            warn!(error = %rejection, "payment_status: malformed query");
            PaymentStatusEnvelope::error("Invalid status query")
        }
    };

    (StatusCode::OK, Json(envelope))
}
