use crate::auth::AuthUser;
use crate::axum_http::error_responses::AppError;
use crate::config::config_model::DotEnvyConfig;
use crate::usecases::{
    checkout::{CheckoutSettings, CheckoutUseCase},
    payment_gateway::PaymentGateway,
};
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::post,
};
use chrono::Duration;
use crates::{
    domain::{
        repositories::{
            payment_intents::PaymentIntentRepository,
            payment_transactions::PaymentTransactionRepository, plans::PlanRepository,
            promo_codes::PromoCodeRepository, subscriptions::SubscriptionRepository,
            users::UserProfileRepository,
        },
        value_objects::checkout::CreateCheckoutRequest,
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            payment_intents::PaymentIntentPostgres, payment_transactions::PaymentTransactionPostgres,
            plans::PlanPostgres, promo_codes::PromoCodePostgres, subscriptions::SubscriptionPostgres,
            users::UserProfilePostgres,
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
    let checkout_usecase = CheckoutUseCase::new(
        Arc::new(PlanPostgres::new(Arc::clone(&db_pool))),
        Arc::new(UserProfilePostgres::new(Arc::clone(&db_pool))),
        Arc::new(PromoCodePostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PaymentIntentPostgres::new(Arc::clone(&db_pool))),
        Arc::new(PaymentTransactionPostgres::new(Arc::clone(&db_pool))),
        paylink_client,
        CheckoutSettings {
            callback_url: config.payments.callback_url.clone(),
            three_ds_callback_url: config.payments.three_ds_callback_url.clone(),
            intent_ttl: Duration::minutes(config.payments.intent_ttl_minutes),
        },
    );

    Router::new()
        .route("/checkout", post(create_checkout))
        .with_state(Arc::new(checkout_usecase))
}

pub async fn create_checkout<P, U, Promo, S, I, T, G>(
    State(checkout_usecase): State<Arc<CheckoutUseCase<P, U, Promo, S, I, T, G>>>,
    auth: AuthUser,
    payload: Result<Json<CreateCheckoutRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError>
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserProfileRepository + Send + Sync + 'static,
    Promo: PromoCodeRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: PaymentIntentRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let Json(request) = payload.map_err(|rejection| {
        warn!(user_id = %auth.user_id, error = %rejection, "checkout: malformed request body");
        AppError::BadRequest(rejection.body_text())
    })?;

    let response = checkout_usecase
        .create_checkout(auth.user_id, request)
        .await?;

    Ok(Json(response))
}
