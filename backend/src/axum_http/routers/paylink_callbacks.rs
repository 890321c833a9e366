use crate::axum_http::error_responses::ErrorResponse;
use crate::config::config_model::DotEnvyConfig;
use crate::usecases::{
    payment_gateway::PaymentGateway,
    reconciliation::{CallbackRedirect, ReconciliationUseCase, RedirectStatus},
    settlement::SettlementUseCase,
};
use axum::{
    Json, Router,
    body::Bytes,
    extract::{OriginalUri, Query, State, rejection::QueryRejection},
    http::{
        HeaderMap, StatusCode,
        header::{ACCEPT, CONTENT_TYPE},
    },
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use crates::{
    domain::{
        repositories::{
            payment_settlement::PaymentSettlementRepository,
            payment_transactions::PaymentTransactionRepository,
        },
        value_objects::callback_payload::{CallbackChannel, CallbackPayload},
    },
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{
            payment_settlement::PaymentSettlementPostgres,
            payment_transactions::PaymentTransactionPostgres,
        },
    },
    payments::paylink_client::PaylinkClient,
};
use std::{collections::HashMap, sync::Arc};
use tracing::{info, warn};

pub struct CallbackHandler<T, R, G>
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    reconciliation_usecase: ReconciliationUseCase<T, R, G>,
    status_page_url: String,
}

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
    let handler = CallbackHandler {
        reconciliation_usecase: ReconciliationUseCase::new(
            transaction_repository,
            Arc::new(settlement_usecase),
        )
        .with_deadline(config.backend_server.handler_deadline()),
        status_page_url: config.payments.status_page_url.clone(),
    };

    Router::new()
        .route(
            "/paylink/callback",
            get(browser_return).post(gateway_callback),
        )
        .route(
            "/paylink/3ds-callback",
            get(three_ds_browser_callback).post(three_ds_callback),
        )
        .with_state(Arc::new(handler))
}

fn query_map(query: Result<Query<HashMap<String, String>>, QueryRejection>) -> HashMap<String, String> {
    match query {
        Ok(Query(query)) => query,
        Err(rejection) => {
            warn!(error = %rejection, "paylink_callbacks: unreadable query string, ignoring it");
            HashMap::new()
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: axum::http::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn wants_json(headers: &HeaderMap) -> bool {
    header_str(headers, ACCEPT).is_some_and(|accept| accept.contains("application/json"))
}

impl<T, R, G> CallbackHandler<T, R, G>
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    async fn redirect(&self, channel: CallbackChannel, payload: &CallbackPayload) -> CallbackRedirect {
        self.reconciliation_usecase
            .handle_callback(channel, payload)
            .await
    }

    /// Server-to-server deliveries that ask for JSON get a JSON error instead of a
    /// redirect they would never follow. Everything else is redirected.
    fn respond(&self, redirect: CallbackRedirect, headers: &HeaderMap) -> Response {
        if redirect.status == RedirectStatus::Error && wants_json(headers) {
            let status = StatusCode::INTERNAL_SERVER_ERROR;
            return (
                status,
                Json(ErrorResponse {
                    code: status.as_u16(),
                    message: "Callback could not be processed".to_string(),
                }),
            )
                .into_response();
        }

        Redirect::to(&redirect.to_url(&self.status_page_url)).into_response()
    }
}

pub async fn gateway_callback<T, R, G>(
    State(handler): State<Arc<CallbackHandler<T, R, G>>>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let payload = CallbackPayload::parse(
        header_str(&headers, CONTENT_TYPE),
        &body,
        query_map(query),
        uri.path(),
    );
    let redirect = handler.redirect(CallbackChannel::Standard, &payload).await;
    handler.respond(redirect, &headers)
}

pub async fn three_ds_callback<T, R, G>(
    State(handler): State<Arc<CallbackHandler<T, R, G>>>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
    headers: HeaderMap,
    body: Bytes,
) -> Response
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let payload = CallbackPayload::parse(
        header_str(&headers, CONTENT_TYPE),
        &body,
        query_map(query),
        uri.path(),
    );
    let redirect = handler.redirect(CallbackChannel::ThreeDSecure, &payload).await;
    handler.respond(redirect, &headers)
}

pub async fn browser_return<T, R, G>(
    State(handler): State<Arc<CallbackHandler<T, R, G>>>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Response
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let payload = CallbackPayload::from_query(query_map(query), uri.path());
    let redirect = handler.redirect(CallbackChannel::BrowserReturn, &payload).await;
    Redirect::to(&redirect.to_url(&handler.status_page_url)).into_response()
}

/// Browsers sometimes land here with the 3DS result in the query string. Those are
/// bounced back as a POST so they take the same path as a direct 3DS delivery.
pub async fn three_ds_browser_callback<T, R, G>(
    State(handler): State<Arc<CallbackHandler<T, R, G>>>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Response
where
    T: PaymentTransactionRepository + Send + Sync + 'static,
    R: PaymentSettlementRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    let query = query_map(query);
    let payload = CallbackPayload::from_query(query.clone(), uri.path());

    if payload.has_three_ds_payload() {
        info!(path = uri.path(), "paylink_callbacks: bouncing 3DS result to POST");
        return Html(auto_submit_form(uri.path(), &query)).into_response();
    }

    let redirect = handler.redirect(CallbackChannel::BrowserReturn, &payload).await;
    Redirect::to(&redirect.to_url(&handler.status_page_url)).into_response()
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn auto_submit_form(action: &str, fields: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = fields.keys().collect();
    names.sort();

    let inputs: String = names
        .into_iter()
        .map(|name| {
            format!(
                r#"<input type="hidden" name="{}" value="{}">"#,
                escape_html(name),
                escape_html(&fields[name])
            )
        })
        .collect::<Vec<_>>()
        .join("\n      ");

    format!(
        r#"<!DOCTYPE html>
<html>
  <head><meta charset="utf-8"><title>Completing payment</title></head>
  <body onload="document.forms[0].submit()">
    <form method="POST" action="{action}">
      {inputs}
      <noscript><button type="submit">Continue</button></noscript>
    </form>
  </body>
</html>
"#,
        action = escape_html(action),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::fixtures::{self, SlowGateway};
    use axum::{body::Body, http::Request};
    use crates::domain::{
        repositories::{
            payment_settlement::MockPaymentSettlementRepository,
            payment_transactions::MockPaymentTransactionRepository,
        },
        value_objects::enums::transaction_statuses::TransactionStatus,
    };
    use std::time::Duration;
    use tower::ServiceExt;
    use tower_http::timeout::TimeoutLayer;

    fn slow_gateway_app() -> Router {
        let transaction = fixtures::transaction(TransactionStatus::Pending);
        let mut transaction_repo = MockPaymentTransactionRepository::new();
        transaction_repo.expect_find_by_reference().returning(move |_| {
            let transaction = transaction.clone();
            Box::pin(async move { Ok(Some(transaction)) })
        });
        let transaction_repo = Arc::new(transaction_repo);
        let settlement = SettlementUseCase::new(
            Arc::clone(&transaction_repo),
            Arc::new(MockPaymentSettlementRepository::new()),
            Arc::new(SlowGateway {
                delay: Duration::from_millis(700),
            }),
        );
        let handler = CallbackHandler {
            reconciliation_usecase: ReconciliationUseCase::new(transaction_repo, Arc::new(settlement))
                .with_deadline(Duration::from_millis(200)),
            status_page_url: "https://app.example.com/payment/status".to_string(),
        };

        Router::new()
            .route("/paylink/callback", get(browser_return).post(gateway_callback))
            .with_state(Arc::new(handler))
            .layer(TimeoutLayer::new(Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn slow_gateway_callback_still_redirects_to_pending() {
        let response = slow_gateway_app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/paylink/callback")
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("orderNumber=SUB-123&orderStatus=Paid"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("https://app.example.com/payment/status?"), "{location}");
        assert!(location.contains("status=pending"), "{location}");
        assert!(location.contains("orderNumber=SUB-123"), "{location}");
    }

    #[tokio::test]
    async fn slow_gateway_browser_return_still_redirects() {
        let response = slow_gateway_app()
            .oneshot(
                Request::builder()
                    .uri("/paylink/callback?orderNumber=SUB-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()["location"].to_str().unwrap();
        assert!(location.contains("status=pending"), "{location}");
    }

    #[test]
    fn escapes_markup_in_form_fields() {
        assert_eq!(
            escape_html(r#"<script>"x"&'y'</script>"#),
            "&lt;script&gt;&quot;x&quot;&amp;&#x27;y&#x27;&lt;/script&gt;"
        );
    }

    #[test]
    fn bounce_form_posts_every_query_field_back() {
        let fields = HashMap::from([
            ("PaRes".to_string(), "eJzN\"><img>".to_string()),
            ("MD".to_string(), "SUB-123".to_string()),
        ]);

        let html = auto_submit_form("/api/v1/payments/paylink/3ds-callback", &fields);

        assert!(html.contains(r#"action="/api/v1/payments/paylink/3ds-callback""#));
        assert!(html.contains(r#"name="MD" value="SUB-123""#));
        assert!(html.contains(r#"name="PaRes" value="eJzN&quot;&gt;&lt;img&gt;""#));
        assert!(!html.contains("<img>"));
    }

    #[test]
    fn only_json_accept_headers_want_json() {
        let mut headers = HeaderMap::new();
        assert!(!wants_json(&headers));

        headers.insert(ACCEPT, "text/html,application/xhtml+xml".parse().unwrap());
        assert!(!wants_json(&headers));

        headers.insert(ACCEPT, "application/json".parse().unwrap());
        assert!(wants_json(&headers));
    }
}
