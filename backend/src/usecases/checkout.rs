use std::sync::Arc;

use chrono::{Duration, Utc};
use crates::{
    domain::{
        entities::{
            payment_intents::InsertPaymentIntentEntity,
            payment_transactions::InsertPaymentTransactionEntity, plans::PlanEntity,
            subscriptions::SubscriptionEntity, users::UserProfileEntity,
        },
        repositories::{
            payment_intents::PaymentIntentRepository,
            payment_transactions::PaymentTransactionRepository, plans::PlanRepository,
            promo_codes::PromoCodeRepository, subscriptions::SubscriptionRepository,
            users::UserProfileRepository,
        },
        value_objects::{
            checkout::{CreateCheckoutRequest, CreateCheckoutResponse},
            enums::{
                payment_intent_statuses::PaymentIntentStatus, payment_methods::PaymentMethod,
                subscription_types::SubscriptionType, transaction_statuses::TransactionStatus,
            },
            gateway::NewInvoice,
            money::Amount,
        },
    },
    payments::{
        formatting::{generate_reference_number, tag_callback_url},
        paylink_client::PaylinkError,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::payment_gateway::PaymentGateway;

const REFERENCE_PREFIX: &str = "SUB";
const DEFAULT_CUSTOMER_NAME: &str = "Customer";

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("{0}")]
    Validation(String),
    #[error("payment gateway authentication failed")]
    Authentication,
    #[error("payment gateway is unavailable")]
    GatewayUnavailable,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CheckoutError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            CheckoutError::Validation(_) => StatusCode::BAD_REQUEST,
            CheckoutError::Authentication => StatusCode::BAD_GATEWAY,
            CheckoutError::GatewayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            CheckoutError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn validation(message: impl Into<String>) -> Self {
        CheckoutError::Validation(message.into())
    }
}

impl From<PaylinkError> for CheckoutError {
    fn from(value: PaylinkError) -> Self {
        match value {
            PaylinkError::Authentication(_) => CheckoutError::Authentication,
            PaylinkError::InvoiceCreation(_)
            | PaylinkError::Rejected { .. }
            | PaylinkError::Unavailable(_) => CheckoutError::GatewayUnavailable,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, CheckoutError>;

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub callback_url: String,
    pub three_ds_callback_url: String,
    pub intent_ttl: Duration,
}

#[derive(Debug, Clone, PartialEq)]
struct Pricing {
    amount: Amount,
    discount: Amount,
    net_amount: Amount,
    promo_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Customer {
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

impl Customer {
    fn from_request(request: &CreateCheckoutRequest) -> Self {
        Self {
            name: non_blank(request.customer_name.as_deref()),
            email: non_blank(request.customer_email.as_deref()),
            phone: non_blank(request.customer_phone.as_deref()),
        }
    }

    fn is_complete(&self) -> bool {
        self.name.is_some() && self.email.is_some() && self.phone.is_some()
    }

    /// Fills only the fields still missing.
    fn or_from(self, name: Option<&str>, email: Option<&str>, phone: Option<&str>) -> Self {
        Self {
            name: self.name.or_else(|| non_blank(name)),
            email: self.email.or_else(|| non_blank(email)),
            phone: self.phone.or_else(|| non_blank(phone)),
        }
    }

    fn or_from_subscription(self, subscription: Option<&SubscriptionEntity>) -> Self {
        match subscription {
            Some(subscription) => self.or_from(
                subscription.contact_name.as_deref(),
                subscription.contact_email.as_deref(),
                subscription.contact_phone.as_deref(),
            ),
            None => self,
        }
    }

    fn or_from_profile(self, profile: Option<&UserProfileEntity>) -> Self {
        match profile {
            Some(profile) => self.or_from(
                profile.full_name.as_deref(),
                profile.email.as_deref(),
                profile.phone.as_deref(),
            ),
            None => self,
        }
    }
}

pub struct CheckoutUseCase<P, U, Promo, S, I, T, G>
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserProfileRepository + Send + Sync + 'static,
    Promo: PromoCodeRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: PaymentIntentRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    plan_repo: Arc<P>,
    user_repo: Arc<U>,
    promo_repo: Arc<Promo>,
    subscription_repo: Arc<S>,
    intent_repo: Arc<I>,
    transaction_repo: Arc<T>,
    gateway: Arc<G>,
    settings: CheckoutSettings,
}

impl<P, U, Promo, S, I, T, G> CheckoutUseCase<P, U, Promo, S, I, T, G>
where
    P: PlanRepository + Send + Sync + 'static,
    U: UserProfileRepository + Send + Sync + 'static,
    Promo: PromoCodeRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
    I: PaymentIntentRepository + Send + Sync + 'static,
    T: PaymentTransactionRepository + Send + Sync + 'static,
    G: PaymentGateway + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        plan_repo: Arc<P>,
        user_repo: Arc<U>,
        promo_repo: Arc<Promo>,
        subscription_repo: Arc<S>,
        intent_repo: Arc<I>,
        transaction_repo: Arc<T>,
        gateway: Arc<G>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            plan_repo,
            user_repo,
            promo_repo,
            subscription_repo,
            intent_repo,
            transaction_repo,
            gateway,
            settings,
        }
    }

    /// Opens a hosted payment page for the user. Creates one pending payment intent and
    /// one pending transaction; subscriptions are left alone until the payment settles.
    pub async fn create_checkout(
        &self,
        user_id: Uuid,
        request: CreateCheckoutRequest,
    ) -> UseCaseResult<CreateCheckoutResponse> {
        info!(%user_id, plan_id = ?request.plan_id, "checkout: creating checkout");

        let subscription_type = match non_blank(request.subscription_type.as_deref()) {
            Some(raw) => SubscriptionType::from_str(&raw)
                .ok_or_else(|| CheckoutError::validation(format!("unknown subscription type: {raw}")))?,
            None => SubscriptionType::default(),
        };
        let payment_method = match non_blank(request.payment_method.as_deref()) {
            Some(raw) => PaymentMethod::from_str(&raw)
                .ok_or_else(|| CheckoutError::validation(format!("unknown payment method: {raw}")))?,
            None => PaymentMethod::default(),
        };

        let explicit_amount = match &request.amount {
            Some(value) => {
                let amount = Amount::parse_value(value)
                    .ok_or_else(|| CheckoutError::validation("amount must be numeric"))?;
                if !amount.is_positive() {
                    return Err(CheckoutError::validation("amount must be greater than zero"));
                }
                Some(amount)
            }
            None => None,
        };

        let plan = match request.plan_id {
            Some(plan_id) => self.load_plan(plan_id).await,
            None => None,
        };
        let amount = self.resolve_amount(plan.as_ref(), subscription_type, explicit_amount)?;

        let subscription = match request.subscription_id {
            Some(subscription_id) => self.load_subscription(user_id, subscription_id).await?,
            None => None,
        };

        let pricing = self.price(amount, request.promo_code.as_deref()).await?;
        let customer = self
            .resolve_customer(user_id, &request, subscription.as_ref())
            .await;

        let currency = plan
            .as_ref()
            .map(|plan| plan.currency.clone())
            .unwrap_or_else(|| self.gateway.currency());
        let order_number = generate_reference_number(REFERENCE_PREFIX);
        let now = Utc::now();

        let payment_intent_id = self
            .intent_repo
            .create(InsertPaymentIntentEntity {
                id: Uuid::new_v4(),
                user_id,
                plan_id: plan.as_ref().map(|plan| plan.id),
                subscription_type: subscription_type.as_str().to_string(),
                amount_minor: pricing.amount.minor(),
                discount_minor: pricing.discount.minor(),
                net_amount_minor: pricing.net_amount.minor(),
                currency: currency.clone(),
                promo_code: pricing.promo_code.clone(),
                payment_method: payment_method.as_str().to_string(),
                transaction_reference: Some(order_number.clone()),
                status: PaymentIntentStatus::Pending.as_str().to_string(),
                expires_at: now + self.settings.intent_ttl,
            })
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "checkout: failed to create payment intent");
                CheckoutError::Internal(err)
            })?;
        info!(%user_id, %payment_intent_id, %order_number, "checkout: payment intent created");

        let invoice = NewInvoice {
            order_number: Some(order_number.clone()),
            amount: pricing.net_amount,
            currency: Some(currency.clone()),
            client_name: customer
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_CUSTOMER_NAME.to_string()),
            client_email: customer.email.clone(),
            client_mobile: customer.phone.clone(),
            product_title: plan
                .as_ref()
                .map(|plan| plan.name.clone())
                .unwrap_or_else(|| "Subscription".to_string()),
            note: Some(
                plan.as_ref()
                    .and_then(|plan| plan.description.clone())
                    .unwrap_or_else(|| format!("{subscription_type} subscription")),
            ),
            callback_url: self.tagged_url(&self.settings.callback_url, &order_number)?,
            three_ds_callback_url: self
                .tagged_url(&self.settings.three_ds_callback_url, &order_number)?,
            return_url: self.return_url(request.callback_url.as_deref(), &order_number)?,
        };

        let created = self.gateway.create_invoice(invoice).await.map_err(|err| {
            error!(
                %user_id,
                %payment_intent_id,
                %order_number,
                error = %err,
                "checkout: gateway invoice creation failed"
            );
            CheckoutError::from(err)
        })?;
        info!(
            %payment_intent_id,
            invoice_id = %created.invoice_id,
            order_number = %created.order_number,
            "checkout: invoice created"
        );

        if created.order_number != order_number {
            if let Err(err) = self
                .intent_repo
                .set_transaction_reference(payment_intent_id, &created.order_number)
                .await
            {
                warn!(
                    %payment_intent_id,
                    db_error = ?err,
                    "checkout: failed to store gateway order number on payment intent"
                );
            }
        }

        let transaction_id = self
            .transaction_repo
            .create(InsertPaymentTransactionEntity {
                id: Uuid::new_v4(),
                user_id,
                payment_intent_id: Some(payment_intent_id),
                subscription_id: subscription.as_ref().map(|subscription| subscription.id),
                amount_minor: pricing.net_amount.minor(),
                currency: currency.clone(),
                payment_method: payment_method.as_str().to_string(),
                status: TransactionStatus::Pending.as_str().to_string(),
                order_number: created.order_number.clone(),
                paylink_invoice_id: Some(created.invoice_id.clone()),
                transaction_no: created.transaction_no.clone(),
                paylink_reference: (created.order_number != order_number).then(|| order_number.clone()),
                gateway_response: Some(created.raw.clone()),
            })
            .await
            .map_err(|err| {
                error!(
                    %payment_intent_id,
                    invoice_id = %created.invoice_id,
                    db_error = ?err,
                    "checkout: failed to store transaction"
                );
                CheckoutError::Internal(err)
            })?;
        info!(%transaction_id, %payment_intent_id, "checkout: transaction stored");

        Ok(CreateCheckoutResponse {
            success: true,
            payment_url: created.payment_url,
            transaction_id,
            invoice_id: created.invoice_id,
            payment_intent_id,
            order_number: created.order_number,
            amount: pricing.amount.to_string(),
            discount: pricing.discount.to_string(),
            net_amount: pricing.net_amount.to_string(),
            currency,
        })
    }

    /// Catalog lookups are best effort: a failed read only costs us the catalog price.
    async fn load_plan(&self, plan_id: Uuid) -> Option<PlanEntity> {
        match self.plan_repo.find_by_id(plan_id).await {
            Ok(Some(plan)) if plan.is_active => Some(plan),
            Ok(Some(_)) => {
                warn!(%plan_id, "checkout: plan is inactive");
                None
            }
            Ok(None) => {
                warn!(%plan_id, "checkout: plan not found");
                None
            }
            Err(err) => {
                warn!(%plan_id, db_error = ?err, "checkout: failed to load plan");
                None
            }
        }
    }

    /// The catalog price wins when there is one.
    fn resolve_amount(
        &self,
        plan: Option<&PlanEntity>,
        subscription_type: SubscriptionType,
        explicit_amount: Option<Amount>,
    ) -> UseCaseResult<Amount> {
        let catalog_amount = plan
            .and_then(|plan| plan.price_for(subscription_type))
            .map(Amount::from_minor);

        match (catalog_amount, explicit_amount) {
            (Some(catalog), Some(explicit)) => {
                if catalog != explicit {
                    warn!(
                        catalog_amount = %catalog,
                        requested_amount = %explicit,
                        "checkout: requested amount differs from catalog price, using catalog"
                    );
                }
                Ok(catalog)
            }
            (Some(catalog), None) => Ok(catalog),
            (None, Some(explicit)) => Ok(explicit),
            (None, None) => Err(CheckoutError::validation(
                "amount is required when the plan price cannot be determined",
            )),
        }
    }

    /// A failed read drops the link instead of failing the checkout; settlement then
    /// creates a fresh subscription. Ownership is still enforced on every row we do read.
    async fn load_subscription(
        &self,
        user_id: Uuid,
        subscription_id: Uuid,
    ) -> UseCaseResult<Option<SubscriptionEntity>> {
        let subscription = match self.subscription_repo.find_by_id(subscription_id).await {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(%subscription_id, db_error = ?err, "checkout: failed to load subscription, continuing without it");
                return Ok(None);
            }
        };

        match subscription {
            Some(subscription) if subscription.user_id == user_id => Ok(Some(subscription)),
            Some(_) => {
                warn!(%user_id, %subscription_id, "checkout: subscription belongs to another user");
                Err(CheckoutError::validation("unknown subscription"))
            }
            None => Err(CheckoutError::validation("unknown subscription")),
        }
    }

    async fn price(&self, amount: Amount, promo_code: Option<&str>) -> UseCaseResult<Pricing> {
        let Some(code) = non_blank(promo_code) else {
            return Ok(Pricing {
                amount,
                discount: Amount::ZERO,
                net_amount: amount,
                promo_code: None,
            });
        };

        let promo = self.promo_repo.find_by_code(&code).await.map_err(|err| {
            error!(promo_code = %code, db_error = ?err, "checkout: failed to load promo code");
            CheckoutError::Internal(err)
        })?;

        let now = Utc::now();
        let promo = match promo {
            Some(promo) if promo.is_redeemable(now) => promo,
            _ => {
                info!(promo_code = %code, "checkout: promo code rejected");
                return Err(CheckoutError::validation("promo code is not valid"));
            }
        };

        let discount = Amount::from_minor(promo.discount_for(amount.minor(), now));
        let net_amount = amount.saturating_sub(discount);
        if !net_amount.is_positive() {
            return Err(CheckoutError::validation(
                "amount after discount must be greater than zero",
            ));
        }

        info!(promo_code = %promo.code, %discount, %net_amount, "checkout: promo code applied");
        Ok(Pricing {
            amount,
            discount,
            net_amount,
            promo_code: Some(promo.code),
        })
    }

    /// Request first, then the subscription's contact details, then the profile.
    async fn resolve_customer(
        &self,
        user_id: Uuid,
        request: &CreateCheckoutRequest,
        subscription: Option<&SubscriptionEntity>,
    ) -> Customer {
        let customer = Customer::from_request(request).or_from_subscription(subscription);
        if customer.is_complete() {
            return customer;
        }

        match self.user_repo.find_profile(user_id).await {
            Ok(profile) => customer.or_from_profile(profile.as_ref()),
            Err(err) => {
                warn!(%user_id, db_error = ?err, "checkout: failed to load user profile");
                customer
            }
        }
    }

    fn tagged_url(&self, base: &str, order_number: &str) -> UseCaseResult<String> {
        tag_callback_url(base, order_number).map_err(|err| {
            error!(base_url = %base, error = %err, "checkout: configured callback url is invalid");
            CheckoutError::Internal(anyhow::anyhow!("invalid callback url {base}: {err}"))
        })
    }

    /// The browser return lands on the standard callback unless the caller supplied
    /// its own absolute URL.
    fn return_url(&self, requested: Option<&str>, order_number: &str) -> UseCaseResult<String> {
        match non_blank(requested) {
            Some(requested) => tag_callback_url(&requested, order_number)
                .map_err(|_| CheckoutError::validation("callback url must be an absolute url")),
            None => self.tagged_url(&self.settings.callback_url, order_number),
        }
    }
}
