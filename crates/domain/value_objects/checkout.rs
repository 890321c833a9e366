use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    #[serde(default, alias = "plan_id")]
    pub plan_id: Option<Uuid>,
    /// Explicit amount in major units; a number or a numeric string.
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default, alias = "subscription_id")]
    pub subscription_id: Option<Uuid>,
    #[serde(default, alias = "subscription_type")]
    pub subscription_type: Option<String>,
    #[serde(default, alias = "promo_code")]
    pub promo_code: Option<String>,
    #[serde(default, alias = "payment_method")]
    pub payment_method: Option<String>,
    #[serde(default, alias = "customer_name")]
    pub customer_name: Option<String>,
    #[serde(default, alias = "customer_email")]
    pub customer_email: Option<String>,
    #[serde(default, alias = "customer_phone")]
    pub customer_phone: Option<String>,
    #[serde(default, alias = "callback_url")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutResponse {
    pub success: bool,
    pub payment_url: String,
    pub transaction_id: Uuid,
    pub invoice_id: String,
    pub payment_intent_id: Uuid,
    pub order_number: String,
    pub amount: String,
    pub discount: String,
    pub net_amount: String,
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_camel_and_snake_case_fields() {
        let plan_id = Uuid::new_v4();

        let camel: CreateCheckoutRequest = serde_json::from_value(json!({
            "planId": plan_id,
            "amount": "100",
            "promoCode": "SAVE10"
        }))
        .unwrap();
        let snake: CreateCheckoutRequest = serde_json::from_value(json!({
            "plan_id": plan_id,
            "amount": 100,
            "promo_code": "SAVE10"
        }))
        .unwrap();

        assert_eq!(camel.plan_id, Some(plan_id));
        assert_eq!(snake.plan_id, Some(plan_id));
        assert_eq!(camel.promo_code.as_deref(), Some("SAVE10"));
        assert_eq!(snake.promo_code.as_deref(), Some("SAVE10"));
    }

    #[test]
    fn empty_body_deserializes() {
        let request: CreateCheckoutRequest = serde_json::from_value(json!({})).unwrap();
        assert!(request.plan_id.is_none());
        assert!(request.amount.is_none());
    }
}
