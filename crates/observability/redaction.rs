use serde_json::Value;

/// Field-name fragments whose values never leave the process. Covers credentials,
/// bearer tokens, webhook URLs and the card / 3-D Secure material a payment
/// callback can carry.
const SENSITIVE_FRAGMENTS: &[&str] = &[
    "secret",
    "password",
    "token",
    "authorization",
    "webhook",
    "pares",
    "card",
    "cvv",
    "cvc",
];

pub const REDACTED: &str = "[REDACTED]";

pub fn is_sensitive_key(field_name: &str) -> bool {
    let field = field_name.to_ascii_lowercase();
    matches!(field.as_str(), "md" | "pan") || SENSITIVE_FRAGMENTS.iter().any(|fragment| field.contains(fragment))
}

pub fn redact(field_name: &str, value: String) -> String {
    if is_sensitive_key(field_name) {
        return REDACTED.to_string();
    }
    value
}

/// Blanks every sensitive key in a JSON document, at any depth.
pub fn redact_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, value) in map.iter_mut() {
                if is_sensitive_key(key) {
                    *value = Value::String(REDACTED.to_string());
                } else {
                    redact_json(value);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_json),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_secrets_are_redacted() {
        for key in ["PaRes", "MD", "cardNumber", "cvv", "pan", "paylink_secret_key", "auth_token"] {
            assert_eq!(redact(key, "value".to_string()), REDACTED, "{key}");
        }
    }

    #[test]
    fn nested_json_secrets_are_redacted() {
        let mut body = serde_json::json!({
            "orderNumber": "SUB-1",
            "data": { "id_token": "abc", "items": [{ "cardNumber": "4111" }] }
        });

        redact_json(&mut body);

        assert_eq!(body["orderNumber"], "SUB-1");
        assert_eq!(body["data"]["id_token"], REDACTED);
        assert_eq!(body["data"]["items"][0]["cardNumber"], REDACTED);
    }

    #[test]
    fn identifiers_pass_through() {
        for key in ["order_number", "transaction_id", "invoice_id", "status", "company"] {
            assert_eq!(redact(key, "value".to_string()), "value", "{key}");
        }
    }
}
