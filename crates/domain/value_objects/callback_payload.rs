use std::collections::HashMap;

use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::observability::redaction::redact_json;

/// Which external trigger delivered a callback.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CallbackChannel {
    /// Server-to-server notification.
    Standard,
    /// 3-D Secure authentication leg.
    ThreeDSecure,
    /// The customer's browser coming back from the hosted page.
    BrowserReturn,
}

impl CallbackChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackChannel::Standard => "standard",
            CallbackChannel::ThreeDSecure => "three_d_secure",
            CallbackChannel::BrowserReturn => "browser_return",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierSource {
    BodyField,
    Md,
    Url,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CallbackIdentifier {
    pub value: String,
    pub source: IdentifierSource,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThreeDsOutcome {
    Authenticated,
    Failed,
    Unknown,
}

type IdentifierStrategy = fn(&CallbackPayload) -> Vec<String>;

/// Tried in this order; earlier strategies win when several produce a value.
const IDENTIFIER_STRATEGIES: [(IdentifierSource, IdentifierStrategy); 3] = [
    (IdentifierSource::BodyField, from_body_fields),
    (IdentifierSource::Md, from_md_field),
    (IdentifierSource::Url, from_url),
];

const BODY_IDENTIFIER_KEYS: [&str; 4] = ["transactionNo", "transaction_no", "orderNumber", "order_number"];

const QUERY_IDENTIFIER_KEYS: [&str; 8] = [
    "txn_id",
    "transactionNo",
    "transaction_no",
    "orderNumber",
    "order_number",
    "invoiceId",
    "invoice_id",
    "transactionId",
];

const MD_IDENTIFIER_KEYS: [&str; 7] = [
    "transactionNo",
    "orderNumber",
    "txn_id",
    "transaction_no",
    "order_number",
    "transactionId",
    "id",
];

const STATUS_KEYS: [&str; 5] = ["status", "orderStatus", "paymentStatus", "transactionStatus", "result"];

const ERROR_CODE_KEYS: [&str; 5] = ["errorCode", "error_code", "code", "responseCode", "paymentErrorCode"];

const ROUTE_SEGMENTS: [&str; 4] = ["callback", "3ds-callback", "paylink", "payments"];

/// A gateway callback of unknown shape: the decoded body plus the query string and path
/// it arrived on.
#[derive(Debug, Clone, Default)]
pub struct CallbackPayload {
    fields: Map<String, Value>,
    query: HashMap<String, String>,
    path: String,
}

impl CallbackPayload {
    pub fn parse(
        content_type: Option<&str>,
        body: &[u8],
        query: HashMap<String, String>,
        path: &str,
    ) -> Self {
        let mut fields = parse_body(content_type, body);

        // Some deliveries wrap everything in `data`; lift those keys without
        // overriding top-level ones.
        if let Some(Value::Object(nested)) = fields.get("data").cloned() {
            for (key, value) in nested {
                fields.entry(key).or_insert(value);
            }
        }

        Self {
            fields,
            query,
            path: path.to_string(),
        }
    }

    pub fn from_query(query: HashMap<String, String>, path: &str) -> Self {
        Self::parse(None, &[], query, path)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.query.is_empty()
    }

    /// Body field as text, matching the key case-insensitively.
    pub fn field(&self, key: &str) -> Option<String> {
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .and_then(|(_, value)| value_as_text(value))
    }

    pub fn query_param(&self, key: &str) -> Option<String> {
        self.query
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Body field first, then the query string.
    pub fn any(&self, key: &str) -> Option<String> {
        self.field(key).or_else(|| self.query_param(key))
    }

    /// The highest-priority transaction identifier, if any strategy finds one.
    pub fn primary_identifier(&self) -> Option<CallbackIdentifier> {
        self.identifier_candidates().into_iter().next()
    }

    /// Every identifier the strategies find, in priority order, without duplicates.
    pub fn identifier_candidates(&self) -> Vec<CallbackIdentifier> {
        let mut candidates: Vec<CallbackIdentifier> = Vec::new();
        for (source, strategy) in IDENTIFIER_STRATEGIES {
            for value in strategy(self) {
                if !candidates.iter().any(|existing| existing.value == value) {
                    candidates.push(CallbackIdentifier { value, source });
                }
            }
        }
        candidates
    }

    /// Status string as reported in the callback. Informational only.
    pub fn reported_status(&self) -> Option<String> {
        STATUS_KEYS.iter().find_map(|key| self.any(key))
    }

    pub fn error_code(&self) -> Option<String> {
        ERROR_CODE_KEYS.iter().find_map(|key| self.any(key))
    }

    pub fn pa_res(&self) -> Option<String> {
        self.any("PaRes")
    }

    pub fn md(&self) -> Option<String> {
        self.any("MD")
    }

    pub fn has_three_ds_payload(&self) -> bool {
        self.fields
            .keys()
            .chain(self.query.keys())
            .any(|key| key.eq_ignore_ascii_case("PaRes") || key.eq_ignore_ascii_case("MD"))
    }

    pub fn three_ds_outcome(&self) -> ThreeDsOutcome {
        let explicit = ["authenticationStatus", "threeDSStatus", "3dsStatus", "transStatus"]
            .iter()
            .find_map(|key| self.any(key))
            .or_else(|| self.reported_status());

        if let Some(status) = explicit {
            match status.trim().to_ascii_lowercase().as_str() {
                "y" | "a" | "success" | "successful" | "authenticated" | "paid" | "completed" => {
                    return ThreeDsOutcome::Authenticated;
                }
                "n" | "u" | "r" | "failed" | "failure" | "error" | "declined" | "rejected"
                | "cancelled" | "canceled" => return ThreeDsOutcome::Failed,
                _ => {}
            }
        }

        // A 3DS leg that came back without an authentication response failed.
        if self.has_three_ds_payload() && self.pa_res().is_none() {
            return ThreeDsOutcome::Failed;
        }

        ThreeDsOutcome::Unknown
    }

    /// Body and query merged for audit storage, with card and 3DS secrets replaced.
    pub fn sanitized(&self) -> Value {
        let mut merged = Map::new();
        for (key, value) in &self.query {
            merged.insert(key.clone(), Value::String(value.clone()));
        }
        for (key, value) in &self.fields {
            merged.insert(key.clone(), value.clone());
        }
        let mut merged = Value::Object(merged);
        redact_json(&mut merged);
        merged
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn from_body_fields(payload: &CallbackPayload) -> Vec<String> {
    BODY_IDENTIFIER_KEYS
        .iter()
        .filter_map(|key| payload.field(key))
        .collect()
}

fn from_md_field(payload: &CallbackPayload) -> Vec<String> {
    payload.md().and_then(|md| decode_md(&md)).into_iter().collect()
}

fn from_url(payload: &CallbackPayload) -> Vec<String> {
    let mut values: Vec<String> = QUERY_IDENTIFIER_KEYS
        .iter()
        .filter_map(|key| payload.query_param(key))
        .collect();

    let last_segment = payload
        .path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    if looks_like_identifier(last_segment) && !ROUTE_SEGMENTS.contains(&last_segment) {
        values.push(last_segment.to_string());
    }

    values
}

/// Decodes the opaque 3DS `MD` field. It has been seen as Base64-wrapped JSON,
/// Base64-wrapped text, plain JSON and a bare reference, so each is tried in turn.
pub fn decode_md(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for engine in [&STANDARD, &URL_SAFE] {
        if let Ok(bytes) = engine.decode(trimmed) {
            if let Ok(text) = String::from_utf8(bytes) {
                if let Some(identifier) = identifier_from_text(&text) {
                    return Some(identifier);
                }
            }
        }
    }

    identifier_from_text(trimmed)
}

fn identifier_from_text(text: &str) -> Option<String> {
    let text = text.trim();
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => MD_IDENTIFIER_KEYS.iter().find_map(|key| {
            map.iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(key))
                .and_then(|(_, value)| value_as_text(value))
        }),
        Ok(Value::String(inner)) if looks_like_identifier(&inner) => Some(inner),
        _ if looks_like_identifier(text) => Some(text.to_string()),
        _ => None,
    }
}

fn looks_like_identifier(value: &str) -> bool {
    (3..=128).contains(&value.len())
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        && value.chars().any(|c| c.is_ascii_digit())
}

fn value_as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Body decoding: the declared content type first, then form, JSON and finally a
/// lenient `key=value` split.
pub fn parse_body(content_type: Option<&str>, body: &[u8]) -> Map<String, Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Map::new();
    }

    let declared = content_type
        .map(|value| value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .unwrap_or_default();

    let from_declared = match declared.as_str() {
        "application/json" | "text/json" => parse_json(body),
        "application/x-www-form-urlencoded" => parse_form(body),
        _ => None,
    };

    from_declared
        .or_else(|| parse_form(body))
        .or_else(|| parse_json(body))
        .or_else(|| parse_key_values(body))
        .unwrap_or_default()
}

fn parse_json(body: &[u8]) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn parse_form(body: &[u8]) -> Option<Map<String, Value>> {
    let text = std::str::from_utf8(body).ok()?.trim();
    if text.starts_with('{') || text.starts_with('[') || !text.contains('=') {
        return None;
    }

    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(text).ok()?;
    if pairs.is_empty() || pairs.iter().any(|(key, _)| key.trim().is_empty()) {
        return None;
    }

    Some(
        pairs
            .into_iter()
            .map(|(key, value)| (key.trim().to_string(), Value::String(value)))
            .collect(),
    )
}

fn parse_key_values(body: &[u8]) -> Option<Map<String, Value>> {
    let text = String::from_utf8_lossy(body);
    let map: Map<String, Value> = text
        .split(['&', '\n', ';'])
        .filter_map(|part| {
            let (key, value) = part.split_once('=').or_else(|| part.split_once(':'))?;
            let key = key.trim().trim_matches('"');
            let value = value.trim().trim_matches('"');
            (!key.is_empty()).then(|| (key.to_string(), Value::String(value.to_string())))
        })
        .collect();

    (!map.is_empty()).then_some(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn json_body_with_order_number() {
        let payload = CallbackPayload::parse(
            Some("application/json"),
            br#"{"orderNumber":"SUB-123","status":"paid"}"#,
            HashMap::new(),
            "/api/v1/payments/paylink/callback",
        );

        let identifier = payload.primary_identifier().unwrap();
        assert_eq!(identifier.value, "SUB-123");
        assert_eq!(identifier.source, IdentifierSource::BodyField);
        assert_eq!(payload.reported_status().as_deref(), Some("paid"));
    }

    #[test]
    fn wrong_content_type_falls_back_to_form_then_json() {
        let form = CallbackPayload::parse(
            Some("application/json"),
            b"transactionNo=1712345678&status=Paid",
            HashMap::new(),
            "/",
        );
        assert_eq!(form.field("transactionNo").as_deref(), Some("1712345678"));

        let json = CallbackPayload::parse(
            Some("text/plain"),
            br#"{"transactionNo": 1712345678}"#,
            HashMap::new(),
            "/",
        );
        assert_eq!(json.field("transactionNo").as_deref(), Some("1712345678"));
    }

    #[test]
    fn raw_text_is_split_manually() {
        let body = parse_body(Some("text/plain"), b"orderNumber: SUB-9\nstatus: failed");
        assert_eq!(body.get("orderNumber"), Some(&json!("SUB-9")));
        assert_eq!(body.get("status"), Some(&json!("failed")));
    }

    #[test]
    fn nested_data_is_lifted() {
        let payload = CallbackPayload::parse(
            None,
            br#"{"data":{"transactionNo":"77001"}}"#,
            HashMap::new(),
            "/",
        );
        assert_eq!(payload.primary_identifier().unwrap().value, "77001");
    }

    #[test]
    fn md_variants_decode_to_the_same_reference() {
        let json_md = r#"{"orderNumber":"SUB-123"}"#;
        let base64_json = STANDARD.encode(json_md);
        let base64_text = STANDARD.encode("SUB-123");

        assert_eq!(decode_md(&base64_json).as_deref(), Some("SUB-123"));
        assert_eq!(decode_md(&base64_text).as_deref(), Some("SUB-123"));
        assert_eq!(decode_md(json_md).as_deref(), Some("SUB-123"));
        assert_eq!(decode_md("SUB-123").as_deref(), Some("SUB-123"));
        assert_eq!(decode_md("   "), None);
    }

    #[test]
    fn md_is_used_when_no_explicit_field_exists() {
        let md = STANDARD.encode(r#"{"transactionNo":"99887766"}"#);
        let body = format!("PaRes=eJzVWFmv&MD={}", urlencode(&md));
        let payload = CallbackPayload::parse(
            Some("application/x-www-form-urlencoded"),
            body.as_bytes(),
            HashMap::new(),
            "/api/v1/payments/paylink/3ds-callback",
        );

        let identifier = payload.primary_identifier().unwrap();
        assert_eq!(identifier.value, "99887766");
        assert_eq!(identifier.source, IdentifierSource::Md);
    }

    #[test]
    fn query_and_path_are_the_last_resort() {
        let payload = CallbackPayload::from_query(
            query(&[("txn_id", "SUB-1700000000000-AB12CD")]),
            "/api/v1/payments/paylink/callback",
        );
        let identifier = payload.primary_identifier().unwrap();
        assert_eq!(identifier.value, "SUB-1700000000000-AB12CD");
        assert_eq!(identifier.source, IdentifierSource::Url);

        let by_path = CallbackPayload::from_query(HashMap::new(), "/payments/return/SUB-42");
        assert_eq!(by_path.primary_identifier().unwrap().value, "SUB-42");

        let nothing = CallbackPayload::from_query(HashMap::new(), "/api/v1/payments/paylink/callback");
        assert!(nothing.primary_identifier().is_none());
    }

    #[test]
    fn candidates_keep_priority_order_without_duplicates() {
        let payload = CallbackPayload::parse(
            Some("application/json"),
            br#"{"transactionNo":"5001","orderNumber":"SUB-1"}"#,
            query(&[("orderNumber", "SUB-1"), ("invoiceId", "INV-7")]),
            "/",
        );

        let values: Vec<String> = payload
            .identifier_candidates()
            .into_iter()
            .map(|candidate| candidate.value)
            .collect();
        assert_eq!(values, vec!["5001", "SUB-1", "INV-7"]);
    }

    #[test]
    fn three_ds_outcome_from_status_or_missing_pares() {
        let failed = CallbackPayload::parse(
            None,
            b"MD=SUB-5&status=N",
            HashMap::new(),
            "/",
        );
        assert_eq!(failed.three_ds_outcome(), ThreeDsOutcome::Failed);

        let no_pares = CallbackPayload::parse(None, b"MD=SUB-5", HashMap::new(), "/");
        assert_eq!(no_pares.three_ds_outcome(), ThreeDsOutcome::Failed);

        let ok = CallbackPayload::parse(None, b"MD=SUB-5&PaRes=abc&status=Y", HashMap::new(), "/");
        assert_eq!(ok.three_ds_outcome(), ThreeDsOutcome::Authenticated);
    }

    #[test]
    fn sanitized_snapshot_hides_card_and_3ds_data() {
        let payload = CallbackPayload::parse(
            Some("application/json"),
            br#"{"PaRes":"secret-blob","MD":"abc","cardNumber":"4111","orderNumber":"SUB-1"}"#,
            HashMap::new(),
            "/",
        );

        let snapshot = payload.sanitized();
        assert_eq!(snapshot["PaRes"], json!("[REDACTED]"));
        assert_eq!(snapshot["MD"], json!("[REDACTED]"));
        assert_eq!(snapshot["cardNumber"], json!("[REDACTED]"));
        assert_eq!(snapshot["orderNumber"], json!("SUB-1"));
    }

    fn urlencode(value: &str) -> String {
        serde_urlencoded::to_string([("v", value)])
            .unwrap()
            .trim_start_matches("v=")
            .to_string()
    }
}
