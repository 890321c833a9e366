//! Normalization of Paylink responses. Field names vary between endpoints, API
//! versions and sandbox/production, so every value is looked up through a list of
//! candidate paths and everything downstream sees only the normalized shapes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use crate::domain::value_objects::{
    gateway::{CreatedInvoice, GatewayInvoice, GatewayStatus},
    money::Amount,
};
use crate::payments::formatting::collapse_slashes;

const TOKEN_PATHS: &[&str] = &["id_token", "token", "access_token", "data.id_token", "data.token"];

const INVOICE_ID_PATHS: &[&str] = &[
    "invoiceId",
    "invoice_id",
    "transactionNo",
    "id",
    "data.invoiceId",
    "data.transactionNo",
    "data.id",
    "invoice.id",
];

const PAYMENT_URL_PATHS: &[&str] = &[
    "url",
    "paymentUrl",
    "payment_url",
    "paymentURL",
    "data.url",
    "data.paymentUrl",
    "invoice.url",
    "mobileUrl",
];

const TRANSACTION_NO_PATHS: &[&str] = &["transactionNo", "transaction_no", "data.transactionNo"];

const ORDER_NUMBER_PATHS: &[&str] = &["orderNumber", "order_number", "data.orderNumber"];

const STATUS_PATHS: &[&str] = &[
    "orderStatus",
    "status",
    "paymentStatus",
    "data.orderStatus",
    "data.status",
];

const PAID_DATE_PATHS: &[&str] = &[
    "paidDate",
    "paid_date",
    "paymentDate",
    "paymentReceipt.paymentDate",
    "data.paidDate",
    "data.paymentDate",
    "data.paymentReceipt.paymentDate",
];

const AMOUNT_PATHS: &[&str] = &["amount", "data.amount", "paymentReceipt.amount"];

const ERROR_CODE_PATHS: &[&str] = &[
    "paymentErrors.0.errorCode",
    "paymentErrors.0.code",
    "errorCode",
    "error_code",
    "data.errorCode",
];

const ERROR_MESSAGE_PATHS: &[&str] = &[
    "paymentErrors.0.errorTitle",
    "paymentErrors.0.message",
    "errorMessage",
    "detail",
    "title",
    "message",
];

/// Follows a dotted path; numeric segments index into arrays.
fn at_path<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(body, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    })
}

fn text_at(body: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| match at_path(body, path)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

fn value_at<'a>(body: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths
        .iter()
        .find_map(|path| at_path(body, path).filter(|value| !value.is_null()))
}

pub fn extract_token(body: &Value) -> Option<String> {
    text_at(body, TOKEN_PATHS)
}

/// `None` unless both an invoice id and a payment URL are present.
pub fn extract_created_invoice(body: &Value, order_number: &str) -> Option<CreatedInvoice> {
    let invoice_id = text_at(body, INVOICE_ID_PATHS)?;
    let payment_url = text_at(body, PAYMENT_URL_PATHS)?;

    Some(CreatedInvoice {
        invoice_id,
        payment_url: collapse_slashes(&payment_url),
        transaction_no: text_at(body, TRANSACTION_NO_PATHS),
        order_number: text_at(body, ORDER_NUMBER_PATHS).unwrap_or_else(|| order_number.to_string()),
        raw: body.clone(),
    })
}

pub fn error_message(body: &Value) -> Option<String> {
    text_at(body, ERROR_MESSAGE_PATHS)
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff]` (read as UTC), a bare date, or epoch
/// seconds/milliseconds.
pub fn parse_gateway_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => {
            let raw = number.as_i64()?;
            if raw <= 0 {
                return None;
            }
            if raw > 100_000_000_000 {
                Utc.timestamp_millis_opt(raw).single()
            } else {
                Utc.timestamp_opt(raw, 0).single()
            }
        }
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(parsed.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
                    return Some(parsed.and_utc());
                }
            }
            if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                return date.and_hms_opt(0, 0, 0).map(|parsed| parsed.and_utc());
            }
            if let Ok(raw) = text.parse::<i64>() {
                return parse_gateway_date(&Value::from(raw));
            }
            None
        }
        _ => None,
    }
}

pub fn normalize_invoice(body: &Value) -> GatewayInvoice {
    let raw_status = text_at(body, STATUS_PATHS);
    let status = raw_status
        .as_deref()
        .map(GatewayStatus::from_raw)
        .unwrap_or(GatewayStatus::Unknown);

    GatewayInvoice {
        status,
        raw_status,
        paid_date: value_at(body, PAID_DATE_PATHS).and_then(parse_gateway_date),
        amount: value_at(body, AMOUNT_PATHS).and_then(Amount::parse_value),
        transaction_no: text_at(body, TRANSACTION_NO_PATHS),
        order_number: text_at(body, ORDER_NUMBER_PATHS),
        error_code: text_at(body, ERROR_CODE_PATHS),
        error_message: text_at(body, ERROR_MESSAGE_PATHS),
        raw: body.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_invoice_is_found_in_nested_shape() {
        let body = json!({
            "success": true,
            "data": { "invoiceId": "INV-1", "paymentUrl": "https://pay.example.com//invoice//INV-1" }
        });

        let created = extract_created_invoice(&body, "SUB-1").unwrap();

        assert_eq!(created.invoice_id, "INV-1");
        assert_eq!(created.payment_url, "https://pay.example.com/invoice/INV-1");
        assert_eq!(created.order_number, "SUB-1");
    }

    #[test]
    fn flat_paylink_shape_uses_transaction_no_as_invoice_id() {
        let body = json!({
            "transactionNo": 1712345678,
            "url": "https://paylink.sa/pay/1712345678",
            "orderNumber": "SUB-2"
        });

        let created = extract_created_invoice(&body, "ignored").unwrap();

        assert_eq!(created.invoice_id, "1712345678");
        assert_eq!(created.transaction_no.as_deref(), Some("1712345678"));
        assert_eq!(created.order_number, "SUB-2");
    }

    #[test]
    fn created_invoice_requires_id_and_url() {
        assert!(extract_created_invoice(&json!({ "url": "https://x" }), "SUB").is_none());
        assert!(extract_created_invoice(&json!({ "invoiceId": "1" }), "SUB").is_none());
    }

    #[test]
    fn invoice_status_and_paid_date_are_normalized() {
        let body = json!({
            "orderStatus": "Paid",
            "amount": 90.0,
            "transactionNo": "1712345678",
            "paymentReceipt": { "paymentDate": "2026-10-01 12:30:00" }
        });

        let invoice = normalize_invoice(&body);

        assert_eq!(invoice.status, GatewayStatus::Paid);
        assert_eq!(invoice.raw_status.as_deref(), Some("Paid"));
        assert_eq!(
            invoice.paid_date,
            Some(Utc.with_ymd_and_hms(2026, 10, 1, 12, 30, 0).unwrap())
        );
        assert_eq!(invoice.amount, Some(Amount::from_minor(9_000)));
    }

    #[test]
    fn failed_invoice_carries_first_payment_error() {
        let body = json!({
            "orderStatus": "Declined",
            "paymentErrors": [{ "errorCode": "05", "errorTitle": "Do not honour" }]
        });

        let invoice = normalize_invoice(&body);

        assert_eq!(invoice.status, GatewayStatus::Failed);
        assert_eq!(invoice.error_code.as_deref(), Some("05"));
        assert_eq!(invoice.error_message.as_deref(), Some("Do not honour"));
        assert_eq!(invoice.paid_date, None);
    }

    #[test]
    fn dates_in_several_formats_parse() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 1, 12, 30, 0).unwrap();

        assert_eq!(parse_gateway_date(&json!("2026-10-01T12:30:00Z")), Some(expected));
        assert_eq!(parse_gateway_date(&json!("2026-10-01T15:30:00+03:00")), Some(expected));
        assert_eq!(parse_gateway_date(&json!(expected.timestamp_millis())), Some(expected));
        assert_eq!(parse_gateway_date(&json!(expected.timestamp())), Some(expected));
        assert_eq!(parse_gateway_date(&json!("")), None);
        assert_eq!(parse_gateway_date(&json!("yesterday")), None);
    }
}
