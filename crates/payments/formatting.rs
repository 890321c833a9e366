use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use serde_json::Value;
use tracing::error;
use url::Url;

use crate::domain::value_objects::money::Amount;

/// Query parameter names the gateway may echo our reference back under.
pub const REFERENCE_PARAM_ALIASES: [&str; 3] = ["txn_id", "orderNumber", "transactionNo"];

/// `PREFIX-<unix millis>-<6 random chars>`, e.g. `SUB-1760601234567-K3F9QZ`.
pub fn generate_reference_number(prefix: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>()
        .to_uppercase();

    let prefix = prefix.trim().trim_end_matches('-');
    let prefix = if prefix.is_empty() { "PAY" } else { prefix };

    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), suffix)
}

/// Coerces a loosely typed amount to two decimals. Invalid input becomes 0.00 and is
/// logged rather than raised.
pub fn format_amount(value: &Value) -> Amount {
    match Amount::parse_value(value) {
        Some(amount) => amount,
        None => {
            error!(value = %value, "paylink: invalid amount, defaulting to 0.00");
            Amount::ZERO
        }
    }
}

/// Amount as the gateway expects it on the wire: major units, two decimals.
pub fn amount_to_wire(amount: Amount) -> f64 {
    (amount.as_major() * 100.0).round() / 100.0
}

/// Collapses repeated `/` in the path of an absolute URL, leaving `scheme://` intact.
pub fn collapse_slashes(raw: &str) -> String {
    let (scheme, rest) = match raw.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, raw),
    };

    let mut collapsed = String::with_capacity(rest.len());
    let mut in_query = false;
    let mut previous_slash = false;
    for ch in rest.chars() {
        if ch == '?' || ch == '#' {
            in_query = true;
        }
        if ch == '/' && previous_slash && !in_query {
            continue;
        }
        previous_slash = ch == '/';
        collapsed.push(ch);
    }

    match scheme {
        Some(scheme) => format!("{scheme}://{collapsed}"),
        None => collapsed,
    }
}

/// Appends the reference under every alias in [`REFERENCE_PARAM_ALIASES`], replacing
/// any values already present for those names.
pub fn tag_callback_url(base: &str, reference: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(base)?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !REFERENCE_PARAM_ALIASES.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (key, value) in &kept {
            pairs.append_pair(key, value);
        }
        for alias in REFERENCE_PARAM_ALIASES {
            pairs.append_pair(alias, reference);
        }
    }

    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reference_numbers_are_prefixed_and_distinct() {
        let first = generate_reference_number("SUB");
        let second = generate_reference_number("SUB");

        assert!(first.starts_with("SUB-"));
        assert_eq!(first.split('-').count(), 3);
        assert_ne!(first, second);
        assert!(generate_reference_number("").starts_with("PAY-"));
    }

    #[test]
    fn invalid_amounts_default_to_zero() {
        assert_eq!(format_amount(&json!("abc")), Amount::ZERO);
        assert_eq!(format_amount(&json!(null)), Amount::ZERO);
        assert_eq!(format_amount(&json!("90.5")), Amount::from_minor(9_050));
        assert_eq!(amount_to_wire(Amount::from_minor(9_050)), 90.5);
    }

    #[test]
    fn duplicate_slashes_are_removed_from_path_only() {
        assert_eq!(
            collapse_slashes("https://pay.example.com//invoice///INV-1?next=a//b"),
            "https://pay.example.com/invoice/INV-1?next=a//b"
        );
        assert_eq!(collapse_slashes("https://pay.example.com/ok"), "https://pay.example.com/ok");
    }

    #[test]
    fn callback_url_carries_every_reference_alias() {
        let tagged =
            tag_callback_url("https://app.example.com/callback?lang=ar&txn_id=old", "SUB-1")
                .unwrap();
        let url = Url::parse(&tagged).unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("lang".to_string(), "ar".to_string()),
                ("txn_id".to_string(), "SUB-1".to_string()),
                ("orderNumber".to_string(), "SUB-1".to_string()),
                ("transactionNo".to_string(), "SUB-1".to_string()),
            ]
        );
    }
}
