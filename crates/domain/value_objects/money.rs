use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Money in minor units (halalas for SAR). Gateway payloads carry major units with
/// two decimals, so conversion happens only at that boundary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_minor(minor: i64) -> Self {
        Self(minor)
    }

    /// Rounds to the nearest minor unit. Non-finite input is rejected.
    pub fn from_major(major: f64) -> Option<Self> {
        if !major.is_finite() {
            return None;
        }
        let minor = (major * 100.0).round();
        if minor.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Self(minor as i64))
    }

    /// Accepts a JSON number or a numeric string such as `"100"` or `" 99.5 "`.
    pub fn parse_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_f64().and_then(Self::from_major),
            Value::String(raw) => raw.trim().parse::<f64>().ok().and_then(Self::from_major),
            _ => None,
        }
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn as_major(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn saturating_sub(&self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0).max(0))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.as_major())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_numbers_and_numeric_strings() {
        assert_eq!(Amount::parse_value(&json!(100)), Some(Amount::from_minor(10_000)));
        assert_eq!(Amount::parse_value(&json!("99.999")), Some(Amount::from_minor(10_000)));
        assert_eq!(Amount::parse_value(&json!(" 12.3 ")), Some(Amount::from_minor(1_230)));
        assert_eq!(Amount::parse_value(&json!("abc")), None);
        assert_eq!(Amount::parse_value(&json!(null)), None);
    }

    #[test]
    fn displays_two_decimals() {
        assert_eq!(Amount::from_minor(9_000).to_string(), "90.00");
        assert_eq!(Amount::from_minor(5).to_string(), "0.05");
    }

    #[test]
    fn subtraction_floors_at_zero() {
        let amount = Amount::from_minor(500);
        assert_eq!(amount.saturating_sub(Amount::from_minor(800)), Amount::ZERO);
    }
}
