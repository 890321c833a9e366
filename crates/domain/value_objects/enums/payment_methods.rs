use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    Mada,
    ApplePay,
    StcPay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Mada => "mada",
            PaymentMethod::ApplePay => "apple_pay",
            PaymentMethod::StcPay => "stc_pay",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "card" | "visa" | "mastercard" | "credit_card" => Some(PaymentMethod::Card),
            "mada" => Some(PaymentMethod::Mada),
            "apple_pay" | "applepay" => Some(PaymentMethod::ApplePay),
            "stc_pay" | "stcpay" => Some(PaymentMethod::StcPay),
            _ => None,
        }
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
