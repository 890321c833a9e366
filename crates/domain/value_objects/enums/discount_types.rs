use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "percentage" | "percent" => Some(DiscountType::Percentage),
            "fixed" | "amount" => Some(DiscountType::Fixed),
            _ => None,
        }
    }
}
