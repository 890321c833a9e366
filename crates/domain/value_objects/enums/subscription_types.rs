use std::fmt::Display;

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// Billing interval of a subscription.
#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionType {
    Weekly,
    #[default]
    Monthly,
    Yearly,
}

impl SubscriptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionType::Weekly => "weekly",
            SubscriptionType::Monthly => "monthly",
            SubscriptionType::Yearly => "yearly",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weekly" | "week" => Some(SubscriptionType::Weekly),
            "monthly" | "month" => Some(SubscriptionType::Monthly),
            "yearly" | "year" | "annual" | "annually" => Some(SubscriptionType::Yearly),
            _ => None,
        }
    }

    /// End of one interval starting at `starts_at`. Month arithmetic clamps to the
    /// last day of shorter months (Jan 31 + 1 month = Feb 28/29).
    pub fn period_end(&self, starts_at: DateTime<Utc>) -> DateTime<Utc> {
        let end = match self {
            SubscriptionType::Weekly => starts_at.checked_add_signed(Duration::weeks(1)),
            SubscriptionType::Monthly => starts_at.checked_add_months(Months::new(1)),
            SubscriptionType::Yearly => starts_at.checked_add_months(Months::new(12)),
        };
        end.unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl Display for SubscriptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn periods_add_one_interval() {
        let start = Utc.with_ymd_and_hms(2026, 1, 31, 10, 0, 0).unwrap();

        assert_eq!(
            SubscriptionType::Weekly.period_end(start),
            Utc.with_ymd_and_hms(2026, 2, 7, 10, 0, 0).unwrap()
        );
        assert_eq!(
            SubscriptionType::Monthly.period_end(start),
            Utc.with_ymd_and_hms(2026, 2, 28, 10, 0, 0).unwrap()
        );
        assert_eq!(
            SubscriptionType::Yearly.period_end(start),
            Utc.with_ymd_and_hms(2027, 1, 31, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn parses_loose_interval_names() {
        assert_eq!(SubscriptionType::from_str("Annual"), Some(SubscriptionType::Yearly));
        assert_eq!(SubscriptionType::from_str(" week "), Some(SubscriptionType::Weekly));
        assert_eq!(SubscriptionType::from_str("daily"), None);
    }
}
