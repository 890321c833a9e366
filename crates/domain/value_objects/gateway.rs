use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::domain::value_objects::money::Amount;

/// Gateway-reported invoice status, normalized from whatever spelling the gateway used.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GatewayStatus {
    Paid,
    Pending,
    Failed,
    Cancelled,
    Expired,
    Unknown,
    /// The lookup itself failed; says nothing about the payment.
    Error,
}

impl GatewayStatus {
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "paid" | "completed" | "complete" | "success" | "successful" | "captured"
            | "approved" => GatewayStatus::Paid,
            "pending" | "processing" | "initiated" | "new" | "created" | "unpaid" => {
                GatewayStatus::Pending
            }
            "failed" | "failure" | "declined" | "rejected" => GatewayStatus::Failed,
            "canceled" | "cancelled" => GatewayStatus::Cancelled,
            "expired" => GatewayStatus::Expired,
            _ => GatewayStatus::Unknown,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            GatewayStatus::Failed | GatewayStatus::Cancelled | GatewayStatus::Expired
        )
    }
}

/// Normalized view of one gateway invoice/transaction lookup.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayInvoice {
    pub status: GatewayStatus,
    pub raw_status: Option<String>,
    pub paid_date: Option<DateTime<Utc>>,
    pub amount: Option<Amount>,
    pub transaction_no: Option<String>,
    pub order_number: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    #[serde(skip)]
    pub raw: Value,
}

impl GatewayInvoice {
    pub fn with_status(status: GatewayStatus) -> Self {
        Self {
            status,
            raw_status: None,
            paid_date: None,
            amount: None,
            transaction_no: None,
            order_number: None,
            error_code: None,
            error_message: None,
            raw: Value::Null,
        }
    }
}

/// Result of a read-only gateway lookup. Lookups never fail outright: an unreachable
/// gateway yields `success = false` with status `Error`.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayLookup {
    pub success: bool,
    pub data: GatewayInvoice,
}

/// What a lookup allows us to conclude about the payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayVerdict {
    Paid { paid_at: DateTime<Utc> },
    Failed { code: Option<String> },
    Undetermined,
}

impl GatewayLookup {
    pub fn found(data: GatewayInvoice) -> Self {
        Self {
            success: true,
            data,
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        let mut data = GatewayInvoice::with_status(GatewayStatus::Error);
        data.error_message = Some(reason.into());
        Self {
            success: false,
            data,
        }
    }

    /// A paid status only counts when the gateway also reports when it was paid.
    pub fn verdict(&self) -> GatewayVerdict {
        if !self.success {
            return GatewayVerdict::Undetermined;
        }

        match (self.data.status, self.data.paid_date) {
            (GatewayStatus::Paid, Some(paid_at)) => GatewayVerdict::Paid { paid_at },
            (status, _) if status.is_failure() => GatewayVerdict::Failed {
                code: self
                    .data
                    .error_code
                    .clone()
                    .or_else(|| self.data.raw_status.clone()),
            },
            _ => GatewayVerdict::Undetermined,
        }
    }
}

/// Everything needed to open a hosted payment page.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub order_number: Option<String>,
    pub amount: Amount,
    pub currency: Option<String>,
    pub client_name: String,
    pub client_email: Option<String>,
    pub client_mobile: Option<String>,
    pub product_title: String,
    pub note: Option<String>,
    pub callback_url: String,
    pub three_ds_callback_url: String,
    pub return_url: String,
}

#[derive(Debug, Clone)]
pub struct CreatedInvoice {
    pub invoice_id: String,
    pub payment_url: String,
    pub transaction_no: Option<String>,
    pub order_number: String,
    pub raw: Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(status: GatewayStatus, paid_date: Option<DateTime<Utc>>) -> GatewayLookup {
        let mut data = GatewayInvoice::with_status(status);
        data.paid_date = paid_date;
        GatewayLookup::found(data)
    }

    #[test]
    fn paid_without_paid_date_is_not_trusted() {
        assert_eq!(
            lookup(GatewayStatus::Paid, None).verdict(),
            GatewayVerdict::Undetermined
        );

        let paid_at = Utc::now();
        assert_eq!(
            lookup(GatewayStatus::Paid, Some(paid_at)).verdict(),
            GatewayVerdict::Paid { paid_at }
        );
    }

    #[test]
    fn failure_statuses_map_to_failed() {
        for status in [
            GatewayStatus::Failed,
            GatewayStatus::Cancelled,
            GatewayStatus::Expired,
        ] {
            assert!(matches!(
                lookup(status, None).verdict(),
                GatewayVerdict::Failed { .. }
            ));
        }
    }

    #[test]
    fn unavailable_gateway_is_never_a_failure() {
        let lookup = GatewayLookup::unavailable("timeout");
        assert!(!lookup.success);
        assert_eq!(lookup.data.status, GatewayStatus::Error);
        assert_eq!(lookup.verdict(), GatewayVerdict::Undetermined);
    }

    #[test]
    fn raw_status_spellings_are_normalized() {
        assert_eq!(GatewayStatus::from_raw("Paid"), GatewayStatus::Paid);
        assert_eq!(GatewayStatus::from_raw("COMPLETED"), GatewayStatus::Paid);
        assert_eq!(GatewayStatus::from_raw("Canceled"), GatewayStatus::Cancelled);
        assert_eq!(GatewayStatus::from_raw("declined"), GatewayStatus::Failed);
        assert_eq!(GatewayStatus::from_raw("on-hold"), GatewayStatus::Unknown);
    }
}
