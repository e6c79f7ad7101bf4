use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Pending,
    Success,
    Failure,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Pending => "PENDING",
            PayoutStatus::Success => "SUCCESS",
            PayoutStatus::Failure => "FAILURE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PayoutStatus::Pending),
            "SUCCESS" => Some(PayoutStatus::Success),
            "FAILURE" => Some(PayoutStatus::Failure),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PayoutStatus::Pending)
    }
}

/// A withdrawal of host funds to an external bank account. Finalized exactly
/// once, by either the synchronous gateway result or a webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: Uuid,
    pub host_id: Uuid,
    pub amount: Decimal,
    pub bank_account: String,
    pub bank_code: String,
    /// Unique reference echoed back by the payout gateway.
    pub order_code: i64,
    pub status: PayoutStatus,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
