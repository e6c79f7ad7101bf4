use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherStatus {
    Active,
    Disabled,
}

impl VoucherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherStatus::Active => "ACTIVE",
            VoucherStatus::Disabled => "DISABLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(VoucherStatus::Active),
            "DISABLED" => Some(VoucherStatus::Disabled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voucher {
    pub id: Uuid,
    pub code: String,
    pub discount_amount: Decimal,
    /// Remaining uses. Never negative.
    pub quantity: i32,
    pub status: VoucherStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Voucher {
    pub fn usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == VoucherStatus::Active && now <= self.expires_at
    }

    /// The discount is capped at the order's original price so the total can
    /// never go negative.
    pub fn discount_for(&self, original_price: Decimal) -> Decimal {
        self.discount_amount.min(original_price)
    }
}

/// Immutable audit record: one row per successful voucher application.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct VoucherUsage {
    pub id: Uuid,
    pub voucher_id: Uuid,
    pub order_id: Uuid,
    pub discount_applied: Decimal,
    pub created_at: DateTime<Utc>,
}
