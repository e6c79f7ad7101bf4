use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A host's funds. `balance` is lifetime earnings; `available_balance` is the
/// part not tied up in an in-flight payout, so `available_balance <= balance`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HostWallet {
    pub id: Uuid,
    pub host_id: Uuid,
    pub balance: Decimal,
    pub available_balance: Decimal,
    pub bank_account: Option<String>,
    pub bank_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HostWallet {
    pub fn new(host_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            host_id,
            balance: Decimal::ZERO,
            available_balance: Decimal::ZERO,
            bank_account: None,
            bank_code: None,
            created_at: now,
        }
    }

    pub fn has_bank_details(&self) -> bool {
        self.bank_account.is_some() && self.bank_code.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletTransactionType {
    Payout,
}

impl WalletTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletTransactionType::Payout => "PAYOUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PAYOUT" => Some(WalletTransactionType::Payout),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletTransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl WalletTransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletTransactionStatus::Pending => "PENDING",
            WalletTransactionStatus::Completed => "COMPLETED",
            WalletTransactionStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(WalletTransactionStatus::Pending),
            "COMPLETED" => Some(WalletTransactionStatus::Completed),
            "FAILED" => Some(WalletTransactionStatus::Failed),
            _ => None,
        }
    }
}

/// Append-only audit trail of wallet movements. Status moves
/// PENDING -> COMPLETED or PENDING -> FAILED exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub wallet_id: Uuid,
    pub amount: Decimal,
    pub tx_type: WalletTransactionType,
    pub status: WalletTransactionStatus,
    /// External payout order code this movement belongs to.
    pub reference_id: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
