use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Read-model for an event. Event CRUD lives outside this service; the core
/// only needs existence and the owning host for wallet settlement.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub host_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A priced ticket tier with finite inventory.
///
/// `sold_quantity` is only ever touched by the inventory ledger, which keeps
/// `0 <= sold_quantity <= total_quantity` even under concurrent reservations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub total_quantity: i32,
    pub sold_quantity: i32,
    pub sale_starts_at: Option<DateTime<Utc>>,
    pub sale_ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TicketType {
    pub fn remaining(&self) -> i32 {
        self.total_quantity - self.sold_quantity
    }

    /// Whether the sale window (if any) is open at `now`.
    pub fn sale_open_at(&self, now: DateTime<Utc>) -> bool {
        if let Some(starts) = self.sale_starts_at {
            if now < starts {
                return false;
            }
        }
        if let Some(ends) = self.sale_ends_at {
            if now > ends {
                return false;
            }
        }
        true
    }
}
