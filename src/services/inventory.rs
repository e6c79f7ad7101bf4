//! Inventory ledger: the only writer of a ticket type's sold count.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::TicketType;
use crate::store::CoreStore;
use crate::utils::error::AppError;

#[derive(Clone)]
pub struct InventoryLedger {
    store: Arc<dyn CoreStore>,
}

impl InventoryLedger {
    pub fn new(store: Arc<dyn CoreStore>) -> Self {
        Self { store }
    }

    /// Atomically reserve `qty` tickets. `Conflict` (sold out or sale window
    /// closed) leaves the sold count untouched.
    pub async fn reserve(&self, ticket_type_id: Uuid, qty: i32) -> Result<TicketType, AppError> {
        if qty <= 0 {
            return Err(AppError::ValidationError(
                "Reservation quantity must be positive".to_string(),
            ));
        }
        let tt = self
            .store
            .reserve_tickets(ticket_type_id, qty, Utc::now())
            .await?;
        info!(
            ticket_type_id = %ticket_type_id,
            qty,
            sold = tt.sold_quantity,
            total = tt.total_quantity,
            "Reserved tickets"
        );
        Ok(tt)
    }

    /// Return previously reserved tickets. Clamped at zero, safe to call
    /// redundantly.
    pub async fn release(&self, ticket_type_id: Uuid, qty: i32) -> Result<(), AppError> {
        self.store.release_tickets(ticket_type_id, qty).await?;
        debug!(ticket_type_id = %ticket_type_id, qty, "Released tickets");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketType;
    use crate::store::memory::MemoryStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn ticket_type(total: i32) -> TicketType {
        TicketType {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            name: "General".to_string(),
            price: dec!(100000),
            total_quantity: total,
            sold_quantity: 0,
            sale_starts_at: None,
            sale_ends_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_concurrent_reserves_never_oversell() {
        let store = Arc::new(MemoryStore::new());
        let tt = ticket_type(5);
        let tt_id = tt.id;
        store.seed_ticket_type(tt).await;
        let ledger = InventoryLedger::new(store.clone());

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move { ledger.reserve(tt_id, 1).await }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 5);

        let tt = store.get_ticket_type(tt_id).await.unwrap().unwrap();
        assert_eq!(tt.sold_quantity, 5);
    }

    #[tokio::test]
    async fn test_reserve_outside_sale_window_conflicts() {
        let store = Arc::new(MemoryStore::new());
        let mut tt = ticket_type(10);
        tt.sale_ends_at = Some(Utc::now() - Duration::hours(1));
        let tt_id = tt.id;
        store.seed_ticket_type(tt).await;
        let ledger = InventoryLedger::new(store.clone());

        let err = ledger.reserve(tt_id, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let tt = store.get_ticket_type(tt_id).await.unwrap().unwrap();
        assert_eq!(tt.sold_quantity, 0);
    }

    #[tokio::test]
    async fn test_reserve_rejects_non_positive_qty() {
        let store = Arc::new(MemoryStore::new());
        let ledger = InventoryLedger::new(store);
        let err = ledger.reserve(Uuid::new_v4(), 0).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
