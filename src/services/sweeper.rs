//! Expiration sweeper: the only automatic recovery path for stuck PENDING
//! state. Uses the same guarded transition as explicit cancellation, so a
//! race against a confirming webhook resolves to exactly one winner.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::services::OrderService;
use crate::store::CoreStore;
use crate::utils::error::AppError;

pub struct ExpirationSweeper {
    store: Arc<dyn CoreStore>,
    orders: OrderService,
    interval: Duration,
    order_ttl: Duration,
}

impl ExpirationSweeper {
    pub fn new(store: Arc<dyn CoreStore>, interval: Duration, order_ttl: Duration) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            store,
            interval,
            order_ttl,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                match self.sweep_once().await {
                    Ok(0) => {}
                    Ok(expired) => info!(expired, "Sweep expired stale orders"),
                    Err(err) => error!(error = %err, "Sweep failed"),
                }
            }
        })
    }

    /// One pass: expire every PENDING order older than the timeout. Orders
    /// that were confirmed or cancelled between the scan and the transition
    /// are observed as already processed and skipped.
    pub async fn sweep_once(&self) -> Result<usize, AppError> {
        let ttl = chrono::Duration::from_std(self.order_ttl)
            .map_err(|e| AppError::InternalServerError(format!("Invalid order TTL: {e}")))?;
        let cutoff = Utc::now() - ttl;

        let mut expired = 0;
        for order_id in self.store.list_expirable_orders(cutoff).await? {
            match self.orders.expire(order_id).await {
                Ok(true) => expired += 1,
                Ok(false) => {
                    debug!(order_id = %order_id, "Order settled concurrently, skipping")
                }
                Err(err) => error!(order_id = %order_id, error = %err, "Failed to expire order"),
            }
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Event, Order, OrderStatus, Payment, PaymentStatus, TicketType,
    };
    use crate::store::memory::MemoryStore;
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    async fn seed_order(
        store: &Arc<MemoryStore>,
        created_at: DateTime<Utc>,
        status: OrderStatus,
    ) -> Order {
        let event = Event {
            id: Uuid::new_v4(),
            host_id: Uuid::new_v4(),
            title: "Conf".to_string(),
            created_at: Utc::now(),
        };
        let event_id = event.id;
        store.seed_event(event).await;
        let tt = TicketType {
            id: Uuid::new_v4(),
            event_id,
            name: "General".to_string(),
            price: dec!(100000),
            total_quantity: 10,
            sold_quantity: 0,
            sale_starts_at: None,
            sale_ends_at: None,
            created_at: Utc::now(),
        };
        let tt_id = tt.id;
        store.seed_ticket_type(tt).await;
        store.reserve_tickets(tt_id, 1, Utc::now()).await.unwrap();

        let order = Order {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            event_id,
            ticket_type_id: tt_id,
            voucher_id: None,
            original_price: dec!(100000),
            discount_amount: dec!(0),
            total_amount: dec!(100000),
            status,
            participant_name: "Ana".to_string(),
            participant_email: "ana@example.com".to_string(),
            participant_phone: "555-0100".to_string(),
            created_at,
        };
        store.insert_order(order.clone()).await.unwrap()
    }

    fn sweeper(store: Arc<MemoryStore>) -> ExpirationSweeper {
        ExpirationSweeper::new(
            store,
            Duration::from_secs(60),
            Duration::from_secs(15 * 60),
        )
    }

    #[tokio::test]
    async fn test_sweep_expires_only_stale_pending_orders() {
        let store = Arc::new(MemoryStore::new());
        let stale = seed_order(
            &store,
            Utc::now() - chrono::Duration::minutes(20),
            OrderStatus::Pending,
        )
        .await;
        let fresh = seed_order(&store, Utc::now(), OrderStatus::Pending).await;

        let expired = sweeper(store.clone()).sweep_once().await.unwrap();
        assert_eq!(expired, 1);

        let stale = store.get_order(stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, OrderStatus::Expired);
        let fresh = store.get_order(fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, OrderStatus::Pending);

        // The stale order's ticket went back into inventory.
        let tt = store
            .get_ticket_type(stale.ticket_type_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tt.sold_quantity, 0);
    }

    #[tokio::test]
    async fn test_sweep_cancels_pending_payment_of_expired_order() {
        let store = Arc::new(MemoryStore::new());
        let order = seed_order(
            &store,
            Utc::now() - chrono::Duration::minutes(20),
            OrderStatus::Pending,
        )
        .await;
        store
            .insert_payment(Payment {
                id: Uuid::new_v4(),
                order_id: order.id,
                order_code: 9001,
                amount: order.total_amount,
                status: PaymentStatus::Pending,
                checkout_url: "https://pay.example.com/9001".to_string(),
                qr_code: None,
                payment_link_id: "pl_9001".to_string(),
                expires_at: Utc::now(),
                created_at: order.created_at,
            })
            .await
            .unwrap();

        sweeper(store.clone()).sweep_once().await.unwrap();

        let payment = store.get_payment_by_order(order.id).await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_sweep_skips_orders_settled_in_between() {
        let store = Arc::new(MemoryStore::new());
        let paid = seed_order(
            &store,
            Utc::now() - chrono::Duration::minutes(20),
            OrderStatus::Paid,
        )
        .await;

        let expired = sweeper(store.clone()).sweep_once().await.unwrap();
        assert_eq!(expired, 0);
        let paid = store.get_order(paid.id).await.unwrap().unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
    }
}
