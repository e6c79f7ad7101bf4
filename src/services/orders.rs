//! Order state machine: PENDING -> PAID | CANCELLED | EXPIRED, composing the
//! inventory and voucher ledgers.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::{Order, OrderStatus};
use crate::services::{InventoryLedger, VoucherLedger};
use crate::store::{CoreStore, OrderTransition};
use crate::utils::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub customer_id: Uuid,
    pub event_id: Uuid,
    pub ticket_type_id: Uuid,
    pub participant_name: String,
    pub participant_email: String,
    pub participant_phone: String,
    pub voucher_code: Option<String>,
}

impl CreateOrder {
    fn validate(&self) -> Result<(), AppError> {
        if self.participant_name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Participant name is required".to_string(),
            ));
        }
        if !self.participant_email.contains('@') {
            return Err(AppError::ValidationError(
                "Participant email is invalid".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn CoreStore>,
    inventory: InventoryLedger,
    vouchers: VoucherLedger,
}

impl OrderService {
    pub fn new(store: Arc<dyn CoreStore>) -> Self {
        Self {
            inventory: InventoryLedger::new(store.clone()),
            vouchers: VoucherLedger::new(store.clone()),
            store,
        }
    }

    pub async fn get(&self, order_id: Uuid) -> Result<Order, AppError> {
        self.store
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
    }

    /// Create a PENDING order: validate, reserve one ticket, then apply the
    /// voucher if one was supplied. Voucher failure is best-effort only; the
    /// order proceeds without a discount and keeps its reservation.
    pub async fn create(&self, req: CreateOrder) -> Result<Order, AppError> {
        req.validate()?;

        let event = self
            .store
            .get_event(req.event_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        let ticket_type = self
            .store
            .get_ticket_type(req.ticket_type_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;
        if ticket_type.event_id != event.id {
            return Err(AppError::ValidationError(
                "Ticket type does not belong to the event".to_string(),
            ));
        }

        self.inventory.reserve(ticket_type.id, 1).await?;

        let order_id = Uuid::new_v4();
        let original_price = ticket_type.price;
        let (voucher_id, discount_amount) = match &req.voucher_code {
            Some(code) => match self.vouchers.apply(code, order_id, original_price).await {
                Ok(usage) => (Some(usage.voucher_id), usage.discount_applied),
                Err(err) => {
                    // A promotional discount never blocks the sale.
                    warn!(
                        order_id = %order_id,
                        voucher_code = %code,
                        error = %err,
                        "Voucher application failed, creating order without discount"
                    );
                    (None, Decimal::ZERO)
                }
            },
            None => (None, Decimal::ZERO),
        };

        let order = Order {
            id: order_id,
            customer_id: req.customer_id,
            event_id: event.id,
            ticket_type_id: ticket_type.id,
            voucher_id,
            original_price,
            discount_amount,
            total_amount: (original_price - discount_amount).max(Decimal::ZERO),
            status: OrderStatus::Pending,
            participant_name: req.participant_name,
            participant_email: req.participant_email,
            participant_phone: req.participant_phone,
            created_at: Utc::now(),
        };

        match self.store.insert_order(order).await {
            Ok(order) => {
                info!(order_id = %order.id, total = %order.total_amount, "Created order");
                Ok(order)
            }
            Err(err) => {
                // Neither the reservation nor a consumed voucher use may
                // leak if the order row never landed.
                if let Err(release_err) = self.inventory.release(ticket_type.id, 1).await {
                    error!(
                        ticket_type_id = %ticket_type.id,
                        error = %release_err,
                        "Failed to release reservation after order insert failure"
                    );
                }
                if voucher_id.is_some() {
                    if let Err(revoke_err) = self.vouchers.revoke(order_id).await {
                        error!(
                            order_id = %order_id,
                            error = %revoke_err,
                            "Failed to revoke voucher usage after order insert failure"
                        );
                    }
                }
                Err(err)
            }
        }
    }

    /// Explicit cancellation. Only PENDING orders can be cancelled; the
    /// transition and the inventory release commit together.
    pub async fn cancel(&self, order_id: Uuid) -> Result<Order, AppError> {
        match self
            .store
            .transition_order(order_id, OrderStatus::Cancelled)
            .await?
        {
            OrderTransition::Applied(order) => {
                info!(order_id = %order.id, "Cancelled order");
                Ok(order)
            }
            OrderTransition::NotPending(order) => Err(AppError::Conflict(format!(
                "Order is {} and cannot be cancelled",
                order.status.as_str()
            ))),
        }
    }

    /// Mark a PENDING order PAID. Inventory was reserved at creation and is
    /// not touched. Repeat calls land on a non-PENDING order and no-op.
    /// This is the direct confirmation path (operator tooling, manual
    /// reconciliation); gateway webhooks settle through the store's compound
    /// settlement so the wallet credit commits with the transition.
    pub async fn confirm(&self, order_id: Uuid) -> Result<Order, AppError> {
        match self
            .store
            .transition_order(order_id, OrderStatus::Paid)
            .await?
        {
            OrderTransition::Applied(order) => {
                info!(order_id = %order.id, "Confirmed order as paid");
                Ok(order)
            }
            OrderTransition::NotPending(order) => {
                warn!(
                    order_id = %order.id,
                    status = order.status.as_str(),
                    "Confirm on non-pending order, already processed"
                );
                Ok(order)
            }
        }
    }

    /// Sweeper-driven expiry: same effect as cancel but marks EXPIRED.
    /// Returns whether this call performed the transition.
    pub async fn expire(&self, order_id: Uuid) -> Result<bool, AppError> {
        match self
            .store
            .transition_order(order_id, OrderStatus::Expired)
            .await?
        {
            OrderTransition::Applied(order) => {
                info!(order_id = %order.id, "Expired order");
                Ok(true)
            }
            OrderTransition::NotPending(_) => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, TicketType, Voucher, VoucherStatus};
    use crate::store::memory::MemoryStore;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    async fn seeded_store() -> (Arc<MemoryStore>, Uuid, Uuid) {
        let store = Arc::new(MemoryStore::new());
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
            total_quantity: 1,
            sold_quantity: 0,
            sale_starts_at: None,
            sale_ends_at: None,
            created_at: Utc::now(),
        };
        let tt_id = tt.id;
        store.seed_ticket_type(tt).await;
        (store, event_id, tt_id)
    }

    fn request(event_id: Uuid, ticket_type_id: Uuid, voucher: Option<&str>) -> CreateOrder {
        CreateOrder {
            customer_id: Uuid::new_v4(),
            event_id,
            ticket_type_id,
            participant_name: "Ana".to_string(),
            participant_email: "ana@example.com".to_string(),
            participant_phone: "555-0100".to_string(),
            voucher_code: voucher.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_create_with_voucher_scenario() {
        let (store, event_id, tt_id) = seeded_store().await;
        store
            .seed_voucher(Voucher {
                id: Uuid::new_v4(),
                code: "SAVE20".to_string(),
                discount_amount: dec!(20000),
                quantity: 1,
                status: VoucherStatus::Active,
                expires_at: Utc::now() + Duration::days(1),
                created_at: Utc::now(),
            })
            .await;
        let service = OrderService::new(store.clone());

        let order = service
            .create(request(event_id, tt_id, Some("SAVE20")))
            .await
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.total_amount, dec!(80000));
        assert_eq!(
            store.get_ticket_type(tt_id).await.unwrap().unwrap().sold_quantity,
            1
        );
        assert_eq!(store.voucher_by_code("SAVE20").await.unwrap().quantity, 0);

        // Inventory exhausted: the next create conflicts.
        let err = service
            .create(request(event_id, tt_id, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_voucher_failure_is_non_fatal() {
        let (store, event_id, tt_id) = seeded_store().await;
        let service = OrderService::new(store.clone());

        let order = service
            .create(request(event_id, tt_id, Some("MISSING")))
            .await
            .unwrap();
        assert_eq!(order.discount_amount, dec!(0));
        assert_eq!(order.total_amount, dec!(100000));
        // The reservation stands even though the voucher failed.
        assert_eq!(
            store.get_ticket_type(tt_id).await.unwrap().unwrap().sold_quantity,
            1
        );
    }

    #[tokio::test]
    async fn test_insert_failure_rolls_back_voucher_and_reservation() {
        let (store, event_id, tt_id) = seeded_store().await;
        store
            .seed_voucher(Voucher {
                id: Uuid::new_v4(),
                code: "SAVE20".to_string(),
                discount_amount: dec!(20000),
                quantity: 1,
                status: VoucherStatus::Active,
                expires_at: Utc::now() + Duration::days(1),
                created_at: Utc::now(),
            })
            .await;
        let service = OrderService::new(store.clone());

        store.fail_next_order_insert();
        let err = service
            .create(request(event_id, tt_id, Some("SAVE20")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InternalServerError(_)));

        // Both compensations ran: the ticket and the voucher use came back.
        assert_eq!(
            store.get_ticket_type(tt_id).await.unwrap().unwrap().sold_quantity,
            0
        );
        assert_eq!(store.voucher_by_code("SAVE20").await.unwrap().quantity, 1);
        assert!(store.voucher_usages().await.is_empty());

        // The next attempt goes through at the discounted price.
        let order = service
            .create(request(event_id, tt_id, Some("SAVE20")))
            .await
            .unwrap();
        assert_eq!(order.total_amount, dec!(80000));
    }

    #[tokio::test]
    async fn test_cancel_releases_inventory_once() {
        let (store, event_id, tt_id) = seeded_store().await;
        let service = OrderService::new(store.clone());
        let order = service.create(request(event_id, tt_id, None)).await.unwrap();

        let cancelled = service.cancel(order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(
            store.get_ticket_type(tt_id).await.unwrap().unwrap().sold_quantity,
            0
        );

        // A second cancel is a conflict, not a second release.
        let err = service.cancel(order.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(
            store.get_ticket_type(tt_id).await.unwrap().unwrap().sold_quantity,
            0
        );
    }

    #[tokio::test]
    async fn test_confirm_is_idempotent() {
        let (store, event_id, tt_id) = seeded_store().await;
        let service = OrderService::new(store.clone());
        let order = service.create(request(event_id, tt_id, None)).await.unwrap();

        let confirmed = service.confirm(order.id).await.unwrap();
        assert_eq!(confirmed.status, OrderStatus::Paid);
        let again = service.confirm(order.id).await.unwrap();
        assert_eq!(again.status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_expire_skips_non_pending() {
        let (store, event_id, tt_id) = seeded_store().await;
        let service = OrderService::new(store.clone());
        let order = service.create(request(event_id, tt_id, None)).await.unwrap();

        service.confirm(order.id).await.unwrap();
        assert!(!service.expire(order.id).await.unwrap());
        // Paid order keeps its ticket.
        assert_eq!(
            store.get_ticket_type(tt_id).await.unwrap().unwrap().sold_quantity,
            1
        );
    }

    #[tokio::test]
    async fn test_create_rejects_mismatched_ticket_type() {
        let (store, event_id, _tt_id) = seeded_store().await;
        let other_tt = TicketType {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            name: "Other".to_string(),
            price: dec!(1),
            total_quantity: 1,
            sold_quantity: 0,
            sale_starts_at: None,
            sale_ends_at: None,
            created_at: Utc::now(),
        };
        let other_id = other_tt.id;
        store.seed_ticket_type(other_tt).await;
        let service = OrderService::new(store);

        let err = service
            .create(request(event_id, other_id, None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
