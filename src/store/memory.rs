//! In-memory backend. Used for local development without Postgres and by the
//! test suite. A single async mutex over the whole state makes every trait
//! method one atomic unit of work, which is exactly the guarantee the
//! Postgres backend provides with row locks.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    Event, HostWallet, Order, OrderStatus, Payment, PaymentStatus, PayoutRequest, PayoutStatus,
    TicketType, Voucher, VoucherUsage, WalletTransaction, WalletTransactionStatus,
    WalletTransactionType,
};
use crate::store::{CoreStore, OrderTransition, PayoutOutcome, SettleOutcome};
use crate::utils::error::AppError;

#[derive(Default)]
struct MemState {
    events: HashMap<Uuid, Event>,
    ticket_types: HashMap<Uuid, TicketType>,
    vouchers: HashMap<Uuid, Voucher>,
    voucher_usages: Vec<VoucherUsage>,
    orders: HashMap<Uuid, Order>,
    payments: HashMap<Uuid, Payment>,
    wallets: HashMap<Uuid, HostWallet>,
    wallet_transactions: Vec<WalletTransaction>,
    payouts: HashMap<i64, PayoutRequest>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemState>,
    #[cfg(test)]
    fail_next_order_insert: std::sync::atomic::AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_event(&self, event: Event) {
        self.state.lock().await.events.insert(event.id, event);
    }

    pub async fn seed_ticket_type(&self, ticket_type: TicketType) {
        self.state
            .lock()
            .await
            .ticket_types
            .insert(ticket_type.id, ticket_type);
    }

    pub async fn seed_voucher(&self, voucher: Voucher) {
        self.state.lock().await.vouchers.insert(voucher.id, voucher);
    }

    pub async fn voucher_by_code(&self, code: &str) -> Option<Voucher> {
        self.state
            .lock()
            .await
            .vouchers
            .values()
            .find(|v| v.code == code)
            .cloned()
    }

    pub async fn voucher_usages(&self) -> Vec<VoucherUsage> {
        self.state.lock().await.voucher_usages.clone()
    }

    pub async fn wallet_transactions(&self) -> Vec<WalletTransaction> {
        self.state.lock().await.wallet_transactions.clone()
    }

    pub async fn payout_by_code(&self, order_code: i64) -> Option<PayoutRequest> {
        self.state.lock().await.payouts.get(&order_code).cloned()
    }

    /// Credit a host wallet directly, standing in for the payment-settlement
    /// path when a test only exercises the payout side.
    #[cfg(test)]
    pub async fn credit_for_tests(&self, host_id: Uuid, amount: Decimal) {
        let mut state = self.state.lock().await;
        credit_host_wallet(&mut state, host_id, amount, Utc::now());
    }

    /// Make the next `insert_order` fail, for exercising the compensating
    /// paths around order creation.
    #[cfg(test)]
    pub fn fail_next_order_insert(&self) {
        self.fail_next_order_insert
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

fn release_in_state(state: &mut MemState, ticket_type_id: Uuid, qty: i32) {
    if let Some(tt) = state.ticket_types.get_mut(&ticket_type_id) {
        let released = tt.sold_quantity.min(qty);
        if released < qty {
            tracing::warn!(
                ticket_type_id = %ticket_type_id,
                "Release clamped at zero sold count"
            );
        }
        tt.sold_quantity -= released;
    }
}

fn cancel_pending_payment(state: &mut MemState, order_id: Uuid) {
    if let Some(payment) = state
        .payments
        .values_mut()
        .find(|p| p.order_id == order_id && p.status == PaymentStatus::Pending)
    {
        payment.status = PaymentStatus::Cancelled;
    }
}

fn credit_host_wallet(state: &mut MemState, host_id: Uuid, amount: Decimal, now: DateTime<Utc>) {
    let wallet = state
        .wallets
        .entry(host_id)
        .or_insert_with(|| HostWallet::new(host_id, now));
    wallet.balance += amount;
    wallet.available_balance += amount;
}

#[async_trait]
impl CoreStore for MemoryStore {
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        Ok(self.state.lock().await.events.get(&id).cloned())
    }

    async fn get_ticket_type(&self, id: Uuid) -> Result<Option<TicketType>, AppError> {
        Ok(self.state.lock().await.ticket_types.get(&id).cloned())
    }

    async fn reserve_tickets(
        &self,
        ticket_type_id: Uuid,
        qty: i32,
        now: DateTime<Utc>,
    ) -> Result<TicketType, AppError> {
        let mut state = self.state.lock().await;
        let tt = state
            .ticket_types
            .get_mut(&ticket_type_id)
            .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;

        if !tt.sale_open_at(now) {
            return Err(AppError::Conflict("Ticket sale window is closed".to_string()));
        }
        if tt.sold_quantity + qty > tt.total_quantity {
            return Err(AppError::Conflict("Insufficient ticket inventory".to_string()));
        }

        tt.sold_quantity += qty;
        Ok(tt.clone())
    }

    async fn release_tickets(&self, ticket_type_id: Uuid, qty: i32) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        release_in_state(&mut state, ticket_type_id, qty);
        Ok(())
    }

    async fn apply_voucher(
        &self,
        code: &str,
        order_id: Uuid,
        original_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<VoucherUsage, AppError> {
        let mut state = self.state.lock().await;
        let voucher = state
            .vouchers
            .values_mut()
            .find(|v| v.code == code)
            .filter(|v| v.usable_at(now))
            .ok_or_else(|| AppError::Conflict("Voucher invalid or expired".to_string()))?;

        if voucher.quantity == 0 {
            return Err(AppError::Conflict("Voucher out of stock".to_string()));
        }

        voucher.quantity -= 1;
        let usage = VoucherUsage {
            id: Uuid::new_v4(),
            voucher_id: voucher.id,
            order_id,
            discount_applied: voucher.discount_for(original_price),
            created_at: now,
        };
        state.voucher_usages.push(usage.clone());
        Ok(usage)
    }

    async fn revoke_voucher_usage(&self, order_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        let mut revoked = Vec::new();
        state.voucher_usages.retain(|usage| {
            if usage.order_id == order_id {
                revoked.push(usage.voucher_id);
                false
            } else {
                true
            }
        });
        for voucher_id in revoked {
            if let Some(voucher) = state.vouchers.get_mut(&voucher_id) {
                voucher.quantity += 1;
            }
        }
        Ok(())
    }

    async fn insert_order(&self, order: Order) -> Result<Order, AppError> {
        #[cfg(test)]
        if self
            .fail_next_order_insert
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(AppError::InternalServerError(
                "Simulated order insert failure".to_string(),
            ));
        }
        let mut state = self.state.lock().await;
        state.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn transition_order(
        &self,
        id: Uuid,
        to: OrderStatus,
    ) -> Result<OrderTransition, AppError> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        if order.status != OrderStatus::Pending {
            return Ok(OrderTransition::NotPending(order));
        }

        if matches!(to, OrderStatus::Cancelled | OrderStatus::Expired) {
            release_in_state(&mut state, order.ticket_type_id, 1);
            cancel_pending_payment(&mut state, id);
        }

        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| AppError::InternalServerError("Order vanished mid-transition".to_string()))?;
        order.status = to;
        Ok(OrderTransition::Applied(order.clone()))
    }

    async fn list_expirable_orders(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::Pending && o.created_at < cutoff)
            .map(|o| o.id)
            .collect())
    }

    async fn insert_payment(&self, payment: Payment) -> Result<Payment, AppError> {
        let mut state = self.state.lock().await;
        let order = state
            .orders
            .get(&payment.order_id)
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Order is {} and cannot accept a payment",
                order.status.as_str()
            )));
        }
        state.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn get_payment_by_order(&self, order_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self
            .state
            .lock()
            .await
            .payments
            .values()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn settle_payment(
        &self,
        order_code: i64,
        success: bool,
    ) -> Result<SettleOutcome, AppError> {
        let mut state = self.state.lock().await;
        let payment = state
            .payments
            .values()
            .find(|p| p.order_code == order_code)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;

        if payment.status.is_terminal() {
            return Ok(SettleOutcome::AlreadyProcessed(payment));
        }

        let mut order = state
            .orders
            .get(&payment.order_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        // A confirmation for an order that already left PENDING must not
        // credit anyone; the payment is closed out instead.
        let new_status = if success && order.status == OrderStatus::Pending {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Cancelled
        };
        let payment = {
            let p = state.payments.get_mut(&payment.id).ok_or_else(|| {
                AppError::InternalServerError("Payment vanished mid-settlement".to_string())
            })?;
            p.status = new_status;
            p.clone()
        };

        if order.status != OrderStatus::Pending {
            return if success {
                Ok(SettleOutcome::OrderClosed { payment, order })
            } else {
                Ok(SettleOutcome::Applied { payment, order })
            };
        }

        if success {
            let host_id = state
                .events
                .get(&order.event_id)
                .map(|e| e.host_id)
                .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
            credit_host_wallet(&mut state, host_id, order.total_amount, Utc::now());
            order.status = OrderStatus::Paid;
        } else {
            release_in_state(&mut state, order.ticket_type_id, 1);
            order.status = OrderStatus::Cancelled;
        }
        state.orders.insert(order.id, order.clone());

        Ok(SettleOutcome::Applied { payment, order })
    }

    async fn get_or_create_wallet(&self, host_id: Uuid) -> Result<HostWallet, AppError> {
        let mut state = self.state.lock().await;
        Ok(state
            .wallets
            .entry(host_id)
            .or_insert_with(|| HostWallet::new(host_id, Utc::now()))
            .clone())
    }

    async fn set_wallet_bank(
        &self,
        host_id: Uuid,
        bank_account: String,
        bank_code: String,
    ) -> Result<HostWallet, AppError> {
        let mut state = self.state.lock().await;
        let wallet = state
            .wallets
            .entry(host_id)
            .or_insert_with(|| HostWallet::new(host_id, Utc::now()));
        wallet.bank_account = Some(bank_account);
        wallet.bank_code = Some(bank_code);
        Ok(wallet.clone())
    }

    async fn open_payout(
        &self,
        host_id: Uuid,
        amount: Decimal,
        order_code: i64,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, AppError> {
        let mut state = self.state.lock().await;
        let wallet = state
            .wallets
            .entry(host_id)
            .or_insert_with(|| HostWallet::new(host_id, now));

        let (bank_account, bank_code) = match (&wallet.bank_account, &wallet.bank_code) {
            (Some(account), Some(code)) => (account.clone(), code.clone()),
            _ => {
                return Err(AppError::ValidationError(
                    "Wallet has no bank details configured".to_string(),
                ))
            }
        };
        if wallet.available_balance < amount {
            return Err(AppError::Conflict("Insufficient wallet funds".to_string()));
        }

        wallet.available_balance -= amount;
        let wallet_id = wallet.id;

        state.wallet_transactions.push(WalletTransaction {
            id: Uuid::new_v4(),
            wallet_id,
            amount,
            tx_type: WalletTransactionType::Payout,
            status: WalletTransactionStatus::Pending,
            reference_id: order_code,
            description,
            created_at: now,
        });

        let payout = PayoutRequest {
            id: Uuid::new_v4(),
            host_id,
            amount,
            bank_account,
            bank_code,
            order_code,
            status: PayoutStatus::Pending,
            requested_at: now,
            processed_at: None,
        };
        state.payouts.insert(order_code, payout.clone());
        Ok(payout)
    }

    async fn finalize_payout(
        &self,
        order_code: i64,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<PayoutOutcome, AppError> {
        let mut state = self.state.lock().await;
        let payout = state
            .payouts
            .get(&order_code)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Payout request not found".to_string()))?;

        if payout.status.is_terminal() {
            return Ok(PayoutOutcome::AlreadyProcessed(payout));
        }

        let tx_status = if success {
            WalletTransactionStatus::Completed
        } else {
            WalletTransactionStatus::Failed
        };
        if let Some(tx) = state
            .wallet_transactions
            .iter_mut()
            .find(|t| t.reference_id == order_code && t.status == WalletTransactionStatus::Pending)
        {
            tx.status = tx_status;
        }

        if !success {
            if let Some(wallet) = state.wallets.get_mut(&payout.host_id) {
                wallet.available_balance += payout.amount;
            }
        }

        let payout = state.payouts.get_mut(&order_code).ok_or_else(|| {
            AppError::InternalServerError("Payout vanished mid-finalization".to_string())
        })?;
        payout.status = if success {
            PayoutStatus::Success
        } else {
            PayoutStatus::Failure
        };
        payout.processed_at = Some(now);
        Ok(PayoutOutcome::Applied(payout.clone()))
    }
}
