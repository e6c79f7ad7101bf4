//! Persistence ports for the order/inventory/settlement core.
//!
//! Every method that touches a contended counter (ticket sold-count, wallet
//! balances) or performs a status transition is a single atomic unit of work:
//! the Postgres backend scopes a row lock per call, the in-memory backend
//! serializes through one mutex. Compound methods exist exactly where the
//! transition and its ledger effect must commit together.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::{
    Event, HostWallet, Order, OrderStatus, Payment, PayoutRequest, TicketType, VoucherUsage,
};
use crate::utils::error::AppError;

/// Outcome of a guarded order transition. The caller decides whether a
/// non-PENDING order is a conflict (explicit cancel) or an idempotent no-op
/// (webhook confirm, sweeper expire).
#[derive(Debug, Clone)]
pub enum OrderTransition {
    Applied(Order),
    NotPending(Order),
}

/// Outcome of applying a payment webhook. `OrderClosed` is the defensive
/// case: a success confirmation arrived for an order that already left
/// PENDING, so the payment is closed out without crediting anyone and the
/// caller must surface it for a refund.
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    Applied { payment: Payment, order: Order },
    AlreadyProcessed(Payment),
    OrderClosed { payment: Payment, order: Order },
}

/// Outcome of finalizing a payout.
#[derive(Debug, Clone)]
pub enum PayoutOutcome {
    Applied(PayoutRequest),
    AlreadyProcessed(PayoutRequest),
}

#[async_trait]
pub trait CoreStore: Send + Sync {
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, AppError>;
    async fn get_ticket_type(&self, id: Uuid) -> Result<Option<TicketType>, AppError>;

    /// Atomically reserve `qty` tickets: checks capacity and the sale window
    /// under a row-scoped lock, then bumps the sold count. `Conflict` leaves
    /// the row untouched.
    async fn reserve_tickets(
        &self,
        ticket_type_id: Uuid,
        qty: i32,
        now: DateTime<Utc>,
    ) -> Result<TicketType, AppError>;

    /// Return previously reserved tickets. Clamped at zero; redundant calls
    /// are safe.
    async fn release_tickets(&self, ticket_type_id: Uuid, qty: i32) -> Result<(), AppError>;

    /// Atomically consume one use of an ACTIVE, unexpired voucher and record
    /// the usage. Decrement and usage row commit together or not at all.
    async fn apply_voucher(
        &self,
        code: &str,
        order_id: Uuid,
        original_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<VoucherUsage, AppError>;

    /// Undo a voucher application whose order never landed: removes the
    /// usage rows for `order_id` and returns the consumed quantity, in one
    /// unit of work. No-op when the order has no usages.
    async fn revoke_voucher_usage(&self, order_id: Uuid) -> Result<(), AppError>;

    async fn insert_order(&self, order: Order) -> Result<Order, AppError>;
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError>;

    /// Check-then-set transition out of PENDING. When `to` is CANCELLED or
    /// EXPIRED the inventory release and the cancellation of any PENDING
    /// payment happen in the same unit of work.
    async fn transition_order(
        &self,
        id: Uuid,
        to: OrderStatus,
    ) -> Result<OrderTransition, AppError>;

    /// Ids of PENDING orders created before `cutoff`, for the sweeper.
    async fn list_expirable_orders(&self, cutoff: DateTime<Utc>)
        -> Result<Vec<Uuid>, AppError>;

    /// Attach a checkout payment to its order. The order's PENDING status is
    /// checked in the same unit of work as the insert, so a cancellation or
    /// expiry landing during the external gateway call cannot leave a live
    /// payment on a closed order; a non-PENDING order is a `Conflict`.
    async fn insert_payment(&self, payment: Payment) -> Result<Payment, AppError>;
    async fn get_payment_by_order(&self, order_id: Uuid) -> Result<Option<Payment>, AppError>;

    /// Apply a verified payment webhook keyed by the external order code.
    /// Terminal payments short-circuit to `AlreadyProcessed`. On success the
    /// order is confirmed and the host wallet credited; on failure the order
    /// is cancelled and its inventory released. Payment update, order
    /// transition and wallet credit commit together. A success confirmation
    /// against an order that already left PENDING closes the payment as
    /// CANCELLED without crediting and reports `OrderClosed`.
    async fn settle_payment(
        &self,
        order_code: i64,
        success: bool,
    ) -> Result<SettleOutcome, AppError>;

    /// Fetch the host's wallet, creating it with zero balances on first
    /// access.
    async fn get_or_create_wallet(&self, host_id: Uuid) -> Result<HostWallet, AppError>;

    async fn set_wallet_bank(
        &self,
        host_id: Uuid,
        bank_account: String,
        bank_code: String,
    ) -> Result<HostWallet, AppError>;

    /// Deduct `amount` from the available balance and open a PENDING payout
    /// with its PENDING wallet transaction, all in one unit of work.
    /// `Conflict` (insufficient funds) persists nothing.
    async fn open_payout(
        &self,
        host_id: Uuid,
        amount: Decimal,
        order_code: i64,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, AppError>;

    /// Finalize a payout exactly once. On failure the deducted amount is
    /// refunded to the available balance in the same unit of work as the
    /// status change.
    async fn finalize_payout(
        &self,
        order_code: i64,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<PayoutOutcome, AppError>;
}
