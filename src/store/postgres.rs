//! Postgres backend. Contended counters are mutated under `SELECT ... FOR
//! UPDATE` row locks scoped to a single row per call; compound operations
//! (voucher apply, webhook settlement, payout open/finalize) run their
//! transition and ledger effect inside one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::{
    Event, HostWallet, Order, OrderStatus, Payment, PaymentStatus, PayoutRequest, PayoutStatus,
    TicketType, VoucherUsage,
};
use crate::store::{CoreStore, OrderTransition, PayoutOutcome, SettleOutcome};
use crate::utils::error::AppError;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    event_id: Uuid,
    ticket_type_id: Uuid,
    voucher_id: Option<Uuid>,
    original_price: Decimal,
    discount_amount: Decimal,
    total_amount: Decimal,
    status: String,
    participant_name: String,
    participant_email: String,
    participant_phone: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::parse(&row.status).ok_or_else(|| {
            AppError::InternalServerError(format!("Unknown order status '{}'", row.status))
        })?;
        Ok(Order {
            id: row.id,
            customer_id: row.customer_id,
            event_id: row.event_id,
            ticket_type_id: row.ticket_type_id,
            voucher_id: row.voucher_id,
            original_price: row.original_price,
            discount_amount: row.discount_amount,
            total_amount: row.total_amount,
            status,
            participant_name: row.participant_name,
            participant_email: row.participant_email,
            participant_phone: row.participant_phone,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    order_id: Uuid,
    order_code: i64,
    amount: Decimal,
    status: String,
    checkout_url: String,
    qr_code: Option<String>,
    payment_link_id: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status = PaymentStatus::parse(&row.status).ok_or_else(|| {
            AppError::InternalServerError(format!("Unknown payment status '{}'", row.status))
        })?;
        Ok(Payment {
            id: row.id,
            order_id: row.order_id,
            order_code: row.order_code,
            amount: row.amount,
            status,
            checkout_url: row.checkout_url,
            qr_code: row.qr_code,
            payment_link_id: row.payment_link_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VoucherRow {
    id: Uuid,
    discount_amount: Decimal,
    quantity: i32,
    status: String,
    expires_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct PayoutRow {
    id: Uuid,
    host_id: Uuid,
    amount: Decimal,
    bank_account: String,
    bank_code: String,
    order_code: i64,
    status: String,
    requested_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
}

impl TryFrom<PayoutRow> for PayoutRequest {
    type Error = AppError;

    fn try_from(row: PayoutRow) -> Result<Self, Self::Error> {
        let status = PayoutStatus::parse(&row.status).ok_or_else(|| {
            AppError::InternalServerError(format!("Unknown payout status '{}'", row.status))
        })?;
        Ok(PayoutRequest {
            id: row.id,
            host_id: row.host_id,
            amount: row.amount,
            bank_account: row.bank_account,
            bank_code: row.bank_code,
            order_code: row.order_code,
            status,
            requested_at: row.requested_at,
            processed_at: row.processed_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, customer_id, event_id, ticket_type_id, voucher_id, \
     original_price, discount_amount, total_amount, status, participant_name, \
     participant_email, participant_phone, created_at";

const PAYMENT_COLUMNS: &str = "id, order_id, order_code, amount, status, checkout_url, \
     qr_code, payment_link_id, expires_at, created_at";

const TICKET_TYPE_COLUMNS: &str = "id, event_id, name, price, total_quantity, \
     sold_quantity, sale_starts_at, sale_ends_at, created_at";

const WALLET_COLUMNS: &str =
    "id, host_id, balance, available_balance, bank_account, bank_code, created_at";

const PAYOUT_COLUMNS: &str = "id, host_id, amount, bank_account, bank_code, order_code, \
     status, requested_at, processed_at";

async fn release_tickets_tx(
    tx: &mut Transaction<'_, Postgres>,
    ticket_type_id: Uuid,
    qty: i32,
) -> Result<(), AppError> {
    sqlx::query("UPDATE ticket_types SET sold_quantity = GREATEST(sold_quantity - $2, 0) WHERE id = $1")
        .bind(ticket_type_id)
        .bind(qty)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn ensure_wallet_tx(
    tx: &mut Transaction<'_, Postgres>,
    host_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        "INSERT INTO host_wallets (id, host_id, balance, available_balance, created_at) \
         VALUES ($1, $2, 0, 0, $3) ON CONFLICT (host_id) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(host_id)
    .bind(Utc::now())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl CoreStore for PgStore {
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>(
            "SELECT id, host_id, title, created_at FROM events WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }

    async fn get_ticket_type(&self, id: Uuid) -> Result<Option<TicketType>, AppError> {
        let tt = sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tt)
    }

    async fn reserve_tickets(
        &self,
        ticket_type_id: Uuid,
        qty: i32,
        now: DateTime<Utc>,
    ) -> Result<TicketType, AppError> {
        let mut tx = self.pool.begin().await?;
        let tt = sqlx::query_as::<_, TicketType>(&format!(
            "SELECT {TICKET_TYPE_COLUMNS} FROM ticket_types WHERE id = $1 FOR UPDATE"
        ))
        .bind(ticket_type_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;

        if !tt.sale_open_at(now) {
            return Err(AppError::Conflict("Ticket sale window is closed".to_string()));
        }
        if tt.sold_quantity + qty > tt.total_quantity {
            return Err(AppError::Conflict("Insufficient ticket inventory".to_string()));
        }

        sqlx::query("UPDATE ticket_types SET sold_quantity = sold_quantity + $2 WHERE id = $1")
            .bind(ticket_type_id)
            .bind(qty)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(TicketType {
            sold_quantity: tt.sold_quantity + qty,
            ..tt
        })
    }

    async fn release_tickets(&self, ticket_type_id: Uuid, qty: i32) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        release_tickets_tx(&mut tx, ticket_type_id, qty).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn apply_voucher(
        &self,
        code: &str,
        order_id: Uuid,
        original_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<VoucherUsage, AppError> {
        let mut tx = self.pool.begin().await?;
        let voucher = sqlx::query_as::<_, VoucherRow>(
            "SELECT id, discount_amount, quantity, status, expires_at \
             FROM vouchers WHERE code = $1 FOR UPDATE",
        )
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?;

        let voucher = match voucher {
            Some(v) if v.status == "ACTIVE" && now <= v.expires_at => v,
            _ => return Err(AppError::Conflict("Voucher invalid or expired".to_string())),
        };
        if voucher.quantity == 0 {
            return Err(AppError::Conflict("Voucher out of stock".to_string()));
        }

        sqlx::query("UPDATE vouchers SET quantity = quantity - 1 WHERE id = $1")
            .bind(voucher.id)
            .execute(&mut *tx)
            .await?;

        let usage = VoucherUsage {
            id: Uuid::new_v4(),
            voucher_id: voucher.id,
            order_id,
            discount_applied: voucher.discount_amount.min(original_price),
            created_at: now,
        };
        sqlx::query(
            "INSERT INTO voucher_usages (id, voucher_id, order_id, discount_applied, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(usage.id)
        .bind(usage.voucher_id)
        .bind(usage.order_id)
        .bind(usage.discount_applied)
        .bind(usage.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(usage)
    }

    async fn revoke_voucher_usage(&self, order_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let voucher_ids = sqlx::query_scalar::<_, Uuid>(
            "DELETE FROM voucher_usages WHERE order_id = $1 RETURNING voucher_id",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;
        for voucher_id in voucher_ids {
            sqlx::query("UPDATE vouchers SET quantity = quantity + 1 WHERE id = $1")
                .bind(voucher_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn insert_order(&self, order: Order) -> Result<Order, AppError> {
        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(order.id)
        .bind(order.customer_id)
        .bind(order.event_id)
        .bind(order.ticket_type_id)
        .bind(order.voucher_id)
        .bind(order.original_price)
        .bind(order.discount_amount)
        .bind(order.total_amount)
        .bind(order.status.as_str())
        .bind(&order.participant_name)
        .bind(&order.participant_email)
        .bind(&order.participant_phone)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(order)
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Order::try_from).transpose()
    }

    async fn transition_order(
        &self,
        id: Uuid,
        to: OrderStatus,
    ) -> Result<OrderTransition, AppError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
        let mut order = Order::try_from(row)?;

        if order.status != OrderStatus::Pending {
            return Ok(OrderTransition::NotPending(order));
        }

        sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(to.as_str())
            .execute(&mut *tx)
            .await?;

        if matches!(to, OrderStatus::Cancelled | OrderStatus::Expired) {
            release_tickets_tx(&mut tx, order.ticket_type_id, 1).await?;
            sqlx::query(
                "UPDATE payments SET status = 'CANCELLED' WHERE order_id = $1 AND status = 'PENDING'",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        order.status = to;
        Ok(OrderTransition::Applied(order))
    }

    async fn list_expirable_orders(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, AppError> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM orders WHERE status = 'PENDING' AND created_at < $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn insert_payment(&self, payment: Payment) -> Result<Payment, AppError> {
        let mut tx = self.pool.begin().await?;
        // Re-check the order under its lock so a cancel or expiry that ran
        // during the gateway call cannot end up with a live payment.
        let status = sqlx::query_scalar::<_, String>(
            "SELECT status FROM orders WHERE id = $1 FOR UPDATE",
        )
        .bind(payment.order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
        if status != OrderStatus::Pending.as_str() {
            return Err(AppError::Conflict(format!(
                "Order is {status} and cannot accept a payment"
            )));
        }

        sqlx::query(&format!(
            "INSERT INTO payments ({PAYMENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(payment.id)
        .bind(payment.order_id)
        .bind(payment.order_code)
        .bind(payment.amount)
        .bind(payment.status.as_str())
        .bind(&payment.checkout_url)
        .bind(&payment.qr_code)
        .bind(&payment.payment_link_id)
        .bind(payment.expires_at)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn get_payment_by_order(&self, order_id: Uuid) -> Result<Option<Payment>, AppError> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn settle_payment(
        &self,
        order_code: i64,
        success: bool,
    ) -> Result<SettleOutcome, AppError> {
        let mut tx = self.pool.begin().await?;
        // Unlocked peek to find the order; the authoritative read happens
        // below, under the order lock. Locking the order first keeps the
        // lock order aligned with transition_order.
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_code = $1"
        ))
        .bind(order_code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
        let peek = Payment::try_from(row)?;
        if peek.status.is_terminal() {
            return Ok(SettleOutcome::AlreadyProcessed(peek));
        }

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(peek.order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
        let mut order = Order::try_from(row)?;

        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_code = $1 FOR UPDATE"
        ))
        .bind(order_code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Payment not found".to_string()))?;
        let mut payment = Payment::try_from(row)?;
        if payment.status.is_terminal() {
            return Ok(SettleOutcome::AlreadyProcessed(payment));
        }

        // A confirmation for an order that already left PENDING must not
        // credit anyone; the payment is closed out instead.
        let new_status = if success && order.status == OrderStatus::Pending {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Cancelled
        };
        sqlx::query("UPDATE payments SET status = $2 WHERE id = $1")
            .bind(payment.id)
            .bind(new_status.as_str())
            .execute(&mut *tx)
            .await?;
        payment.status = new_status;

        if order.status != OrderStatus::Pending {
            tx.commit().await?;
            return if success {
                Ok(SettleOutcome::OrderClosed { payment, order })
            } else {
                Ok(SettleOutcome::Applied { payment, order })
            };
        }

        if success {
            sqlx::query("UPDATE orders SET status = 'PAID' WHERE id = $1")
                .bind(order.id)
                .execute(&mut *tx)
                .await?;
            order.status = OrderStatus::Paid;

            // Settle the sale into the host's wallet.
            let host_id = sqlx::query_scalar::<_, Uuid>(
                "SELECT host_id FROM events WHERE id = $1",
            )
            .bind(order.event_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
            ensure_wallet_tx(&mut tx, host_id).await?;
            sqlx::query(
                "UPDATE host_wallets SET balance = balance + $2, \
                 available_balance = available_balance + $2 WHERE host_id = $1",
            )
            .bind(host_id)
            .bind(order.total_amount)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query("UPDATE orders SET status = 'CANCELLED' WHERE id = $1")
                .bind(order.id)
                .execute(&mut *tx)
                .await?;
            release_tickets_tx(&mut tx, order.ticket_type_id, 1).await?;
            order.status = OrderStatus::Cancelled;
        }

        tx.commit().await?;
        Ok(SettleOutcome::Applied { payment, order })
    }

    async fn get_or_create_wallet(&self, host_id: Uuid) -> Result<HostWallet, AppError> {
        let mut tx = self.pool.begin().await?;
        ensure_wallet_tx(&mut tx, host_id).await?;
        let wallet = sqlx::query_as::<_, HostWallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM host_wallets WHERE host_id = $1"
        ))
        .bind(host_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(wallet)
    }

    async fn set_wallet_bank(
        &self,
        host_id: Uuid,
        bank_account: String,
        bank_code: String,
    ) -> Result<HostWallet, AppError> {
        let mut tx = self.pool.begin().await?;
        ensure_wallet_tx(&mut tx, host_id).await?;
        let wallet = sqlx::query_as::<_, HostWallet>(&format!(
            "UPDATE host_wallets SET bank_account = $2, bank_code = $3 \
             WHERE host_id = $1 RETURNING {WALLET_COLUMNS}"
        ))
        .bind(host_id)
        .bind(bank_account)
        .bind(bank_code)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(wallet)
    }

    async fn open_payout(
        &self,
        host_id: Uuid,
        amount: Decimal,
        order_code: i64,
        description: String,
        now: DateTime<Utc>,
    ) -> Result<PayoutRequest, AppError> {
        let mut tx = self.pool.begin().await?;
        ensure_wallet_tx(&mut tx, host_id).await?;
        let wallet = sqlx::query_as::<_, HostWallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM host_wallets WHERE host_id = $1 FOR UPDATE"
        ))
        .bind(host_id)
        .fetch_one(&mut *tx)
        .await?;

        let (bank_account, bank_code) = match (wallet.bank_account, wallet.bank_code) {
            (Some(account), Some(code)) => (account, code),
            _ => {
                return Err(AppError::ValidationError(
                    "Wallet has no bank details configured".to_string(),
                ))
            }
        };
        if wallet.available_balance < amount {
            return Err(AppError::Conflict("Insufficient wallet funds".to_string()));
        }

        sqlx::query(
            "UPDATE host_wallets SET available_balance = available_balance - $2 WHERE host_id = $1",
        )
        .bind(host_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO wallet_transactions \
             (id, wallet_id, amount, tx_type, status, reference_id, description, created_at) \
             VALUES ($1, $2, $3, 'PAYOUT', 'PENDING', $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(wallet.id)
        .bind(amount)
        .bind(order_code)
        .bind(&description)
        .bind(now)
        .execute(&mut *tx)
        .await?;

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
        sqlx::query(&format!(
            "INSERT INTO payout_requests ({PAYOUT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(payout.id)
        .bind(payout.host_id)
        .bind(payout.amount)
        .bind(&payout.bank_account)
        .bind(&payout.bank_code)
        .bind(payout.order_code)
        .bind(payout.status.as_str())
        .bind(payout.requested_at)
        .bind(payout.processed_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(payout)
    }

    async fn finalize_payout(
        &self,
        order_code: i64,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<PayoutOutcome, AppError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, PayoutRow>(&format!(
            "SELECT {PAYOUT_COLUMNS} FROM payout_requests WHERE order_code = $1 FOR UPDATE"
        ))
        .bind(order_code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Payout request not found".to_string()))?;
        let mut payout = PayoutRequest::try_from(row)?;

        if payout.status.is_terminal() {
            return Ok(PayoutOutcome::AlreadyProcessed(payout));
        }

        let (payout_status, tx_status) = if success {
            (PayoutStatus::Success, "COMPLETED")
        } else {
            (PayoutStatus::Failure, "FAILED")
        };

        sqlx::query("UPDATE payout_requests SET status = $2, processed_at = $3 WHERE id = $1")
            .bind(payout.id)
            .bind(payout_status.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "UPDATE wallet_transactions SET status = $2 \
             WHERE reference_id = $1 AND status = 'PENDING'",
        )
        .bind(order_code)
        .bind(tx_status)
        .execute(&mut *tx)
        .await?;

        if !success {
            // Compensating refund: the deducted amount goes back to the
            // available balance in the same transaction as the status change.
            sqlx::query(
                "UPDATE host_wallets SET available_balance = available_balance + $2 \
                 WHERE host_id = $1",
            )
            .bind(payout.host_id)
            .bind(payout.amount)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        payout.status = payout_status;
        payout.processed_at = Some(now);
        Ok(PayoutOutcome::Applied(payout))
    }
}
