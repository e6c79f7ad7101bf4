//! Voucher ledger: atomic apply with capped discount computation.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::models::VoucherUsage;
use crate::store::CoreStore;
use crate::utils::error::AppError;

#[derive(Clone)]
pub struct VoucherLedger {
    store: Arc<dyn CoreStore>,
}

impl VoucherLedger {
    pub fn new(store: Arc<dyn CoreStore>) -> Self {
        Self { store }
    }

    /// Consume one use of the voucher and record the usage, in one unit of
    /// work. The applied discount is `min(voucher.discount_amount,
    /// original_price)` so the order total never goes negative.
    pub async fn apply(
        &self,
        code: &str,
        order_id: Uuid,
        original_price: Decimal,
    ) -> Result<VoucherUsage, AppError> {
        let usage = self
            .store
            .apply_voucher(code, order_id, original_price, Utc::now())
            .await?;
        info!(
            voucher_id = %usage.voucher_id,
            order_id = %order_id,
            discount = %usage.discount_applied,
            "Applied voucher"
        );
        Ok(usage)
    }

    /// Reverse an application whose order never landed: the usage record is
    /// removed and the consumed quantity goes back.
    pub async fn revoke(&self, order_id: Uuid) -> Result<(), AppError> {
        self.store.revoke_voucher_usage(order_id).await?;
        info!(order_id = %order_id, "Revoked voucher usage");
        Ok(())
    }
}
