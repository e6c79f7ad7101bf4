pub mod inventory;
pub mod orders;
pub mod payments;
pub mod payouts;
pub mod sweeper;
pub mod voucher;
pub mod wallet;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::Config;
use crate::gateway::{PaymentLinkClient, PayoutClient};
use crate::store::CoreStore;

pub use inventory::InventoryLedger;
pub use orders::OrderService;
pub use payments::PaymentService;
pub use payouts::PayoutService;
pub use sweeper::ExpirationSweeper;
pub use voucher::VoucherLedger;
pub use wallet::WalletLedger;

static ORDER_CODE_SEQ: AtomicI64 = AtomicI64::new(0);

/// Unique numeric reference for the external gateways: millisecond timestamp
/// widened with a rotating process-local sequence so codes minted in the same
/// millisecond stay distinct.
pub fn next_order_code(now: DateTime<Utc>) -> i64 {
    let seq = ORDER_CODE_SEQ.fetch_add(1, Ordering::Relaxed) % 1000;
    now.timestamp_millis() * 1000 + seq
}

/// Shared handler state: one instance of each core service.
#[derive(Clone)]
pub struct AppState {
    pub orders: OrderService,
    pub payments: PaymentService,
    pub payouts: PayoutService,
    pub wallets: WalletLedger,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CoreStore>,
        payment_client: Arc<dyn PaymentLinkClient>,
        payout_client: Arc<dyn PayoutClient>,
        config: &Config,
    ) -> Self {
        Self {
            orders: OrderService::new(store.clone()),
            payments: PaymentService::new(
                store.clone(),
                payment_client,
                config.payment_gateway.checksum_key.clone(),
                config.checkout_ttl,
            ),
            payouts: PayoutService::new(
                store.clone(),
                payout_client,
                config.payout_gateway.checksum_key.clone(),
            ),
            wallets: WalletLedger::new(store),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_codes_are_unique_within_a_millisecond() {
        let now = Utc::now();
        let codes: Vec<i64> = (0..100).map(|_| next_order_code(now)).collect();
        let mut deduped = codes.clone();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), codes.len());
    }
}
