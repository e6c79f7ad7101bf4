//! Wallet ledger surface for hosts: lazy wallet access and bank details.
//!
//! The balance-mutating operations live in the store as compound atomic
//! units: the payout deduction commits with its PayoutRequest, the
//! compensating refund commits with the payout's FAILURE transition, and the
//! sale credit commits with payment settlement.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::models::HostWallet;
use crate::store::CoreStore;
use crate::utils::error::AppError;

#[derive(Clone)]
pub struct WalletLedger {
    store: Arc<dyn CoreStore>,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn CoreStore>) -> Self {
        Self { store }
    }

    /// Fetch the host's wallet, creating it with zero balances on first use.
    pub async fn wallet(&self, host_id: Uuid) -> Result<HostWallet, AppError> {
        self.store.get_or_create_wallet(host_id).await
    }

    pub async fn set_bank_details(
        &self,
        host_id: Uuid,
        bank_account: String,
        bank_code: String,
    ) -> Result<HostWallet, AppError> {
        if bank_account.trim().is_empty() || bank_code.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Bank account and bank code are required".to_string(),
            ));
        }
        let wallet = self
            .store
            .set_wallet_bank(host_id, bank_account, bank_code)
            .await?;
        info!(host_id = %host_id, "Updated wallet bank details");
        Ok(wallet)
    }
}
