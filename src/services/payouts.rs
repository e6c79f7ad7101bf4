//! Payout state machine: PENDING -> SUCCESS | FAILURE, composing the wallet
//! ledger with the external payout call as a saga. The deduction commits with
//! the PayoutRequest; the external call runs outside that transaction; a
//! failed call triggers one explicit compensating transaction (refund +
//! FAILURE) instead of any implicit rollback.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::gateway::signature;
use crate::gateway::types::{PayoutOrderRequest, PayoutWebhook};
use crate::gateway::PayoutClient;
use crate::models::PayoutRequest;
use crate::services::next_order_code;
use crate::store::{CoreStore, PayoutOutcome};
use crate::utils::error::AppError;

#[derive(Clone)]
pub struct PayoutService {
    store: Arc<dyn CoreStore>,
    client: Arc<dyn PayoutClient>,
    checksum_key: String,
}

impl PayoutService {
    pub fn new(
        store: Arc<dyn CoreStore>,
        client: Arc<dyn PayoutClient>,
        checksum_key: String,
    ) -> Self {
        Self {
            store,
            client,
            checksum_key,
        }
    }

    pub async fn request_payout(
        &self,
        host_id: Uuid,
        amount: Decimal,
    ) -> Result<PayoutRequest, AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::ValidationError(
                "Payout amount must be positive".to_string(),
            ));
        }
        let wallet = self.store.get_or_create_wallet(host_id).await?;
        if !wallet.has_bank_details() {
            return Err(AppError::ValidationError(
                "Wallet has no bank details configured".to_string(),
            ));
        }

        let now = Utc::now();
        let order_code = next_order_code(now);
        let description = format!("Payout {order_code}");

        // Deduction + PENDING payout commit together; insufficient funds
        // fails fast with nothing persisted.
        let payout = self
            .store
            .open_payout(host_id, amount, order_code, description.clone(), now)
            .await?;
        info!(host_id = %host_id, order_code, %amount, "Opened payout");

        let mut request = PayoutOrderRequest {
            reference_id: order_code,
            amount,
            to_bin: payout.bank_code.clone(),
            to_account_number: payout.bank_account.clone(),
            description,
            signature: String::new(),
        };
        request.signature = signature::sign(&self.checksum_key, &request.canonical_fields())?;

        match self.client.create_payout(&request).await {
            Ok(()) => self.finalize(order_code, true).await,
            Err(err) => {
                warn!(order_code, error = %err, "Payout call failed, refunding");
                // Compensate first, then report the failure upward.
                self.finalize(order_code, false).await?;
                Err(err)
            }
        }
    }

    /// Verify and apply a payout webhook; terminal requests no-op.
    pub async fn handle_webhook(&self, hook: PayoutWebhook) -> Result<(), AppError> {
        signature::verify(
            &self.checksum_key,
            &hook.data.canonical_fields(),
            &hook.signature,
        )?;
        self.finalize(hook.data.reference_id, hook.data.is_success())
            .await?;
        Ok(())
    }

    async fn finalize(&self, order_code: i64, success: bool) -> Result<PayoutRequest, AppError> {
        match self
            .store
            .finalize_payout(order_code, success, Utc::now())
            .await
        {
            Ok(PayoutOutcome::Applied(payout)) => {
                info!(
                    order_code,
                    status = payout.status.as_str(),
                    "Finalized payout"
                );
                Ok(payout)
            }
            Ok(PayoutOutcome::AlreadyProcessed(payout)) => {
                warn!(
                    order_code,
                    status = payout.status.as_str(),
                    "Payout already finalized, ignoring"
                );
                Ok(payout)
            }
            Err(err) => {
                // Funds stay PENDING for the webhook or operator followup.
                error!(order_code, error = %err, "Failed to finalize payout");
                Err(err)
            }
        }
    }
}
