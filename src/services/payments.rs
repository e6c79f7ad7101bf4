//! Payment gateway adapter: checkout-link creation and idempotent webhook
//! settlement.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::gateway::signature;
use crate::gateway::types::{
    PaymentLinkItem, PaymentLinkRequest, PaymentWebhook, GATEWAY_SUCCESS,
};
use crate::gateway::PaymentLinkClient;
use crate::models::{Order, OrderStatus, Payment, PaymentStatus};
use crate::services::next_order_code;
use crate::store::{CoreStore, SettleOutcome};
use crate::utils::error::AppError;

#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn CoreStore>,
    client: Arc<dyn PaymentLinkClient>,
    checksum_key: String,
    checkout_ttl: Duration,
}

impl PaymentService {
    pub fn new(
        store: Arc<dyn CoreStore>,
        client: Arc<dyn PaymentLinkClient>,
        checksum_key: String,
        checkout_ttl: Duration,
    ) -> Self {
        Self {
            store,
            client,
            checksum_key,
            checkout_ttl,
        }
    }

    /// Build and sign the canonical payment-link request, call the gateway,
    /// and persist the resulting Payment. A gateway failure creates no
    /// Payment row; an existing PENDING link for the order is returned as-is.
    pub async fn create_checkout(
        &self,
        order_id: Uuid,
        return_url: String,
        cancel_url: String,
    ) -> Result<Payment, AppError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Order is {} and cannot be checked out",
                order.status.as_str()
            )));
        }

        if let Some(existing) = self.store.get_payment_by_order(order_id).await? {
            if existing.status == PaymentStatus::Pending {
                return Ok(existing);
            }
            return Err(AppError::Conflict(
                "Order already has a finalized payment".to_string(),
            ));
        }

        let now = Utc::now();
        let order_code = next_order_code(now);
        let expires_at = now
            + chrono::Duration::from_std(self.checkout_ttl).map_err(|e| {
                AppError::InternalServerError(format!("Invalid checkout TTL: {e}"))
            })?;

        let request = self.build_link_request(&order, order_code, return_url, cancel_url, expires_at.timestamp())?;
        let link = self.client.create_payment_link(&request).await?;

        let payment = self
            .store
            .insert_payment(Payment {
                id: Uuid::new_v4(),
                order_id,
                order_code,
                amount: order.total_amount,
                status: PaymentStatus::Pending,
                checkout_url: link.checkout_url,
                qr_code: link.qr_code,
                payment_link_id: link.payment_link_id,
                expires_at,
                created_at: now,
            })
            .await?;
        info!(order_id = %order_id, order_code, "Created checkout link");
        Ok(payment)
    }

    fn build_link_request(
        &self,
        order: &Order,
        order_code: i64,
        return_url: String,
        cancel_url: String,
        expired_at: i64,
    ) -> Result<PaymentLinkRequest, AppError> {
        let description = format!("Order {order_code}");
        let mut request = PaymentLinkRequest {
            order_code,
            amount: order.total_amount,
            description,
            items: vec![PaymentLinkItem {
                name: "Event ticket".to_string(),
                quantity: 1,
                price: order.total_amount,
            }],
            return_url,
            cancel_url,
            expired_at,
            signature: String::new(),
        };
        request.signature = signature::sign(&self.checksum_key, &request.canonical_fields())?;
        Ok(request)
    }

    /// Verify and apply a payment webhook. Signature mismatch changes
    /// nothing; a replayed payload for a terminal payment acknowledges
    /// success without side effects.
    pub async fn handle_webhook(&self, hook: PaymentWebhook) -> Result<(), AppError> {
        signature::verify(
            &self.checksum_key,
            &hook.data.canonical_fields(),
            &hook.signature,
        )?;

        let success = hook.data.code == GATEWAY_SUCCESS;
        match self
            .store
            .settle_payment(hook.data.order_code, success)
            .await?
        {
            SettleOutcome::Applied { payment, order } => {
                info!(
                    order_code = payment.order_code,
                    order_status = order.status.as_str(),
                    payment_status = payment.status.as_str(),
                    "Settled payment webhook"
                );
            }
            SettleOutcome::AlreadyProcessed(payment) => {
                warn!(
                    order_code = payment.order_code,
                    status = payment.status.as_str(),
                    "Payment webhook replayed, already processed"
                );
            }
            SettleOutcome::OrderClosed { payment, order } => {
                // Money was taken for an order that is no longer payable.
                // The payment is closed, nothing was credited; this needs a
                // refund, so the webhook is not acknowledged as success.
                error!(
                    order_code = payment.order_code,
                    order_status = order.status.as_str(),
                    "Payment confirmed for a closed order, refund required"
                );
                return Err(AppError::Conflict(
                    "Payment settled against a closed order".to_string(),
                ));
            }
        }
        Ok(())
    }
}
