//! Wire shapes exchanged with the payment and payout gateways.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::gateway::signature::amount_field;

/// Outcome code the gateway uses for success, in both API responses and
/// webhook payloads.
pub const GATEWAY_SUCCESS: &str = "00";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkItem {
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
}

/// "Create payment link" request. `signature` covers the canonical fields
/// {amount, cancelUrl, description, orderCode, returnUrl}.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkRequest {
    pub order_code: i64,
    pub amount: Decimal,
    pub description: String,
    pub items: Vec<PaymentLinkItem>,
    pub return_url: String,
    pub cancel_url: String,
    /// Absolute expiry as a unix timestamp.
    pub expired_at: i64,
    pub signature: String,
}

impl PaymentLinkRequest {
    pub fn canonical_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("amount", amount_field(self.amount)),
            ("cancelUrl", self.cancel_url.clone()),
            ("description", self.description.clone()),
            ("orderCode", self.order_code.to_string()),
            ("returnUrl", self.return_url.clone()),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkData {
    pub checkout_url: String,
    pub qr_code: Option<String>,
    pub payment_link_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLinkResponse {
    pub code: String,
    pub desc: String,
    pub data: Option<PaymentLinkData>,
}

/// Payment confirmation webhook. `signature` covers the canonical fields of
/// `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhook {
    pub code: String,
    pub desc: String,
    pub data: PaymentWebhookData,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhookData {
    pub order_code: i64,
    pub amount: Decimal,
    pub description: String,
    /// Outcome code; [`GATEWAY_SUCCESS`] means the payment went through.
    pub code: String,
}

impl PaymentWebhookData {
    pub fn canonical_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("amount", amount_field(self.amount)),
            ("code", self.code.clone()),
            ("description", self.description.clone()),
            ("orderCode", self.order_code.to_string()),
        ]
    }
}

/// "Create payout" request sent to the payout gateway.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutOrderRequest {
    pub reference_id: i64,
    pub amount: Decimal,
    pub to_bin: String,
    pub to_account_number: String,
    pub description: String,
    pub signature: String,
}

impl PayoutOrderRequest {
    pub fn canonical_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("amount", amount_field(self.amount)),
            ("description", self.description.clone()),
            ("referenceId", self.reference_id.to_string()),
            ("toAccountNumber", self.to_account_number.clone()),
            ("toBin", self.to_bin.clone()),
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutOrderResponse {
    pub code: String,
    pub desc: String,
}

/// Payout confirmation webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutWebhook {
    pub data: PayoutWebhookData,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutWebhookData {
    pub reference_id: i64,
    /// "SUCCESS" or "FAILED".
    pub status: String,
}

impl PayoutWebhookData {
    pub fn canonical_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("referenceId", self.reference_id.to_string()),
            ("status", self.status.clone()),
        ]
    }

    pub fn is_success(&self) -> bool {
        self.status == "SUCCESS"
    }
}
