use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::gateway::types::PaymentWebhook;
use crate::services::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success};

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub return_url: String,
    pub cancel_url: String,
}

pub async fn request_checkout(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<CheckoutRequest>,
) -> Result<Response, AppError> {
    let payment = state
        .payments
        .create_checkout(order_id, req.return_url, req.cancel_url)
        .await?;
    Ok(created(payment, "Checkout link created"))
}

/// Success is acknowledged only after the settlement has been durably applied
/// (or confirmed already applied); the gateway retries on anything else.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(hook): Json<PaymentWebhook>,
) -> Result<Response, AppError> {
    state.payments.handle_webhook(hook).await?;
    Ok(empty_success("Webhook processed"))
}
