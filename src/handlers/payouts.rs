use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::gateway::types::PayoutWebhook;
use crate::services::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success};

#[derive(Debug, Deserialize)]
pub struct PayoutRequestBody {
    pub amount: Decimal,
}

pub async fn request_payout(
    State(state): State<AppState>,
    Path(host_id): Path<Uuid>,
    Json(req): Json<PayoutRequestBody>,
) -> Result<Response, AppError> {
    let payout = state.payouts.request_payout(host_id, req.amount).await?;
    Ok(created(payout, "Payout processed"))
}

pub async fn payout_webhook(
    State(state): State<AppState>,
    Json(hook): Json<PayoutWebhook>,
) -> Result<Response, AppError> {
    state.payouts.handle_webhook(hook).await?;
    Ok(empty_success("Webhook processed"))
}
