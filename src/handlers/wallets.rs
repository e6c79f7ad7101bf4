use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::services::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Debug, Deserialize)]
pub struct BankDetailsBody {
    pub bank_account: String,
    pub bank_code: String,
}

pub async fn get_wallet(
    State(state): State<AppState>,
    Path(host_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let wallet = state.wallets.wallet(host_id).await?;
    Ok(success(wallet, "Wallet fetched"))
}

pub async fn set_bank_details(
    State(state): State<AppState>,
    Path(host_id): Path<Uuid>,
    Json(req): Json<BankDetailsBody>,
) -> Result<Response, AppError> {
    let wallet = state
        .wallets
        .set_bank_details(host_id, req.bank_account, req.bank_code)
        .await?;
    Ok(success(wallet, "Bank details updated"))
}
