use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use uuid::Uuid;

use crate::services::orders::CreateOrder;
use crate::services::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

pub async fn create_order(
    State(state): State<AppState>,
    Json(req): Json<CreateOrder>,
) -> Result<Response, AppError> {
    let order = state.orders.create(req).await?;
    Ok(created(order, "Order created"))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = state.orders.get(order_id).await?;
    Ok(success(order, "Order fetched"))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let order = state.orders.cancel(order_id).await?;
    Ok(success(order, "Order cancelled"))
}
