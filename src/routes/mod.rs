use axum::http::header::{HeaderName, HeaderValue};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::create_cors_layer;
use crate::handlers;
use crate::services::AppState;

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/orders", post(handlers::orders::create_order))
        .route("/api/orders/:id", get(handlers::orders::get_order))
        .route("/api/orders/:id/cancel", post(handlers::orders::cancel_order))
        .route(
            "/api/orders/:id/checkout",
            post(handlers::payments::request_checkout),
        )
        .route(
            "/api/webhooks/payment",
            post(handlers::payments::payment_webhook),
        )
        .route(
            "/api/webhooks/payout",
            post(handlers::payouts::payout_webhook),
        )
        .route(
            "/api/hosts/:id/payouts",
            post(handlers::payouts::request_payout),
        )
        .route("/api/hosts/:id/wallet", get(handlers::wallets::get_wallet))
        .route(
            "/api/hosts/:id/wallet/bank",
            put(handlers::wallets::set_bank_details),
        )
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
