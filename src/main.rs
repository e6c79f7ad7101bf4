use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use gigpass_server::config::{Config, StoreBackend};
use gigpass_server::gateway::{HttpPaymentLinkClient, HttpPayoutClient};
use gigpass_server::routes::create_routes;
use gigpass_server::services::sweeper::ExpirationSweeper;
use gigpass_server::services::AppState;
use gigpass_server::store::memory::MemoryStore;
use gigpass_server::store::postgres::PgStore;
use gigpass_server::store::CoreStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    let store: Arc<dyn CoreStore> = match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, state will not survive a restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&config.database_url)
                .await
                .expect("Failed to connect to database");

            tracing::info!("Successfully connected to database");

            sqlx::migrate!()
                .run(&pool)
                .await
                .expect("Failed to run migrations");

            tracing::info!("Migrations run successfully");

            Arc::new(PgStore::new(pool))
        }
    };

    let payment_client = Arc::new(
        HttpPaymentLinkClient::new(
            config.payment_gateway.base_url.clone(),
            config.payment_gateway.api_key.clone(),
            config.gateway_timeout,
        )
        .expect("Failed to build payment gateway client"),
    );
    let payout_client = Arc::new(
        HttpPayoutClient::new(
            config.payout_gateway.base_url.clone(),
            config.payout_gateway.api_key.clone(),
            config.gateway_timeout,
        )
        .expect("Failed to build payout gateway client"),
    );

    let state = AppState::new(store.clone(), payment_client, payout_client, &config);

    ExpirationSweeper::new(store, config.sweep_interval, config.order_ttl).spawn();

    let app: Router = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
