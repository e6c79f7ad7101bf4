//! End-to-end flow over the in-memory store: order creation with a voucher,
//! checkout, payment settlement into the host wallet, and payout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use uuid::Uuid;

use gigpass_server::config::{Config, GatewaySettings, StoreBackend};
use gigpass_server::gateway::signature;
use gigpass_server::gateway::types::{
    PaymentLinkData, PaymentLinkRequest, PaymentWebhook, PaymentWebhookData, PayoutOrderRequest,
    PayoutWebhook, PayoutWebhookData, GATEWAY_SUCCESS,
};
use gigpass_server::gateway::{PaymentLinkClient, PayoutClient};
use gigpass_server::models::{
    Event, OrderStatus, Payment, PaymentStatus, PayoutStatus, TicketType, Voucher, VoucherStatus,
};
use gigpass_server::services::orders::CreateOrder;
use gigpass_server::services::AppState;
use gigpass_server::store::memory::MemoryStore;
use gigpass_server::store::CoreStore;
use gigpass_server::utils::error::AppError;

const PAYMENT_SECRET: &str = "payment-secret";
const PAYOUT_SECRET: &str = "payout-secret";

struct FakeLinkClient;

#[async_trait]
impl PaymentLinkClient for FakeLinkClient {
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLinkData, AppError> {
        Ok(PaymentLinkData {
            checkout_url: format!("https://pay.example.com/{}", request.order_code),
            qr_code: Some("data:image/png;base64,AAAA".to_string()),
            payment_link_id: format!("pl_{}", request.order_code),
        })
    }
}

struct FakePayoutClient;

#[async_trait]
impl PayoutClient for FakePayoutClient {
    async fn create_payout(&self, _request: &PayoutOrderRequest) -> Result<(), AppError> {
        Ok(())
    }
}

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        port: 0,
        store_backend: StoreBackend::Memory,
        payment_gateway: GatewaySettings {
            base_url: "https://pay.example.com".to_string(),
            api_key: "key".to_string(),
            checksum_key: PAYMENT_SECRET.to_string(),
        },
        payout_gateway: GatewaySettings {
            base_url: "https://payout.example.com".to_string(),
            api_key: "key".to_string(),
            checksum_key: PAYOUT_SECRET.to_string(),
        },
        gateway_timeout: Duration::from_secs(5),
        checkout_ttl: Duration::from_secs(15 * 60),
        order_ttl: Duration::from_secs(15 * 60),
        sweep_interval: Duration::from_secs(60),
    }
}

struct Fixture {
    store: Arc<MemoryStore>,
    state: AppState,
    host_id: Uuid,
    event_id: Uuid,
    ticket_type_id: Uuid,
}

async fn fixture(total_quantity: i32) -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let host_id = Uuid::new_v4();
    let event = Event {
        id: Uuid::new_v4(),
        host_id,
        title: "Rustconf After Party".to_string(),
        created_at: Utc::now(),
    };
    let event_id = event.id;
    store.seed_event(event).await;

    let tt = TicketType {
        id: Uuid::new_v4(),
        event_id,
        name: "General admission".to_string(),
        price: dec!(100000),
        total_quantity,
        sold_quantity: 0,
        sale_starts_at: None,
        sale_ends_at: None,
        created_at: Utc::now(),
    };
    let ticket_type_id = tt.id;
    store.seed_ticket_type(tt).await;

    store
        .seed_voucher(Voucher {
            id: Uuid::new_v4(),
            code: "EARLYBIRD".to_string(),
            discount_amount: dec!(20000),
            quantity: 1,
            status: VoucherStatus::Active,
            expires_at: Utc::now() + chrono::Duration::days(7),
            created_at: Utc::now(),
        })
        .await;

    let state = AppState::new(
        store.clone(),
        Arc::new(FakeLinkClient),
        Arc::new(FakePayoutClient),
        &test_config(),
    );
    Fixture {
        store,
        state,
        host_id,
        event_id,
        ticket_type_id,
    }
}

fn order_request(fx: &Fixture, voucher_code: Option<&str>) -> CreateOrder {
    CreateOrder {
        customer_id: Uuid::new_v4(),
        event_id: fx.event_id,
        ticket_type_id: fx.ticket_type_id,
        participant_name: "Ana Costa".to_string(),
        participant_email: "ana@example.com".to_string(),
        participant_phone: "555-0100".to_string(),
        voucher_code: voucher_code.map(String::from),
    }
}

fn payment_webhook(payment: &Payment, outcome: &str) -> PaymentWebhook {
    let data = PaymentWebhookData {
        order_code: payment.order_code,
        amount: payment.amount,
        description: format!("Order {}", payment.order_code),
        code: outcome.to_string(),
    };
    let sig = signature::sign(PAYMENT_SECRET, &data.canonical_fields()).unwrap();
    PaymentWebhook {
        code: GATEWAY_SUCCESS.to_string(),
        desc: "success".to_string(),
        data,
        signature: sig,
    }
}

#[tokio::test]
async fn test_order_to_payout_happy_path() {
    let fx = fixture(10).await;

    // Voucher discounts the order: 100000 - 20000.
    let order = fx
        .state
        .orders
        .create(order_request(&fx, Some("EARLYBIRD")))
        .await
        .unwrap();
    assert_eq!(order.total_amount, dec!(80000));
    assert_eq!(order.status, OrderStatus::Pending);

    let payment = fx
        .state
        .payments
        .create_checkout(
            order.id,
            "https://shop.example.com/done".to_string(),
            "https://shop.example.com/cancel".to_string(),
        )
        .await
        .unwrap();
    assert_eq!(payment.amount, dec!(80000));
    assert_eq!(payment.status, PaymentStatus::Pending);

    fx.state
        .payments
        .handle_webhook(payment_webhook(&payment, GATEWAY_SUCCESS))
        .await
        .unwrap();

    let order = fx.state.orders.get(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Paid);

    // The sale settled into the host's wallet.
    let wallet = fx.state.wallets.wallet(fx.host_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(80000));
    assert_eq!(wallet.available_balance, dec!(80000));

    // Withdraw part of it.
    fx.state
        .wallets
        .set_bank_details(fx.host_id, "0123456789".to_string(), "970422".to_string())
        .await
        .unwrap();
    let payout = fx
        .state
        .payouts
        .request_payout(fx.host_id, dec!(50000))
        .await
        .unwrap();
    assert_eq!(payout.status, PayoutStatus::Success);

    let wallet = fx.state.wallets.wallet(fx.host_id).await.unwrap();
    assert_eq!(wallet.balance, dec!(80000));
    assert_eq!(wallet.available_balance, dec!(30000));

    // A late FAILED webhook for the finalized payout must not refund.
    let data = PayoutWebhookData {
        reference_id: payout.order_code,
        status: "FAILED".to_string(),
    };
    let sig = signature::sign(PAYOUT_SECRET, &data.canonical_fields()).unwrap();
    fx.state
        .payouts
        .handle_webhook(PayoutWebhook {
            data,
            signature: sig,
        })
        .await
        .unwrap();
    let wallet = fx.state.wallets.wallet(fx.host_id).await.unwrap();
    assert_eq!(wallet.available_balance, dec!(30000));
}

#[tokio::test]
async fn test_failed_payment_releases_ticket_for_next_customer() {
    let fx = fixture(1).await;

    let order = fx.state.orders.create(order_request(&fx, None)).await.unwrap();
    let payment = fx
        .state
        .payments
        .create_checkout(
            order.id,
            "https://r.example.com".to_string(),
            "https://c.example.com".to_string(),
        )
        .await
        .unwrap();

    // Capacity is exhausted while the first order is pending.
    let err = fx.state.orders.create(order_request(&fx, None)).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    fx.state
        .payments
        .handle_webhook(payment_webhook(&payment, "07"))
        .await
        .unwrap();
    let order = fx.state.orders.get(order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    // The released ticket is sellable again.
    let second = fx.state.orders.create(order_request(&fx, None)).await.unwrap();
    assert_eq!(second.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_cancel_refuses_double_cancel_but_keeps_state() {
    let fx = fixture(3).await;

    let order = fx.state.orders.create(order_request(&fx, None)).await.unwrap();
    let cancelled = fx.state.orders.cancel(order.id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let err = fx.state.orders.cancel(order.id).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let tt = fx
        .store
        .get_ticket_type(fx.ticket_type_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tt.sold_quantity, 0);
}

#[tokio::test]
async fn test_exhausted_voucher_falls_back_to_full_price() {
    let fx = fixture(10).await;

    let first = fx
        .state
        .orders
        .create(order_request(&fx, Some("EARLYBIRD")))
        .await
        .unwrap();
    assert_eq!(first.total_amount, dec!(80000));

    // One use seeded; the second application fails softly.
    let second = fx
        .state
        .orders
        .create(order_request(&fx, Some("EARLYBIRD")))
        .await
        .unwrap();
    assert_eq!(second.total_amount, dec!(100000));
    assert_eq!(second.discount_amount, dec!(0));
}
