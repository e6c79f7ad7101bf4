//! Outbound gateway clients. Every call carries a bounded timeout; a timeout
//! or non-2xx response surfaces as `ExternalServiceError` so the caller can
//! run its compensating action.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::gateway::types::{
    PaymentLinkData, PaymentLinkRequest, PaymentLinkResponse, PayoutOrderRequest,
    PayoutOrderResponse, GATEWAY_SUCCESS,
};
use crate::utils::error::AppError;

#[async_trait]
pub trait PaymentLinkClient: Send + Sync {
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLinkData, AppError>;
}

#[async_trait]
pub trait PayoutClient: Send + Sync {
    async fn create_payout(&self, request: &PayoutOrderRequest) -> Result<(), AppError>;
}

fn build_http_client(timeout: Duration) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::InternalServerError(format!("Failed to build HTTP client: {e}")))
}

pub struct HttpPaymentLinkClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentLinkClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl PaymentLinkClient for HttpPaymentLinkClient {
    async fn create_payment_link(
        &self,
        request: &PaymentLinkRequest,
    ) -> Result<PaymentLinkData, AppError> {
        let url = format!(
            "{}/v2/payment-requests",
            self.base_url.trim_end_matches('/')
        );
        debug!(order_code = request.order_code, %url, "Requesting payment link");

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("Payment gateway unreachable: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "Payment gateway returned HTTP {}",
                response.status()
            )));
        }

        let body: PaymentLinkResponse = response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("Malformed payment gateway response: {e}"))
        })?;
        if body.code != GATEWAY_SUCCESS {
            return Err(AppError::ExternalServiceError(format!(
                "Payment gateway rejected request: {}",
                body.desc
            )));
        }
        body.data.ok_or_else(|| {
            AppError::ExternalServiceError("Payment gateway response missing data".to_string())
        })
    }
}

pub struct HttpPayoutClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPayoutClient {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl PayoutClient for HttpPayoutClient {
    async fn create_payout(&self, request: &PayoutOrderRequest) -> Result<(), AppError> {
        let url = format!("{}/v1/payouts", self.base_url.trim_end_matches('/'));
        debug!(reference_id = request.reference_id, %url, "Requesting payout");

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalServiceError(format!("Payout gateway unreachable: {e}"))
            })?;

        if !response.status().is_success() {
            return Err(AppError::ExternalServiceError(format!(
                "Payout gateway returned HTTP {}",
                response.status()
            )));
        }

        let body: PayoutOrderResponse = response.json().await.map_err(|e| {
            AppError::ExternalServiceError(format!("Malformed payout gateway response: {e}"))
        })?;
        if body.code != GATEWAY_SUCCESS {
            return Err(AppError::ExternalServiceError(format!(
                "Payout gateway rejected request: {}",
                body.desc
            )));
        }
        Ok(())
    }
}
