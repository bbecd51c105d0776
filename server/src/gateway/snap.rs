//! Client for the Midtrans Snap API.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::GatewayConfig;
use crate::gateway::{GatewayError, PaymentGateway, SessionRequest};

#[derive(Serialize)]
struct SnapRequest<'a> {
    transaction_details: TransactionDetails,
    credit_card: CreditCard,
    customer_details: CustomerDetails<'a>,
}

#[derive(Serialize)]
struct TransactionDetails {
    order_id: String,
    gross_amount: i64,
}

#[derive(Serialize)]
struct CreditCard {
    secure: bool,
}

#[derive(Serialize)]
struct CustomerDetails<'a> {
    first_name: &'a str,
    email: &'a str,
}

#[derive(Deserialize)]
struct SnapResponse {
    token: String,
}

pub struct SnapGateway {
    client: Client,
    base_url: String,
    server_key: String,
    timeout: Duration,
}

impl SnapGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            server_key: config.server_key.clone(),
            timeout: config.timeout,
        })
    }

    fn body<'a>(request: &'a SessionRequest) -> SnapRequest<'a> {
        SnapRequest {
            transaction_details: TransactionDetails {
                order_id: request.order_id.to_string(),
                gross_amount: request.amount,
            },
            credit_card: CreditCard { secure: true },
            customer_details: CustomerDetails {
                first_name: &request.customer_name,
                email: &request.customer_email,
            },
        }
    }
}

#[async_trait]
impl PaymentGateway for SnapGateway {
    #[instrument(skip(self, request), fields(order_id = request.order_id))]
    async fn create_session(&self, request: &SessionRequest) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(format!("{}/snap/v1/transactions", self.base_url))
            .basic_auth(&self.server_key, Some(""))
            .json(&Self::body(request))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout)
                } else {
                    GatewayError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body: SnapResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        if body.token.is_empty() {
            return Err(GatewayError::InvalidResponse("empty session token".to_string()));
        }

        debug!("Payment session issued");
        Ok(body.token)
    }
}
