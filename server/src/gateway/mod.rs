use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub mod snap;

pub use snap::SnapGateway;

/// What the gateway needs to open a payment session for one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub order_id: i64,
    /// Amount in minor units of the gateway's single currency.
    pub amount: i64,
    pub customer_name: String,
    pub customer_email: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("payment gateway unreachable: {0}")]
    Network(String),

    #[error("payment gateway rejected the request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("payment gateway returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("payment gateway did not answer within {0:?}")]
    Timeout(Duration),
}

/// Issues payment session tokens. Callbacks arrive separately over HTTP.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_session(&self, request: &SessionRequest) -> Result<String, GatewayError>;
}
