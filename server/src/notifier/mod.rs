use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, Instrument};

use crate::models::{Transaction, User};
use crate::utils::retry::{with_retry, RetryConfig};

pub mod mail_relay;

pub use mail_relay::MailRelayNotifier;

/// A status change to tell the customer about.
///
/// `transaction` is the snapshot taken before the change was persisted.
/// `customer` and `trip_title` may be missing if their lookups failed.
#[derive(Debug, Clone)]
pub struct StatusNotice {
    pub label: String,
    pub transaction: Transaction,
    pub customer: Option<User>,
    pub trip_title: Option<String>,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no recipient for transaction {0}")]
    MissingRecipient(i64),

    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification transport did not answer within {0:?}")]
    Timeout(Duration),
}

impl NotifyError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, NotifyError::MissingRecipient(_))
    }
}

#[async_trait]
pub trait CustomerNotifier: Send + Sync {
    async fn notify(&self, notice: &StatusNotice) -> Result<(), NotifyError>;
}

/// Writes notices to the log. Used when no mail relay is configured.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl CustomerNotifier for LogNotifier {
    async fn notify(&self, notice: &StatusNotice) -> Result<(), NotifyError> {
        info!(
            order_id = notice.transaction.id,
            email = notice.customer.as_ref().map(|c| c.email.as_str()),
            label = %notice.label,
            "Customer notice"
        );
        Ok(())
    }
}

/// Delivers notices off the request path with a bounded retry budget.
///
/// Delivery failure is logged as a dead letter and never propagates.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn CustomerNotifier>,
    retry: RetryConfig,
    timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn CustomerNotifier>, retry: RetryConfig, timeout: Duration) -> Self {
        Self {
            notifier,
            retry,
            timeout,
        }
    }

    pub fn dispatch(&self, notice: StatusNotice) -> JoinHandle<()> {
        let this = self.clone();
        let span = tracing::info_span!("customer_notice", order_id = notice.transaction.id);
        tokio::spawn(
            async move {
                let result = with_retry(&this.retry, NotifyError::is_retryable, || {
                    this.attempt(&notice)
                })
                .await;

                if let Err(e) = result {
                    error!(
                        target: "dead_letter",
                        order_id = notice.transaction.id,
                        label = %notice.label,
                        error = %e,
                        "Customer notice dropped"
                    );
                }
            }
            .instrument(span),
        )
    }

    async fn attempt(&self, notice: &StatusNotice) -> Result<(), NotifyError> {
        tokio::time::timeout(self.timeout, self.notifier.notify(notice))
            .await
            .map_err(|_| NotifyError::Timeout(self.timeout))?
    }
}
