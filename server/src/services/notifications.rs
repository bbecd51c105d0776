use dashmap::DashMap;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::config::StoreConfig;
use crate::models::{GatewayNotification, Transaction, TransactionStatus};
use crate::notifier::{NotificationDispatcher, StatusNotice};
use crate::store::{CatalogReader, DeadLetter, StoreError, TransactionStore};
use crate::utils::retry::{with_retry, RetryConfig};

pub const LABEL_SUCCESS: &str = "Transaction Success";
pub const LABEL_FAILED: &str = "Transaction Failed";
pub const LABEL_PENDING: &str = "Transaction Pending";

/// Internal status and customer-facing label for one gateway outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: TransactionStatus,
    pub label: &'static str,
}

/// `(transaction_status, fraud_status)` to internal transition. A `None`
/// fraud status matches any value.
const TRANSITIONS: &[(&str, Option<&str>, Transition)] = &[
    ("capture", Some("challenge"), FAILED),
    ("capture", Some("accept"), SUCCESS),
    ("settlement", None, SUCCESS),
    ("deny", None, FAILED),
    ("cancel", None, FAILED),
    ("expire", None, FAILED),
    ("pending", None, PENDING),
];

const SUCCESS: Transition = Transition {
    status: TransactionStatus::Success,
    label: LABEL_SUCCESS,
};
const FAILED: Transition = Transition {
    status: TransactionStatus::Failed,
    label: LABEL_FAILED,
};
const PENDING: Transition = Transition {
    status: TransactionStatus::Pending,
    label: LABEL_PENDING,
};

impl Transition {
    /// Looks up the gateway outcome. Unknown outcomes, and `capture` with a
    /// fraud status other than `challenge`/`accept`, map to nothing.
    pub fn resolve(transaction_status: &str, fraud_status: Option<&str>) -> Option<Transition> {
        TRANSITIONS
            .iter()
            .find(|(status, fraud, _)| {
                *status == transaction_status && fraud.map_or(true, |f| Some(f) == fraud_status)
            })
            .map(|(_, _, transition)| *transition)
    }
}

/// What happened to one callback delivery.
#[derive(Debug)]
pub enum NotificationOutcome {
    /// Status persisted; the customer notice runs on `delivery`.
    Applied {
        order_id: i64,
        from: TransactionStatus,
        to: TransactionStatus,
        delivery: JoinHandle<()>,
    },
    /// The transaction already had the target status.
    Unchanged {
        order_id: i64,
        status: TransactionStatus,
    },
    /// The transaction is in a terminal status and cannot move.
    Refused {
        order_id: i64,
        current: TransactionStatus,
        requested: TransactionStatus,
    },
    /// Another writer changed the status between read and write.
    Superseded { order_id: i64 },
    /// The gateway outcome has no mapping.
    Ignored { order_id: i64 },
    UnknownOrder { order_id: i64 },
    InvalidSignature { order_id: i64 },
    /// The payload could not be read or the store kept failing.
    DeadLettered { order_id: Option<i64> },
}

/// Serializes work per order id inside this process.
#[derive(Default, Clone)]
pub struct OrderLocks {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    pub async fn acquire(&self, order_id: i64) -> OrderGuard {
        let lock = self.locks.entry(order_id).or_default().clone();
        OrderGuard {
            guard: Some(lock.lock_owned().await),
            locks: self.clone(),
            order_id,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Drops the entry once nobody holds or waits on it.
    fn release(&self, order_id: i64) {
        self.locks
            .remove_if(&order_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Holds one order's lock. Dropping it, including when the owning future is
/// cancelled, unlocks and cleans up the entry.
pub struct OrderGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: OrderLocks,
    order_id: i64,
}

impl Drop for OrderGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(self.order_id);
    }
}

pub struct NotificationProcessor {
    store: Arc<dyn TransactionStore>,
    catalog: Arc<dyn CatalogReader>,
    dispatcher: NotificationDispatcher,
    locks: OrderLocks,
    retry: RetryConfig,
    store_timeout: Duration,
    signature_key: Option<String>,
}

impl NotificationProcessor {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        catalog: Arc<dyn CatalogReader>,
        dispatcher: NotificationDispatcher,
        store_config: &StoreConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            dispatcher,
            locks: OrderLocks::default(),
            retry: RetryConfig::new(store_config.max_attempts, store_config.initial_backoff),
            store_timeout: store_config.timeout,
            signature_key: None,
        }
    }

    /// Rejects callbacks whose `signature_key` does not match `server_key`.
    pub fn with_signature_key(mut self, server_key: impl Into<String>) -> Self {
        self.signature_key = Some(server_key.into());
        self
    }

    pub fn locks(&self) -> &OrderLocks {
        &self.locks
    }

    /// Entry point for raw callback bodies. Never fails: anything that cannot
    /// be applied ends up in the dead-letter table or the log.
    pub async fn handle_raw(&self, payload: Value) -> NotificationOutcome {
        match serde_json::from_value::<GatewayNotification>(payload.clone()) {
            Ok(notification) => self.handle(notification, payload).await,
            Err(e) => {
                warn!(error = %e, "Unreadable gateway notification");
                self.dead_letter(None, payload, format!("unreadable payload: {}", e))
                    .await;
                NotificationOutcome::DeadLettered { order_id: None }
            }
        }
    }

    #[instrument(
        skip(self, notification, payload),
        fields(
            order_id = notification.order_id,
            transaction_status = %notification.transaction_status,
            fraud_status = ?notification.fraud_status,
        )
    )]
    pub async fn handle(
        &self,
        notification: GatewayNotification,
        payload: Value,
    ) -> NotificationOutcome {
        let order_id = notification.order_id;

        if let Some(key) = &self.signature_key {
            if !notification.signature_matches(key) {
                warn!("Notification signature mismatch, ignoring");
                return NotificationOutcome::InvalidSignature { order_id };
            }
        }

        let Some(transition) = Transition::resolve(
            &notification.transaction_status,
            notification.fraud_status.as_deref(),
        ) else {
            info!("Gateway outcome has no status mapping, ignoring");
            return NotificationOutcome::Ignored { order_id };
        };

        let guard = self.locks.acquire(order_id).await;
        let outcome = self.apply(order_id, transition).await;
        drop(guard);

        match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "Notification could not be applied");
                self.dead_letter(Some(order_id), payload, e.to_string()).await;
                NotificationOutcome::DeadLettered {
                    order_id: Some(order_id),
                }
            }
        }
    }

    async fn apply(
        &self,
        order_id: i64,
        transition: Transition,
    ) -> Result<NotificationOutcome, StoreError> {
        let Some(snapshot) = self.with_store(|| self.store.get(order_id)).await? else {
            warn!("Notification for unknown order");
            return Ok(NotificationOutcome::UnknownOrder { order_id });
        };

        let current = snapshot.status;
        if current == transition.status {
            debug!(status = %current, "Status already applied");
            return Ok(NotificationOutcome::Unchanged {
                order_id,
                status: current,
            });
        }
        if current.is_terminal() {
            warn!(
                current = %current,
                requested = %transition.status,
                "Refusing to leave terminal status"
            );
            return Ok(NotificationOutcome::Refused {
                order_id,
                current,
                requested: transition.status,
            });
        }

        // Built up front: nothing may await between the status write and the dispatch.
        let notice = self.notice(snapshot, transition.label).await;

        let updated = self
            .with_store(|| self.store.update_status(order_id, current, transition.status))
            .await?;
        if updated.is_none() {
            warn!("Status changed concurrently, leaving it to the other writer");
            return Ok(NotificationOutcome::Superseded { order_id });
        }
        info!(from = %current, to = %transition.status, "Transaction status updated");

        Ok(NotificationOutcome::Applied {
            order_id,
            from: current,
            to: transition.status,
            delivery: self.dispatcher.dispatch(notice),
        })
    }

    /// Builds the customer notice. Catalog lookups are bounded like store
    /// calls; a lookup that keeps failing leaves its field empty.
    async fn notice(&self, snapshot: Transaction, label: &str) -> StatusNotice {
        let customer = self
            .with_store(|| self.catalog.user(snapshot.user_id))
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "Customer lookup failed, sending notice without recipient");
                None
            });
        let trip_title = match self.with_store(|| self.catalog.trip(snapshot.trip_id)).await {
            Ok(trip) => trip.map(|t| t.title),
            Err(e) => {
                warn!(error = %e, "Trip lookup failed");
                None
            }
        };

        StatusNotice {
            label: label.to_string(),
            transaction: snapshot,
            customer,
            trip_title,
        }
    }

    /// Runs one store call with a timeout, retrying transient failures.
    async fn with_store<T, F, Fut>(&self, operation: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        with_retry(&self.retry, StoreError::is_transient, || async {
            tokio::time::timeout(self.store_timeout, operation())
                .await
                .map_err(|_| StoreError::Timeout(self.store_timeout))?
        })
        .await
    }

    async fn dead_letter(&self, order_id: Option<i64>, payload: Value, reason: String) {
        let letter = DeadLetter::new(order_id, payload, reason);
        if let Err(e) = self.store.record_dead_letter(letter.clone()).await {
            error!(
                target: "dead_letter",
                order_id = ?letter.order_id,
                payload = %letter.payload,
                reason = %letter.reason,
                error = %e,
                "Dead letter could not be stored"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        let cases = [
            ("capture", Some("challenge"), Some(FAILED)),
            ("capture", Some("accept"), Some(SUCCESS)),
            ("settlement", None, Some(SUCCESS)),
            ("settlement", Some("accept"), Some(SUCCESS)),
            ("deny", None, Some(FAILED)),
            ("cancel", None, Some(FAILED)),
            ("expire", None, Some(FAILED)),
            ("pending", None, Some(PENDING)),
            ("capture", None, None),
            ("capture", Some("deny"), None),
            ("refund", None, None),
            ("authorize", None, None),
        ];

        for (status, fraud, expected) in cases {
            assert_eq!(
                Transition::resolve(status, fraud),
                expected,
                "transaction_status={} fraud_status={:?}",
                status,
                fraud
            );
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(
            Transition::resolve("settlement", None).unwrap().label,
            "Transaction Success"
        );
        assert_eq!(
            Transition::resolve("expire", None).unwrap().label,
            "Transaction Failed"
        );
        assert_eq!(
            Transition::resolve("pending", None).unwrap().label,
            "Transaction Pending"
        );
    }

    #[tokio::test]
    async fn test_order_locks_serialize_and_clean_up() {
        let locks = OrderLocks::default();

        let guard = locks.acquire(1).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(1).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_no_entry() {
        let locks = OrderLocks::default();
        let guard = locks.acquire(9).await;

        let waiting = tokio::time::timeout(Duration::from_millis(20), locks.acquire(9)).await;
        assert!(waiting.is_err());

        drop(guard);
        assert!(locks.is_empty());
    }
}
