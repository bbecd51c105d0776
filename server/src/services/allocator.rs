use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{Transaction, TransactionDraft};
use crate::store::{StoreError, TransactionStore};
use crate::utils::error::AppError;

/// Source of the nanosecond component of order ids.
pub type NanoClock = Arc<dyn Fn() -> i64 + Send + Sync>;

pub fn system_clock() -> NanoClock {
    Arc::new(|| Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

/// Allocates order ids as `user_id + trip_id + now_nanos`.
///
/// A candidate is only "allocated" once the store has inserted it, so two
/// callers racing on the same candidate cannot both win: the loser sees
/// `UniqueViolation` and draws a fresh candidate from the clock.
#[derive(Clone)]
pub struct OrderIdAllocator {
    clock: NanoClock,
    max_attempts: u32,
}

impl OrderIdAllocator {
    pub fn new(max_attempts: u32) -> Self {
        Self::with_clock(system_clock(), max_attempts)
    }

    pub fn with_clock(clock: NanoClock, max_attempts: u32) -> Self {
        Self {
            clock,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn candidate(&self, user_id: i64, trip_id: i64) -> i64 {
        user_id.wrapping_add(trip_id).wrapping_add((self.clock)())
    }

    /// Reserves an id and persists `draft` under it in one store call.
    pub async fn create(
        &self,
        store: &dyn TransactionStore,
        draft: &TransactionDraft,
    ) -> Result<Transaction, AppError> {
        for attempt in 1..=self.max_attempts {
            let id = self.candidate(draft.user_id, draft.trip_id);
            match store.create(draft.with_id(id)).await {
                Ok(transaction) => return Ok(transaction),
                Err(StoreError::UniqueViolation(taken)) => {
                    debug!(order_id = taken, attempt, "Order id collision, drawing again");
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!(
            user_id = draft.user_id,
            trip_id = draft.trip_id,
            attempts = self.max_attempts,
            "Order id allocation exhausted"
        );
        Err(AppError::Conflict(format!(
            "Could not allocate an order id after {} attempts, please retry",
            self.max_attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn draft() -> TransactionDraft {
        TransactionDraft {
            counter_qty: 2,
            total: 100_000,
            trip_id: 5,
            user_id: 7,
            booking_date: Utc::now(),
        }
    }

    fn fixed_clock(nanos: i64) -> NanoClock {
        Arc::new(move || nanos)
    }

    #[test]
    fn test_candidate_sums_user_trip_and_clock() {
        let allocator = OrderIdAllocator::with_clock(fixed_clock(1_000), 3);
        assert_eq!(allocator.candidate(7, 5), 1_012);
    }

    #[tokio::test]
    async fn test_collision_draws_a_new_candidate() {
        let store = InMemoryStore::new();
        let ticks = Arc::new(AtomicI64::new(0));
        let clock: NanoClock = {
            let ticks = ticks.clone();
            // Two reads per tick, so the second caller collides once.
            Arc::new(move || ticks.fetch_add(1, Ordering::SeqCst) / 2)
        };
        let allocator = OrderIdAllocator::with_clock(clock, 3);

        let first = allocator.create(&store, &draft()).await.unwrap();
        let second = allocator.create(&store, &draft()).await.unwrap();

        assert_eq!(first.id, 12);
        assert_eq!(second.id, 13);
        assert_eq!(store.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_frozen_clock_yields_conflict_not_duplicate() {
        let store = InMemoryStore::new();
        let allocator = OrderIdAllocator::with_clock(fixed_clock(500), 4);

        allocator.create(&store, &draft()).await.unwrap();
        let err = allocator.create(&store, &draft()).await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert!(err.is_retryable());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
