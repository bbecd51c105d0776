use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Transaction, TransactionStatus, Trip, User};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("transaction {0} not found")]
    NotFound(i64),

    #[error("transaction {0} already exists")]
    UniqueViolation(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store timed out after {0:?}")]
    Timeout(Duration),
}

impl StoreError {
    /// Errors worth another attempt: connectivity problems and timeouts.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout(_) => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed
            ),
            StoreError::NotFound(_) | StoreError::UniqueViolation(_) => false,
        }
    }
}

/// A gateway callback that could not be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub id: Uuid,
    pub order_id: Option<i64>,
    pub payload: Value,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn new(order_id: Option<i64>, payload: Value, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            payload,
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }
}

/// Durable home of transactions. Single source of truth for status and token.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Transaction>, StoreError>;

    /// Inserts `transaction` only if no record holds its id yet, failing with
    /// [`StoreError::UniqueViolation`] otherwise.
    async fn create(&self, transaction: Transaction) -> Result<Transaction, StoreError>;

    /// Moves `id` from `from` to `to`. Returns `None` when the stored status
    /// is no longer `from`, leaving the record untouched.
    async fn update_status(
        &self,
        id: i64,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<Option<Transaction>, StoreError>;

    async fn update_token(&self, id: i64, token: &str) -> Result<Transaction, StoreError>;

    async fn list(&self) -> Result<Vec<Transaction>, StoreError>;

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Transaction>, StoreError>;

    async fn delete(&self, id: i64) -> Result<Transaction, StoreError>;

    async fn record_dead_letter(&self, letter: DeadLetter) -> Result<(), StoreError>;
}

/// Lookups into records owned by the trip catalog and the user directory.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn trip(&self, id: i64) -> Result<Option<Trip>, StoreError>;

    async fn user(&self, id: i64) -> Result<Option<User>, StoreError>;
}
