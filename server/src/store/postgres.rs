use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::{Transaction, TransactionStatus, Trip, User};
use crate::store::{CatalogReader, DeadLetter, StoreError, TransactionStore};

const TRANSACTION_COLUMNS: &str =
    "id, counter_qty, total, status, token, booking_date, trip_id, user_id";

/// Postgres-backed store. Row-level atomicity comes from single-statement
/// conditional writes, so no explicit locking is needed here.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionStore for PgStore {
    async fn get(&self, id: i64) -> Result<Option<Transaction>, StoreError> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = $1");
        let transaction = sqlx::query_as::<_, Transaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(transaction)
    }

    async fn create(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
        let sql = format!(
            "INSERT INTO transactions ({TRANSACTION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO NOTHING \
             RETURNING {TRANSACTION_COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&sql)
            .bind(transaction.id)
            .bind(transaction.counter_qty)
            .bind(transaction.total)
            .bind(transaction.status)
            .bind(&transaction.token)
            .bind(transaction.booking_date)
            .bind(transaction.trip_id)
            .bind(transaction.user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::UniqueViolation(transaction.id))
    }

    async fn update_status(
        &self,
        id: i64,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<Option<Transaction>, StoreError> {
        let sql = format!(
            "UPDATE transactions SET status = $1 \
             WHERE id = $2 AND status = $3 \
             RETURNING {TRANSACTION_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Transaction>(&sql)
            .bind(to)
            .bind(id)
            .bind(from)
            .fetch_optional(&self.pool)
            .await?;
        Ok(updated)
    }

    async fn update_token(&self, id: i64, token: &str) -> Result<Transaction, StoreError> {
        let sql = format!(
            "UPDATE transactions SET token = $1 WHERE id = $2 RETURNING {TRANSACTION_COLUMNS}"
        );
        sqlx::query_as::<_, Transaction>(&sql)
            .bind(token)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<Transaction>, StoreError> {
        let sql = format!("SELECT {TRANSACTION_COLUMNS} FROM transactions ORDER BY booking_date DESC");
        let transactions = sqlx::query_as::<_, Transaction>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(transactions)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Transaction>, StoreError> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions \
             WHERE user_id = $1 ORDER BY booking_date DESC"
        );
        let transactions = sqlx::query_as::<_, Transaction>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(transactions)
    }

    async fn delete(&self, id: i64) -> Result<Transaction, StoreError> {
        let sql = format!("DELETE FROM transactions WHERE id = $1 RETURNING {TRANSACTION_COLUMNS}");
        sqlx::query_as::<_, Transaction>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    async fn record_dead_letter(&self, letter: DeadLetter) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO notification_dead_letters (id, order_id, payload, reason, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(letter.id)
        .bind(letter.order_id)
        .bind(sqlx::types::Json(&letter.payload))
        .bind(&letter.reason)
        .bind(letter.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogReader for PgStore {
    async fn trip(&self, id: i64) -> Result<Option<Trip>, StoreError> {
        let trip = sqlx::query_as::<_, Trip>(
            "SELECT t.id, t.title, c.name AS country, t.accomodation, t.transportation, \
                    t.eat, t.day, t.night, t.date_trip, t.price, t.quota, t.description, t.image \
             FROM trips t JOIN countries c ON c.id = t.country_id \
             WHERE t.id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(trip)
    }

    async fn user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT id, name, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}
