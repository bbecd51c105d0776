use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::{Transaction, TransactionStatus, Trip, User};
use crate::store::{CatalogReader, DeadLetter, StoreError, TransactionStore};

#[derive(Default)]
struct Tables {
    transactions: HashMap<i64, Transaction>,
    trips: HashMap<i64, Trip>,
    users: HashMap<i64, User>,
    dead_letters: Vec<DeadLetter>,
}

/// A thread-safe in-memory store.
///
/// Every write takes the single write lock, which gives the same
/// insert-if-absent and compare-and-set guarantees as the Postgres store.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_trip(&self, trip: Trip) {
        self.tables.write().await.trips.insert(trip.id, trip);
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.tables.read().await.dead_letters.clone()
    }
}

#[async_trait]
impl TransactionStore for InMemoryStore {
    async fn get(&self, id: i64) -> Result<Option<Transaction>, StoreError> {
        Ok(self.tables.read().await.transactions.get(&id).cloned())
    }

    async fn create(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.transactions.contains_key(&transaction.id) {
            return Err(StoreError::UniqueViolation(transaction.id));
        }
        tables
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(transaction)
    }

    async fn update_status(
        &self,
        id: i64,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<Option<Transaction>, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.transactions.get_mut(&id) {
            Some(transaction) if transaction.status == from => {
                transaction.status = to;
                Ok(Some(transaction.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn update_token(&self, id: i64, token: &str) -> Result<Transaction, StoreError> {
        let mut tables = self.tables.write().await;
        let transaction = tables
            .transactions
            .get_mut(&id)
            .ok_or(StoreError::NotFound(id))?;
        transaction.token = Some(token.to_string());
        Ok(transaction.clone())
    }

    async fn list(&self) -> Result<Vec<Transaction>, StoreError> {
        let tables = self.tables.read().await;
        let mut transactions: Vec<_> = tables.transactions.values().cloned().collect();
        transactions.sort_by(|a, b| b.booking_date.cmp(&a.booking_date));
        Ok(transactions)
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Transaction>, StoreError> {
        let mut transactions = self.list().await?;
        transactions.retain(|t| t.user_id == user_id);
        Ok(transactions)
    }

    async fn delete(&self, id: i64) -> Result<Transaction, StoreError> {
        self.tables
            .write()
            .await
            .transactions
            .remove(&id)
            .ok_or(StoreError::NotFound(id))
    }

    async fn record_dead_letter(&self, letter: DeadLetter) -> Result<(), StoreError> {
        self.tables.write().await.dead_letters.push(letter);
        Ok(())
    }
}

#[async_trait]
impl CatalogReader for InMemoryStore {
    async fn trip(&self, id: i64) -> Result<Option<Trip>, StoreError> {
        Ok(self.tables.read().await.trips.get(&id).cloned())
    }

    async fn user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }
}
