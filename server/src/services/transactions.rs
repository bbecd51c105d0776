use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

use crate::gateway::{GatewayError, PaymentGateway, SessionRequest};
use crate::models::{
    CreateTransactionRequest, Transaction, TransactionDetails, TransactionDraft, TransactionStatus,
    User,
};
use crate::services::allocator::OrderIdAllocator;
use crate::store::{CatalogReader, TransactionStore};
use crate::utils::error::AppError;

/// A creation request that passed field validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedOrder {
    pub counter_qty: i32,
    pub total: i64,
    pub trip_id: i64,
}

impl TryFrom<CreateTransactionRequest> for ValidatedOrder {
    type Error = AppError;

    fn try_from(request: CreateTransactionRequest) -> Result<Self, Self::Error> {
        let counter_qty = request
            .counter_qty
            .ok_or_else(|| AppError::ValidationError("counter_qty is required".to_string()))?;
        let total = request
            .total
            .ok_or_else(|| AppError::ValidationError("total is required".to_string()))?;
        let trip_id = request
            .trip_id
            .ok_or_else(|| AppError::ValidationError("trip_id is required".to_string()))?;

        if counter_qty <= 0 {
            return Err(AppError::ValidationError(
                "counter_qty must be greater than zero".to_string(),
            ));
        }
        if total <= 0 {
            return Err(AppError::ValidationError(
                "total must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            counter_qty,
            total,
            trip_id,
        })
    }
}

pub struct TransactionService {
    store: Arc<dyn TransactionStore>,
    catalog: Arc<dyn CatalogReader>,
    gateway: Arc<dyn PaymentGateway>,
    allocator: OrderIdAllocator,
    gateway_timeout: Duration,
}

impl TransactionService {
    pub fn new(
        store: Arc<dyn TransactionStore>,
        catalog: Arc<dyn CatalogReader>,
        gateway: Arc<dyn PaymentGateway>,
        allocator: OrderIdAllocator,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            gateway,
            allocator,
            gateway_timeout,
        }
    }

    /// Creates a `pending` transaction and attaches a payment session token.
    ///
    /// If the gateway fails, the pending record is kept and the caller gets an
    /// upstream error naming it, so the token can be re-issued with
    /// [`TransactionService::refresh_token`].
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        user_id: i64,
        request: CreateTransactionRequest,
    ) -> Result<TransactionDetails, AppError> {
        let order = ValidatedOrder::try_from(request)?;

        let trip = self.catalog.trip(order.trip_id).await?.ok_or_else(|| {
            AppError::ValidationError(format!("Trip {} does not exist", order.trip_id))
        })?;
        let user = self.customer(user_id).await?;

        let draft = TransactionDraft {
            counter_qty: order.counter_qty,
            total: order.total,
            trip_id: order.trip_id,
            user_id,
            booking_date: Utc::now(),
        };
        let transaction = self.allocator.create(self.store.as_ref(), &draft).await?;
        info!(order_id = transaction.id, "Transaction created");

        let token = self.open_session(&transaction, &user).await.map_err(|e| {
            error!(order_id = transaction.id, error = %e, "Token issuance failed");
            AppError::ExternalServiceError(format!(
                "Transaction {} was created but the payment session could not be opened \
                 ({}); retry with PATCH /transactions/{}",
                transaction.id, e, transaction.id
            ))
        })?;
        let transaction = self.store.update_token(transaction.id, &token).await?;

        Ok(TransactionDetails {
            transaction,
            trip: Some(trip),
            user: Some(user),
        })
    }

    /// Requests a fresh session for a transaction that is still `pending`.
    #[instrument(skip(self))]
    pub async fn refresh_token(&self, id: i64) -> Result<TransactionDetails, AppError> {
        let transaction = self.find(id).await?;
        if transaction.status != TransactionStatus::Pending {
            return Err(AppError::ValidationError(format!(
                "Transaction {} is {}, only pending transactions accept a new token",
                id, transaction.status
            )));
        }

        let user = self.customer(transaction.user_id).await?;
        let token = self.open_session(&transaction, &user).await?;
        let transaction = self.store.update_token(id, &token).await?;
        info!(order_id = id, "Payment session refreshed");

        self.details(transaction).await
    }

    pub async fn get(&self, id: i64) -> Result<TransactionDetails, AppError> {
        let transaction = self.find(id).await?;
        self.details(transaction).await
    }

    pub async fn list(&self) -> Result<Vec<TransactionDetails>, AppError> {
        let transactions = self.store.list().await?;
        self.details_all(transactions).await
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<TransactionDetails>, AppError> {
        let transactions = self.store.list_by_user(user_id).await?;
        self.details_all(transactions).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<TransactionDetails, AppError> {
        let transaction = self.store.delete(id).await?;
        info!(order_id = id, "Transaction deleted");
        self.details(transaction).await
    }

    async fn find(&self, id: i64) -> Result<Transaction, AppError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", id)))
    }

    async fn customer(&self, user_id: i64) -> Result<User, AppError> {
        self.catalog
            .user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    async fn open_session(
        &self,
        transaction: &Transaction,
        user: &User,
    ) -> Result<String, GatewayError> {
        let request = SessionRequest {
            order_id: transaction.id,
            amount: transaction.total,
            customer_name: user.name.clone(),
            customer_email: user.email.clone(),
        };

        tokio::time::timeout(self.gateway_timeout, self.gateway.create_session(&request))
            .await
            .map_err(|_| GatewayError::Timeout(self.gateway_timeout))?
    }

    async fn details(&self, transaction: Transaction) -> Result<TransactionDetails, AppError> {
        let trip = self.catalog.trip(transaction.trip_id).await?;
        let user = self.catalog.user(transaction.user_id).await?;
        Ok(TransactionDetails {
            transaction,
            trip,
            user,
        })
    }

    async fn details_all(
        &self,
        transactions: Vec<Transaction>,
    ) -> Result<Vec<TransactionDetails>, AppError> {
        let mut all = Vec::with_capacity(transactions.len());
        for transaction in transactions {
            all.push(self.details(transaction).await?);
        }
        Ok(all)
    }
}
