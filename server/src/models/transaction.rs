use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

use crate::models::trip::{Trip, TripResponse};
use crate::models::user::User;

/// Civil date format used for booking and trip dates in responses.
pub const DISPLAY_DATE_FORMAT: &str = "%A, %-d %B %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    /// `success` and `failed` accept no further transitions.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: i64,
    pub counter_qty: i32,
    pub total: i64,
    pub status: TransactionStatus,
    pub token: Option<String>,
    pub booking_date: DateTime<Utc>,
    pub trip_id: i64,
    pub user_id: i64,
}

/// Everything needed to insert a transaction except its order id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub counter_qty: i32,
    pub total: i64,
    pub trip_id: i64,
    pub user_id: i64,
    pub booking_date: DateTime<Utc>,
}

impl TransactionDraft {
    /// New records always start `pending` and without a session token.
    pub fn with_id(&self, id: i64) -> Transaction {
        Transaction {
            id,
            counter_qty: self.counter_qty,
            total: self.total,
            status: TransactionStatus::Pending,
            token: None,
            booking_date: self.booking_date,
            trip_id: self.trip_id,
            user_id: self.user_id,
        }
    }
}

/// A transaction joined with the trip and user it references.
#[derive(Debug, Clone)]
pub struct TransactionDetails {
    pub transaction: Transaction,
    pub trip: Option<Trip>,
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub counter_qty: Option<i32>,
    pub total: Option<i64>,
    pub trip_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    pub id: i64,
    pub counter_qty: i32,
    pub total: i64,
    pub status: TransactionStatus,
    pub token: String,
    pub booking_date: String,
    pub trip: Option<TripResponse>,
    pub user: Option<User>,
}

impl TransactionResponse {
    pub fn from_details(details: TransactionDetails, offset: FixedOffset) -> Self {
        let TransactionDetails {
            transaction,
            trip,
            user,
        } = details;

        Self {
            id: transaction.id,
            counter_qty: transaction.counter_qty,
            total: transaction.total,
            status: transaction.status,
            token: transaction.token.unwrap_or_default(),
            booking_date: transaction
                .booking_date
                .with_timezone(&offset)
                .format(DISPLAY_DATE_FORMAT)
                .to_string(),
            trip: trip.map(|trip| TripResponse::new(trip, offset)),
            user,
        }
    }
}
