use chrono::FixedOffset;
use std::sync::Arc;

pub mod config;
pub mod gateway;
pub mod handlers;
pub mod models;
pub mod notifier;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use services::{NotificationProcessor, TransactionService};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub transactions: Arc<TransactionService>,
    pub notifications: Arc<NotificationProcessor>,
    /// Civil offset used when rendering dates.
    pub booking_offset: FixedOffset,
}

impl AppState {
    pub fn new(
        transactions: TransactionService,
        notifications: NotificationProcessor,
        booking_offset: FixedOffset,
    ) -> Self {
        Self {
            transactions: Arc::new(transactions),
            notifications: Arc::new(notifications),
            booking_offset,
        }
    }
}
