#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;

use tourpay_server::config::{default_booking_offset, StoreConfig};
use tourpay_server::gateway::{GatewayError, PaymentGateway, SessionRequest};
use tourpay_server::handlers::auth::USER_ID_HEADER;
use tourpay_server::models::{Transaction, TransactionStatus, Trip, User};
use tourpay_server::notifier::{
    CustomerNotifier, NotificationDispatcher, NotifyError, StatusNotice,
};
use tourpay_server::routes::create_routes;
use tourpay_server::services::allocator::{system_clock, NanoClock};
use tourpay_server::services::{NotificationProcessor, OrderIdAllocator, TransactionService};
use tourpay_server::store::{
    CatalogReader, DeadLetter, InMemoryStore, StoreError, TransactionStore,
};
use tourpay_server::utils::retry::RetryConfig;
use tourpay_server::AppState;

pub const USER_ID: i64 = 7;
pub const OTHER_USER_ID: i64 = 8;
pub const TRIP_ID: i64 = 5;

/// Issues `snap-token-<n>` tokens and records every request.
#[derive(Default)]
pub struct RecordingGateway {
    issued: AtomicU32,
    failures_left: AtomicU32,
    requests: Mutex<Vec<SessionRequest>>,
}

impl RecordingGateway {
    pub fn failing_first(failures: u32) -> Self {
        let gateway = Self::default();
        gateway.failures_left.store(failures, Ordering::SeqCst);
        gateway
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for RecordingGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<String, GatewayError> {
        self.requests.lock().unwrap().push(request.clone());

        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(GatewayError::Network("connection refused".to_string()));
        }

        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("snap-token-{}", n))
    }
}

/// Never answers; exercises the gateway timeout.
pub struct HangingGateway;

#[async_trait]
impl PaymentGateway for HangingGateway {
    async fn create_session(&self, _request: &SessionRequest) -> Result<String, GatewayError> {
        std::future::pending().await
    }
}

/// Records `(label, order_id, recipient)` for every delivered notice.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(String, i64, Option<String>)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(String, i64, Option<String>)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.notices.lock().unwrap().len()
    }

    /// Waits for background deliveries started by the HTTP path.
    pub async fn wait_for(&self, count: usize) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.count() < count && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl CustomerNotifier for RecordingNotifier {
    async fn notify(&self, notice: &StatusNotice) -> Result<(), NotifyError> {
        self.notices.lock().unwrap().push((
            notice.label.clone(),
            notice.transaction.id,
            notice.customer.as_ref().map(|c| c.email.clone()),
        ));
        Ok(())
    }
}

/// Always fails, counting attempts.
#[derive(Default)]
pub struct FailingNotifier {
    pub attempts: AtomicU32,
}

#[async_trait]
impl CustomerNotifier for FailingNotifier {
    async fn notify(&self, _notice: &StatusNotice) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NotifyError::Transport("535 authentication failed".to_string()))
    }
}

/// Wraps the in-memory store and times out the first `get_failures` reads.
pub struct UnreliableStore {
    pub inner: InMemoryStore,
    get_failures: AtomicU32,
}

impl UnreliableStore {
    pub fn new(inner: InMemoryStore, get_failures: u32) -> Self {
        Self {
            inner,
            get_failures: AtomicU32::new(get_failures),
        }
    }
}

#[async_trait]
impl TransactionStore for UnreliableStore {
    async fn get(&self, id: i64) -> Result<Option<Transaction>, StoreError> {
        let left = self.get_failures.load(Ordering::SeqCst);
        if left > 0 {
            self.get_failures.store(left - 1, Ordering::SeqCst);
            return Err(StoreError::Timeout(Duration::from_millis(1)));
        }
        self.inner.get(id).await
    }

    async fn create(&self, transaction: Transaction) -> Result<Transaction, StoreError> {
        self.inner.create(transaction).await
    }

    async fn update_status(
        &self,
        id: i64,
        from: TransactionStatus,
        to: TransactionStatus,
    ) -> Result<Option<Transaction>, StoreError> {
        self.inner.update_status(id, from, to).await
    }

    async fn update_token(&self, id: i64, token: &str) -> Result<Transaction, StoreError> {
        self.inner.update_token(id, token).await
    }

    async fn list(&self) -> Result<Vec<Transaction>, StoreError> {
        self.inner.list().await
    }

    async fn list_by_user(&self, user_id: i64) -> Result<Vec<Transaction>, StoreError> {
        self.inner.list_by_user(user_id).await
    }

    async fn delete(&self, id: i64) -> Result<Transaction, StoreError> {
        self.inner.delete(id).await
    }

    async fn record_dead_letter(&self, letter: DeadLetter) -> Result<(), StoreError> {
        self.inner.record_dead_letter(letter).await
    }
}

/// Catalog whose first `stalls` user lookups never answer.
pub struct StallingCatalog {
    inner: InMemoryStore,
    stalls_left: AtomicU32,
}

impl StallingCatalog {
    pub fn new(inner: InMemoryStore, stalls: u32) -> Self {
        Self {
            inner,
            stalls_left: AtomicU32::new(stalls),
        }
    }
}

#[async_trait]
impl CatalogReader for StallingCatalog {
    async fn trip(&self, id: i64) -> Result<Option<Trip>, StoreError> {
        self.inner.trip(id).await
    }

    async fn user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let left = self.stalls_left.load(Ordering::SeqCst);
        if left > 0 {
            self.stalls_left.store(left - 1, Ordering::SeqCst);
            return std::future::pending().await;
        }
        self.inner.user(id).await
    }
}

pub fn user(id: i64) -> User {
    User {
        id,
        name: format!("Traveller {}", id),
        email: format!("traveller{}@example.com", id),
    }
}

pub fn trip() -> Trip {
    Trip {
        id: TRIP_ID,
        title: "6D/4N Fun Tassie".to_string(),
        country: "Australia".to_string(),
        accomodation: "Hotel 4 Nights".to_string(),
        transportation: "Qatar Airways".to_string(),
        eat: "Included as ltinerary".to_string(),
        day: 6,
        night: 4,
        date_trip: Utc.with_ymd_and_hms(2026, 12, 26, 1, 0, 0).unwrap(),
        price: 50_000,
        quota: 15,
        description: "Tasmania in summer".to_string(),
        image: "tassie.png".to_string(),
    }
}

/// In-memory store holding users 7 and 8 and trip 5.
pub async fn seeded_store() -> InMemoryStore {
    let store = InMemoryStore::new();
    store.insert_user(user(USER_ID)).await;
    store.insert_user(user(OTHER_USER_ID)).await;
    store.insert_trip(trip()).await;
    store
}

pub fn store_config() -> StoreConfig {
    StoreConfig {
        timeout: Duration::from_millis(200),
        max_attempts: 3,
        initial_backoff: Duration::ZERO,
    }
}

pub fn dispatcher(notifier: Arc<dyn CustomerNotifier>) -> NotificationDispatcher {
    NotificationDispatcher::new(
        notifier,
        RetryConfig::new(3, Duration::ZERO),
        Duration::from_millis(200),
    )
}

pub fn processor(
    store: Arc<dyn TransactionStore>,
    catalog: Arc<dyn CatalogReader>,
    notifier: Arc<dyn CustomerNotifier>,
) -> NotificationProcessor {
    NotificationProcessor::new(store, catalog, dispatcher(notifier), &store_config())
}

pub struct TestAppBuilder {
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn CustomerNotifier>,
    clock: NanoClock,
    gateway_timeout: Duration,
    catalog_stalls: u32,
}

impl TestAppBuilder {
    /// Makes the notification processor's first `stalls` user lookups hang.
    pub fn stalling_catalog(mut self, stalls: u32) -> Self {
        self.catalog_stalls = stalls;
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn CustomerNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn clock(mut self, clock: NanoClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    pub async fn build(self) -> TestApp {
        let store = seeded_store().await;
        let shared = Arc::new(store.clone());

        let transactions = TransactionService::new(
            shared.clone(),
            shared.clone(),
            self.gateway,
            OrderIdAllocator::with_clock(self.clock, 5),
            self.gateway_timeout,
        );
        let catalog = Arc::new(StallingCatalog::new(store.clone(), self.catalog_stalls));
        let notifications = processor(shared, catalog, self.notifier);

        let state = AppState::new(transactions, notifications, default_booking_offset());
        TestApp {
            router: create_routes(state.clone()),
            state,
            store,
        }
    }
}

/// Router over a seeded in-memory store with test doubles at the edges.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: InMemoryStore,
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            gateway: Arc::new(RecordingGateway::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            clock: system_clock(),
            gateway_timeout: Duration::from_secs(1),
            catalog_stalls: 0,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        user_id: Option<i64>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(id) = user_id {
            builder = builder.header(USER_ID_HEADER, id.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn post_raw(&self, uri: &str, body: &'static str) -> StatusCode {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap().status()
    }

    /// Creates an order for `user_id` on trip 5 and returns its id.
    pub async fn create_order(&self, user_id: i64) -> i64 {
        let (status, body) = self
            .request(
                Method::POST,
                "/transactions",
                Some(serde_json::json!({ "counter_qty": 2, "total": 100000, "trip_id": TRIP_ID })),
                Some(user_id),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create failed: {}", body);
        body["data"]["id"].as_i64().unwrap()
    }

    pub async fn status_of(&self, id: i64) -> Option<TransactionStatus> {
        self.store.get(id).await.unwrap().map(|t| t.status)
    }
}
