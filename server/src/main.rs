use axum::Router;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use tourpay_server::config::Config;
use tourpay_server::gateway::{PaymentGateway, SnapGateway};
use tourpay_server::notifier::{
    CustomerNotifier, LogNotifier, MailRelayNotifier, NotificationDispatcher,
};
use tourpay_server::routes::create_routes;
use tourpay_server::services::{NotificationProcessor, OrderIdAllocator, TransactionService};
use tourpay_server::store::PgStore;
use tourpay_server::utils::retry::RetryConfig;
use tourpay_server::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tourpay_server=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    if config.gateway.server_key.is_empty() {
        tracing::warn!("GATEWAY_SERVER_KEY is not set, payment sessions will be rejected");
    }

    let store = Arc::new(PgStore::new(pool));
    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(SnapGateway::new(&config.gateway).expect("Failed to build gateway client"));

    let notifier: Arc<dyn CustomerNotifier> = match &config.notifier.relay_url {
        Some(url) => Arc::new(
            MailRelayNotifier::new(url.clone(), &config.notifier)
                .expect("Failed to build mail relay client"),
        ),
        None => {
            tracing::warn!("MAIL_RELAY_URL is not set, customer notices will only be logged");
            Arc::new(LogNotifier)
        }
    };
    let dispatcher = NotificationDispatcher::new(
        notifier,
        RetryConfig::new(
            config.notifier.max_attempts,
            config.notifier.initial_backoff,
        ),
        config.notifier.timeout,
    );

    let transactions = TransactionService::new(
        store.clone(),
        store.clone(),
        gateway,
        OrderIdAllocator::new(config.order_id_max_attempts),
        config.gateway.timeout,
    );

    let mut notifications =
        NotificationProcessor::new(store.clone(), store, dispatcher, &config.store);
    if config.gateway.verify_signature {
        notifications = notifications.with_signature_key(config.gateway.server_key.clone());
        tracing::info!("Gateway notification signatures will be verified");
    }

    let state = AppState::new(transactions, notifications, config.booking_offset);
    let app: Router = create_routes(state);

    tracing::info!("🚀 Server running at http://{}", config.bind_addr);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
