use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, with_security_headers};
use crate::handlers::health_check;
use crate::handlers::transactions::{
    create_transaction, delete_transaction, get_transaction, handle_notification,
    list_my_transactions, list_transactions, refresh_token,
};
use crate::AppState;

pub fn create_routes(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route(
            "/transactions",
            get(list_transactions).post(create_transaction),
        )
        .route("/transactions/me", get(list_my_transactions))
        .route("/transactions/notify", post(handle_notification))
        .route(
            "/transactions/:id",
            get(get_transaction)
                .patch(refresh_token)
                .delete(delete_transaction),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    with_security_headers(router).layer(create_cors_layer())
}
