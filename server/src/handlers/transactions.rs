use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tracing::warn;

use crate::handlers::auth::AuthUser;
use crate::models::{CreateTransactionRequest, TransactionDetails, TransactionResponse};
use crate::utils::error::AppError;
use crate::utils::response::{empty_success, success};
use crate::AppState;

fn order_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    path.map(|Path(id)| id).map_err(|e| {
        AppError::ValidationError(format!("Invalid transaction id: {}", e.body_text()))
    })
}

fn render(state: &AppState, details: TransactionDetails) -> TransactionResponse {
    TransactionResponse::from_details(details, state.booking_offset)
}

fn render_all(state: &AppState, all: Vec<TransactionDetails>) -> Vec<TransactionResponse> {
    all.into_iter().map(|details| render(state, details)).collect()
}

pub async fn create_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let details = state.transactions.create(user.id, request).await?;
    Ok(success(render(&state, details), "Transaction created").into_response())
}

pub async fn refresh_token(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError> {
    let details = state.transactions.refresh_token(order_id(path)?).await?;
    Ok(success(render(&state, details), "Payment token refreshed").into_response())
}

pub async fn get_transaction(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError> {
    let details = state.transactions.get(order_id(path)?).await?;
    Ok(success(render(&state, details), "Transaction retrieved").into_response())
}

pub async fn list_transactions(State(state): State<AppState>) -> Result<Response, AppError> {
    let all = state.transactions.list().await?;
    Ok(success(render_all(&state, all), "Transactions retrieved").into_response())
}

pub async fn list_my_transactions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let all = state.transactions.list_for_user(user.id).await?;
    Ok(success(render_all(&state, all), "Transactions retrieved").into_response())
}

pub async fn delete_transaction(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, AppError> {
    let details = state.transactions.delete(order_id(path)?).await?;
    Ok(success(render(&state, details), "Transaction deleted").into_response())
}

/// Gateway callback. Always acknowledged with 200 so the gateway stops
/// redelivering; failures are dead-lettered by the processor.
pub async fn handle_notification(State(state): State<AppState>, body: Bytes) -> Response {
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Gateway notification is not JSON");
            Value::String(String::from_utf8_lossy(&body).into_owned())
        }
    };

    // Runs detached so a dropped request cannot stop a callback half way.
    let processor = state.notifications.clone();
    let processing = tokio::spawn(async move { processor.handle_raw(payload).await });
    match processing.await {
        Ok(outcome) => tracing::debug!(?outcome, "Gateway notification processed"),
        Err(e) => tracing::error!(error = %e, "Gateway notification processing aborted"),
    }

    empty_success("Notification received").into_response()
}
