use axum::{response::IntoResponse, response::Response};
use serde::Serialize;

use crate::utils::response::success;

pub mod auth;
pub mod transactions;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "tourpay-api",
    };

    success(payload, "Health check successful").into_response()
}
