use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use vivah_shared::{HealthCheck, HealthResponse, HealthStatus};

use crate::AppState;

/// Health check that pings Postgres and the RabbitMQ connection.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let database = match state.engine.store().ping() {
        Ok(()) => HealthCheck::healthy("postgres"),
        Err(e) => HealthCheck::unhealthy("postgres", e.to_string()),
    };
    let broker = if state.rabbitmq.is_connected() {
        HealthCheck::healthy("rabbitmq")
    } else {
        HealthCheck {
            name: "rabbitmq".to_string(),
            status: HealthStatus::Degraded,
            message: Some("connection closed; notifications and audit events are dropped".to_string()),
        }
    };

    let response = HealthResponse::healthy("vivah-access", env!("CARGO_PKG_VERSION"))
        .with_checks(vec![database, broker]);

    let status = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(response)).into_response()
}

/// Returns Prometheus metrics.
pub async fn metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
