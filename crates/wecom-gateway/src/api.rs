use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::{sync::Arc, time::Instant};
use tracing::error;

use crate::{
    message::CallbackQuery,
    metrics::GatewayMetrics,
    protocol::{CallbackError, CallbackService},
};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn CallbackService>,
    pub metrics: Arc<GatewayMetrics>,
}

// GET /callback?msg_signature=..&timestamp=..&nonce=..&echostr=..
pub async fn get_callback(State(state): State<AppState>, Query(query): Query<CallbackQuery>) -> Response {
    let start = Instant::now();

    let response = match state.service.verify_url(&query) {
        Ok(plain) => {
            state.metrics.record_outcome("verified");
            // Echo verbatim; the platform compares bytes.
            (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], plain).into_response()
        }
        Err(e) => error_response(&state.metrics, &e),
    };

    state.metrics.request_latency.observe(start.elapsed().as_secs_f64());
    response
}

// POST /callback?msg_signature=..&timestamp=..&nonce=..
pub async fn post_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    body: Bytes,
) -> Response {
    let start = Instant::now();

    let response = match state.service.handle_callback(&query, &body) {
        Ok(outcome) => {
            state.metrics.record_outcome(outcome.as_str());
            (StatusCode::OK, "success").into_response()
        }
        Err(e) => error_response(&state.metrics, &e),
    };

    state.metrics.request_latency.observe(start.elapsed().as_secs_f64());
    response
}

fn error_response(metrics: &GatewayMetrics, err: &CallbackError) -> Response {
    match err {
        CallbackError::SignatureInvalid => {
            metrics.record_outcome("rejected");
            (StatusCode::FORBIDDEN, "forbidden").into_response()
        }
        CallbackError::EnvelopeParse(_) | CallbackError::MessageParse(_) => {
            metrics.record_outcome("malformed");
            (StatusCode::BAD_REQUEST, "bad request").into_response()
        }
        CallbackError::Decrypt(_) => {
            metrics.record_outcome("failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}

// GET /health
pub async fn get_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// GET /metrics
pub async fn get_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.export_prometheus() {
        Ok(text) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], text).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
        }
    }
}
