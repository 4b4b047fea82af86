//! # Notify API
//!
//! Builds the axum router that receives the gateway's asynchronous
//! notifications. All endpoints share application state through axum's
//! `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path              | Description                              |
//! |--------|-------------------|------------------------------------------|
//! | POST   | notify path       | Verify and acknowledge a notification    |
//! | GET    | notify path       | Empty 200, for reachability checks       |
//! | GET    | `/health`         | Liveness probe                           |
//! | GET    | `/metrics`        | Prometheus metrics                       |
//!
//! The notify path defaults to `/notify` and is set at router construction.

use axum::{
    extract::{FromRef, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use upacp_protocol::config::{FIELD_ORDER_ID, FIELD_RESP_CODE, FIELD_SIGNATURE};
use upacp_protocol::encoding::parse_form;
use upacp_protocol::Signer;

use crate::metrics::{self, RejectReason, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Verifies notifications against the gateway certificate.
    pub signer: Arc<Signer>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl FromRef<AppState> for SharedMetrics {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.metrics)
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with the notify route, CORS, and tracing.
pub fn create_router(state: AppState, notify_path: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route(notify_path, get(notify_probe_handler).post(notify_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics::metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Acknowledgement returned for a verified notification.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotifyAck {
    pub status: String,
    pub code: i32,
}

impl NotifyAck {
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
            code: 0,
        }
    }
}

/// Generic error body returned by endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorResponse { error: error.into() })).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "version": state.version,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

/// `GET <notify path>`: empty 200.
async fn notify_probe_handler() -> StatusCode {
    StatusCode::OK
}

/// `POST <notify path>`: verify a gateway notification.
///
/// The body is form-encoded; repeated keys keep their last value. A body
/// without `signature` is a 400, a signature that does not verify is a
/// 401. Nothing from a rejected notification is logged beyond its order id.
async fn notify_handler(State(state): State<AppState>, body: String) -> Response {
    state.metrics.notifications_received_total.inc();

    let fields = parse_form(&body);
    let order_id = fields.get_str(FIELD_ORDER_ID).unwrap_or("-").to_string();

    if fields.get_non_empty(FIELD_SIGNATURE).is_none() {
        tracing::warn!(order_id = %order_id, "notification without signature");
        state.metrics.record_rejection(RejectReason::MissingSignature);
        return error_response(StatusCode::BAD_REQUEST, "missing signature");
    }

    match state.signer.verify(fields) {
        Ok(verified) => {
            state.metrics.notifications_accepted_total.inc();
            tracing::info!(
                order_id = %order_id,
                txn_type = verified.get_str("txnType").unwrap_or("-"),
                resp_code = verified.get_str(FIELD_RESP_CODE).unwrap_or("-"),
                "notification accepted"
            );
            (StatusCode::OK, Json(NotifyAck::ok())).into_response()
        }
        Err(e) => {
            tracing::warn!(order_id = %order_id, error = %e, "notification rejected");
            state.metrics.record_rejection(RejectReason::BadSignature);
            error_response(StatusCode::UNAUTHORIZED, e.to_string())
        }
    }
}
