//! # Prometheus Metrics
//!
//! Counters for the notify endpoint, scraped at `/metrics`.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Why a notification was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingSignature,
    BadSignature,
}

impl RejectReason {
    fn label(self) -> &'static str {
        match self {
            Self::MissingSignature => "missing_signature",
            Self::BadSignature => "bad_signature",
        }
    }
}

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Every POST to the notify path.
    pub notifications_received_total: IntCounter,
    /// Notifications whose signature verified.
    pub notifications_accepted_total: IntCounter,
    /// Notifications turned away, by `reason`.
    pub notifications_rejected_total: IntCounterVec,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("upacp".into()), None)?;

        let notifications_received_total = IntCounter::new(
            "notifications_received_total",
            "Total number of gateway notifications received",
        )?;
        registry.register(Box::new(notifications_received_total.clone()))?;

        let notifications_accepted_total = IntCounter::new(
            "notifications_accepted_total",
            "Total number of gateway notifications with a valid signature",
        )?;
        registry.register(Box::new(notifications_accepted_total.clone()))?;

        let notifications_rejected_total = IntCounterVec::new(
            Opts::new(
                "notifications_rejected_total",
                "Total number of gateway notifications rejected",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(notifications_rejected_total.clone()))?;

        Ok(Self {
            registry,
            notifications_received_total,
            notifications_accepted_total,
            notifications_rejected_total,
        })
    }

    pub fn record_rejection(&self, reason: RejectReason) {
        self.notifications_rejected_total
            .with_label_values(&[reason.label()])
            .inc();
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Shared metrics handle passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(State(metrics): State<SharedMetrics>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
