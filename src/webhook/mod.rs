//! Mutating Admission Webhook for kube-plex
//!
//! This module exposes the HTTP surface of the webhook:
//! - POST /mutate - AdmissionReview for Pods, answered with a JSON patch
//! - GET /healthz, GET /readyz - liveness and readiness probes
//!
//! Decoding of the AdmissionReview envelope is done by an [`AdmissionDecoder`]
//! that is built once at startup and shared through [`WebhookState`].

pub mod decoder;
pub mod pod;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

pub use decoder::AdmissionDecoder;

/// Shared state for webhook handlers
#[derive(Clone, Debug, Default)]
pub struct WebhookState {
    /// Decoder for AdmissionReview bodies and the Pods they carry
    pub decoder: AdmissionDecoder,
}

impl WebhookState {
    /// Create a new webhook state with the given decoder
    pub fn new(decoder: AdmissionDecoder) -> Self {
        Self { decoder }
    }
}

/// Create the webhook router with the mutation and probe endpoints
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate", post(pod::mutate_handler))
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(|| async { "ok" }))
        .with_state(state)
}
