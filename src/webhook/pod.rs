//! Pod Mutation Webhook
//!
//! Handles AdmissionReview requests for Pods. Opted-in pods are patched to run
//! kube-plex in place of the Plex transcoder; everything else is admitted
//! unchanged.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use kube::core::{
    admission::{AdmissionRequest, AdmissionResponse, AdmissionReview},
    DynamicObject, TypeMeta,
};
use tracing::{debug, error, info, warn};

use crate::mutation::{build_patch, should_mutate, PlexConfig};

use super::WebhookState;

/// API version of the AdmissionReview envelopes this webhook answers with
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";

/// Kind of the admission envelope
pub const ADMISSION_REVIEW_KIND: &str = "AdmissionReview";

/// Error type for webhook operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The request body was empty
    #[error("empty body")]
    EmptyBody,

    /// The request was not sent as JSON
    #[error("invalid content type {0:?}, expected application/json")]
    UnsupportedMediaType(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::EmptyBody => StatusCode::BAD_REQUEST,
            WebhookError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        };

        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// Handle mutating admission review for Pods
///
/// Transport problems (empty body, wrong content type) are answered with an
/// HTTP error. Anything that parses far enough to be an AdmissionReview is
/// answered with an AdmissionReview, denying the pod when it cannot be
/// mutated as requested.
pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return WebhookError::EmptyBody.into_response();
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !is_json(content_type) {
        warn!(content_type = %content_type, "Rejecting admission request");
        return WebhookError::UnsupportedMediaType(content_type.to_string()).into_response();
    }

    let request = match state.decoder.decode_review(&body) {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to parse admission request");
            return Json(into_v1_review(AdmissionResponse::invalid(e.to_string())))
                .into_response();
        }
    };

    let response = mutate_pod(&state, &request);
    Json(into_v1_review(response)).into_response()
}

/// Wrap a response in an `admission.k8s.io/v1` AdmissionReview
///
/// Responses not derived from a request (decode failures) would otherwise
/// carry kube's default `v1beta1` type.
fn into_v1_review(response: AdmissionResponse) -> AdmissionReview<DynamicObject> {
    let mut review = response.into_review();
    review.types = TypeMeta {
        api_version: ADMISSION_API_VERSION.to_string(),
        kind: ADMISSION_REVIEW_KIND.to_string(),
    };
    review
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|media| media.trim().eq_ignore_ascii_case("application/json"))
}

/// Process a single pod mutation request
fn mutate_pod(
    state: &WebhookState,
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let uid = request.uid.clone();
    let namespace = request.namespace.clone().unwrap_or_default();

    info!(
        uid = %uid,
        kind = %request.kind.kind,
        namespace = %namespace,
        name = %request.name,
        "AdmissionReview received"
    );

    let pod = match state.decoder.decode_pod(request) {
        Ok(Some(pod)) => pod,
        Ok(None) => {
            debug!(uid = %uid, "Not a pod, allowing unchanged");
            return AdmissionResponse::from(request);
        }
        Err(e) => {
            error!(uid = %uid, error = %e, "Failed to decode pod");
            return AdmissionResponse::from(request)
                .deny(format!("could not unmarshal pod: {e}"));
        }
    };

    if !should_mutate(&pod) {
        debug!(
            uid = %uid,
            pod = ?pod.metadata.name,
            "kube-plex not enabled, allowing unchanged"
        );
        return AdmissionResponse::from(request);
    }

    info!(uid = %uid, pod = ?pod.metadata.name, namespace = %namespace, "Mutating pod");

    let cfg = match PlexConfig::resolve(&pod, &namespace) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(uid = %uid, error = %e, "Failed to resolve kube-plex config");
            return AdmissionResponse::from(request).deny(e.to_string());
        }
    };

    let ops = match build_patch(&pod, &cfg) {
        Ok(ops) => ops,
        Err(e) => {
            warn!(uid = %uid, error = %e, "Failed to build patch");
            return AdmissionResponse::from(request)
                .deny(format!("could not create patch: {e}"));
        }
    };

    info!(
        uid = %uid,
        pms_container = %cfg.pms_container,
        transcode_pvc = %cfg.transcode_pvc,
        patch_ops = ops.len(),
        "Applying patch to pod"
    );

    match AdmissionResponse::from(request).with_patch(json_patch::Patch(ops)) {
        Ok(response) => response,
        Err(e) => {
            error!(uid = %uid, error = %e, "Failed to serialize patch");
            AdmissionResponse::from(request).deny(format!("patch serialization error: {e}"))
        }
    }
}
