//! AdmissionReview decoding

use k8s_openapi::api::core::v1::Pod;
use kube::core::{
    admission::{AdmissionRequest, AdmissionReview},
    DynamicObject,
};

/// Failure to decode an admission request
///
/// Messages are the bare decoder errors; the handler adds its own context
/// before putting them in the AdmissionResponse.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The body is not an AdmissionReview with a request
    #[error("{0}")]
    InvalidReview(String),

    /// The object in the request is not a valid Pod
    #[error("{0}")]
    InvalidObject(String),
}

/// Kind of object this webhook mutates
pub const POD_KIND: &str = "Pod";

/// Decodes AdmissionReview bodies and extracts the Pods they carry
///
/// Built once at startup and shared read-only by every request.
#[derive(Clone, Debug)]
pub struct AdmissionDecoder {
    kind: String,
}

impl Default for AdmissionDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmissionDecoder {
    /// Create a decoder that accepts Pod admission requests
    pub fn new() -> Self {
        Self {
            kind: POD_KIND.to_string(),
        }
    }

    /// Parse a raw AdmissionReview body into its request
    pub fn decode_review(
        &self,
        body: &[u8],
    ) -> Result<AdmissionRequest<DynamicObject>, DecodeError> {
        let review: AdmissionReview<DynamicObject> = serde_json::from_slice(body)
            .map_err(|e| DecodeError::InvalidReview(e.to_string()))?;
        TryInto::<AdmissionRequest<DynamicObject>>::try_into(review)
            .map_err(|e| DecodeError::InvalidReview(e.to_string()))
    }

    /// Extract the Pod from a request
    ///
    /// Returns `Ok(None)` for other kinds and for requests without an object,
    /// both of which pass through the webhook unchanged.
    pub fn decode_pod(
        &self,
        request: &AdmissionRequest<DynamicObject>,
    ) -> Result<Option<Pod>, DecodeError> {
        if request.kind.kind != self.kind {
            return Ok(None);
        }
        let Some(object) = &request.object else {
            return Ok(None);
        };

        let value = serde_json::to_value(object)
            .map_err(|e| DecodeError::InvalidObject(e.to_string()))?;
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| DecodeError::InvalidObject(e.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{pod_object, review};
    use super::*;
    use serde_json::json;

    fn decode(body: serde_json::Value) -> AdmissionRequest<DynamicObject> {
        AdmissionDecoder::new()
            .decode_review(&serde_json::to_vec(&body).unwrap())
            .unwrap()
    }

    #[test]
    fn decodes_pod_review() {
        let object = pod_object(json!({"kube-plex.io/enabled": "true"}), json!([]));
        let request = decode(review("Pod", "media", object));
        assert_eq!(request.namespace.as_deref(), Some("media"));

        let pod = AdmissionDecoder::new().decode_pod(&request).unwrap().unwrap();
        assert_eq!(pod.metadata.name.as_deref(), Some("plex-0"));
        assert_eq!(pod.spec.unwrap().containers[0].name, "plex");
    }

    #[test]
    fn garbage_body_is_invalid_review() {
        let err = AdmissionDecoder::new().decode_review(b"not json").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidReview(_)));
    }

    #[test]
    fn review_without_request_is_invalid() {
        let body = json!({"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"});
        let err = AdmissionDecoder::new()
            .decode_review(&serde_json::to_vec(&body).unwrap())
            .unwrap_err();
        assert!(matches!(err, DecodeError::InvalidReview(_)));
    }

    #[test]
    fn other_kinds_are_skipped() {
        let object = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {"name": "plex-config"},
            "data": {"key": "value"}
        });
        let request = decode(review("ConfigMap", "media", object));
        assert!(AdmissionDecoder::new().decode_pod(&request).unwrap().is_none());
    }

    #[test]
    fn malformed_pod_is_invalid_object() {
        let object = json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "plex-0"},
            "spec": {"containers": "not-a-list"}
        });
        let request = decode(review("Pod", "media", object));
        let err = AdmissionDecoder::new().decode_pod(&request).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidObject(_)));
    }
}
