//! Pod mutation for kube-plex
//!
//! Three pure stages turn an admitted pod into a JSON patch:
//! - [`should_mutate`] - opt-in gate on the `kube-plex.io/enabled` annotation
//! - [`PlexConfig::resolve`] - annotations and volume heuristics into a config
//! - [`build_patch`] - ordered JSON patch operations against the original pod
//!
//! None of the stages touch shared state, so they can run concurrently for any
//! number of admission requests.

mod config;
mod patch;

pub use config::PlexConfig;
pub use patch::{
    build_patch, BINARY_MOUNT_PATH, BINARY_VOLUME_NAME, INIT_CONTAINER_NAME, TRANSCODER_PATH,
};

use k8s_openapi::api::core::v1::Pod;

use crate::ANNOTATION_ENABLED;

/// Check whether a pod opted in to kube-plex injection
///
/// Returns true only when `kube-plex.io/enabled` is present and equals `"true"`
/// ignoring case.
pub fn should_mutate(pod: &Pod) -> bool {
    pod.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_ENABLED))
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
}


#[cfg(test)]
mod tests {
    use super::fixtures::{container, pod};
    use super::*;

    #[test]
    fn enabled_true_mutates() {
        let p = pod(&[(ANNOTATION_ENABLED, "true")], vec![], vec![]);
        assert!(should_mutate(&p));
    }

    #[test]
    fn enabled_is_case_insensitive() {
        for value in ["TRUE", "True", "tRuE"] {
            let p = pod(&[(ANNOTATION_ENABLED, value)], vec![], vec![]);
            assert!(should_mutate(&p), "{value} should enable mutation");
        }
    }

    #[test]
    fn other_values_do_not_mutate() {
        for value in ["false", "yes", "1", "", " true", "true "] {
            let p = pod(&[(ANNOTATION_ENABLED, value)], vec![], vec![]);
            assert!(!should_mutate(&p), "{value:?} should not enable mutation");
        }
    }

    #[test]
    fn missing_annotations_do_not_mutate() {
        let p = pod(&[], vec![container("plex", "plexinc/pms:1")], vec![]);
        assert!(p.metadata.annotations.is_none());
        assert!(!should_mutate(&p));

        let p = pod(&[("kube-plex.io/transcode-pvc", "tc1")], vec![], vec![]);
        assert!(!should_mutate(&p));
    }

    #[test]
    fn default_pod_does_not_mutate() {
        assert!(!should_mutate(&Pod::default()));
    }
}
