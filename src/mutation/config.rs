//! Configuration resolution from pod annotations
//!
//! Annotations always win. PVC names that were not annotated are picked up from
//! pod volumes named `data`, `config` or `transcode` (case-insensitive) that are
//! backed by a PersistentVolumeClaim.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Pod;

use crate::{
    Error, Result, ANNOTATION_CONFIG_PVC, ANNOTATION_DATA_PVC, ANNOTATION_KUBE_PLEX_IMAGE,
    ANNOTATION_PMS_CONTAINER, ANNOTATION_PMS_IMAGE, ANNOTATION_PMS_SERVICE,
    ANNOTATION_TRANSCODE_PVC, DEFAULT_KUBE_PLEX_IMAGE,
};

/// kube-plex settings resolved for a single pod
///
/// Empty strings mean "not configured" and cause the corresponding
/// environment variable to be omitted from the patch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlexConfig {
    /// PMS service name or full URL
    pub pms_service: String,
    /// Media library PVC
    pub data_pvc: String,
    /// Plex configuration PVC
    pub config_pvc: String,
    /// Transcode scratch PVC, always set after resolution
    pub transcode_pvc: String,
    /// Name of the container running PMS
    pub pms_container: String,
    /// Image for transcode pods
    pub pms_image: String,
    /// Image shipping the kube-plex binary
    pub kube_plex_image: String,
    /// Namespace of the admission request
    pub namespace: String,
}

impl PlexConfig {
    /// Resolve the configuration for `pod` admitted into `namespace`
    ///
    /// Fails when no transcode PVC can be found, since kube-plex cannot
    /// launch transcode jobs without shared scratch space.
    pub fn resolve(pod: &Pod, namespace: &str) -> Result<Self> {
        let empty = BTreeMap::new();
        let annotations = pod.metadata.annotations.as_ref().unwrap_or(&empty);
        let annotation = |key: &str| annotations.get(key).cloned().unwrap_or_default();

        let mut cfg = Self {
            pms_service: annotation(ANNOTATION_PMS_SERVICE),
            data_pvc: annotation(ANNOTATION_DATA_PVC),
            config_pvc: annotation(ANNOTATION_CONFIG_PVC),
            transcode_pvc: annotation(ANNOTATION_TRANSCODE_PVC),
            namespace: namespace.to_string(),
            ..Default::default()
        };

        if cfg.data_pvc.is_empty() || cfg.config_pvc.is_empty() || cfg.transcode_pvc.is_empty() {
            cfg.detect_pvcs(pod);
        }

        if cfg.transcode_pvc.is_empty() {
            return Err(Error::configuration(format!(
                "transcode PVC is required: set {} annotation",
                ANNOTATION_TRANSCODE_PVC
            )));
        }

        let containers = pod
            .spec
            .as_ref()
            .map(|s| s.containers.as_slice())
            .unwrap_or_default();

        cfg.pms_container = annotation(ANNOTATION_PMS_CONTAINER);
        if cfg.pms_container.is_empty() {
            if let Some(first) = containers.first() {
                cfg.pms_container = first.name.clone();
            }
        }

        cfg.pms_image = annotation(ANNOTATION_PMS_IMAGE);
        if cfg.pms_image.is_empty() {
            cfg.pms_image = containers
                .iter()
                .find(|c| c.name == cfg.pms_container)
                .and_then(|c| c.image.clone())
                .unwrap_or_default();
        }

        cfg.kube_plex_image = annotation(ANNOTATION_KUBE_PLEX_IMAGE);
        if cfg.kube_plex_image.is_empty() {
            cfg.kube_plex_image = DEFAULT_KUBE_PLEX_IMAGE.to_string();
        }

        Ok(cfg)
    }

    /// Fill unset PVC fields from PVC-backed volumes named after their role
    fn detect_pvcs(&mut self, pod: &Pod) {
        let volumes = pod.spec.as_ref().and_then(|s| s.volumes.as_deref());

        for volume in volumes.unwrap_or_default() {
            let Some(pvc) = &volume.persistent_volume_claim else {
                continue;
            };

            let slot = match volume.name.to_lowercase().as_str() {
                "data" => &mut self.data_pvc,
                "config" => &mut self.config_pvc,
                "transcode" => &mut self.transcode_pvc,
                _ => continue,
            };
            if slot.is_empty() {
                *slot = pvc.claim_name.clone();
            }
        }
    }
}
