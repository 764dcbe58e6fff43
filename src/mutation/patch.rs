//! JSON patch construction for kube-plex injection
//!
//! Every operation is computed against the pod as it was submitted. The
//! builder only ever adds elements, so container indices taken from the
//! submitted pod stay valid for the whole patch.
//!
//! JSON Patch cannot append (`/-`) to an array that does not exist yet. When
//! the target list is absent or empty the first element is written as a
//! whole-array `add` instead; see [`append_to_array`].

use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, PatchOperation, ReplaceOperation};
use k8s_openapi::api::core::v1::{
    Container, EmptyDirVolumeSource, EnvVar, EnvVarSource, ExecAction, Lifecycle,
    LifecycleHandler, ObjectFieldSelector, Pod, PodSpec, Volume, VolumeMount,
};
use serde_json::Value;

use super::PlexConfig;
use crate::{Error, Result, DEFAULT_PMS_PORT};

/// Volume shared between the init container and PMS
pub const BINARY_VOLUME_NAME: &str = "kube-plex-binary";

/// Mount path of the shared binary volume in every container
pub const BINARY_MOUNT_PATH: &str = "/shared";

/// Name of the init container that copies the kube-plex binary
pub const INIT_CONTAINER_NAME: &str = "kube-plex-init";

/// Transcoder executable inside the PMS image that kube-plex replaces
pub const TRANSCODER_PATH: &str = "/usr/lib/plexmediaserver/Plex Transcoder";

/// Build the ordered JSON patch that injects kube-plex into `pod`
///
/// Operations are emitted in a fixed order:
/// 1. shared `emptyDir` volume
/// 2. `kube-plex-init` init container
/// 3. volume mount on the PMS container
/// 4. post-start hook that swaps the transcoder
/// 5. environment variables, one operation each
///
/// Fails without emitting anything if `cfg.pms_container` is not in the pod.
pub fn build_patch(pod: &Pod, cfg: &PlexConfig) -> Result<Vec<PatchOperation>> {
    let empty = PodSpec::default();
    let spec = pod.spec.as_ref().unwrap_or(&empty);

    let (index, pms) = spec
        .containers
        .iter()
        .enumerate()
        .find(|(_, c)| c.name == cfg.pms_container)
        .ok_or_else(|| Error::container_not_found(&cfg.pms_container))?;
    let index = index.to_string();
    let container_field = |field: &'static str| ["spec", "containers", index.as_str(), field];

    let mut ops = Vec::new();

    ops.push(append_to_array(
        &["spec", "volumes"],
        is_empty(&spec.volumes),
        serde_json::to_value(binary_volume())?,
    ));

    ops.push(append_to_array(
        &["spec", "initContainers"],
        is_empty(&spec.init_containers),
        serde_json::to_value(init_container(cfg))?,
    ));

    ops.push(append_to_array(
        &container_field("volumeMounts"),
        is_empty(&pms.volume_mounts),
        serde_json::to_value(binary_mount())?,
    ));

    ops.push(lifecycle_operation(
        PointerBuf::from_tokens(container_field("lifecycle")),
        pms.lifecycle.as_ref(),
    )?);

    // The first append creates the env list; the rest go through `/-`.
    let mut env_empty = is_empty(&pms.env);
    for var in env_vars(cfg) {
        ops.push(append_to_array(
            &container_field("env"),
            env_empty,
            serde_json::to_value(var)?,
        ));
        env_empty = false;
    }

    Ok(ops)
}

/// Add `value` to the array at `path`
///
/// An empty array is written whole as `[value]`, otherwise `value` is appended
/// through the `-` pointer token.
fn append_to_array(path: &[&str], array_empty: bool, value: Value) -> PatchOperation {
    let mut path = PointerBuf::from_tokens(path.iter().copied());
    let value = if array_empty {
        Value::Array(vec![value])
    } else {
        path.push_back("-");
        value
    };
    PatchOperation::Add(AddOperation { path, value })
}

fn is_empty<T>(list: &Option<Vec<T>>) -> bool {
    list.as_ref().map_or(true, Vec::is_empty)
}

fn binary_volume() -> Volume {
    Volume {
        name: BINARY_VOLUME_NAME.to_string(),
        empty_dir: Some(EmptyDirVolumeSource::default()),
        ..Default::default()
    }
}

fn binary_mount() -> VolumeMount {
    VolumeMount {
        name: BINARY_VOLUME_NAME.to_string(),
        mount_path: BINARY_MOUNT_PATH.to_string(),
        ..Default::default()
    }
}

fn init_container(cfg: &PlexConfig) -> Container {
    Container {
        name: INIT_CONTAINER_NAME.to_string(),
        image: Some(cfg.kube_plex_image.clone()),
        command: Some(vec![
            "cp".to_string(),
            "/kube-plex".to_string(),
            format!("{BINARY_MOUNT_PATH}/kube-plex"),
        ]),
        volume_mounts: Some(vec![binary_mount()]),
        ..Default::default()
    }
}

/// Shell command that waits for PMS to unpack its transcoder, then overwrites it
fn replace_transcoder_command() -> Vec<String> {
    vec![
        "/bin/sh".to_string(),
        "-c".to_string(),
        format!(
            r#"until [ -f "{TRANSCODER_PATH}" ]; do sleep 1; done; cp "{BINARY_MOUNT_PATH}/kube-plex" "{TRANSCODER_PATH}""#
        ),
    ]
}

/// Install the post-start hook, keeping any pre-stop hook the container has
///
/// `lifecycle` is a single object, so an existing one is replaced with a merged
/// copy rather than appended to.
fn lifecycle_operation(path: PointerBuf, existing: Option<&Lifecycle>) -> Result<PatchOperation> {
    let post_start = LifecycleHandler {
        exec: Some(ExecAction {
            command: Some(replace_transcoder_command()),
        }),
        ..Default::default()
    };

    let op = match existing {
        Some(current) => {
            let merged = Lifecycle {
                post_start: Some(post_start),
                ..current.clone()
            };
            PatchOperation::Replace(ReplaceOperation {
                path,
                value: serde_json::to_value(merged)?,
            })
        }
        None => {
            let lifecycle = Lifecycle {
                post_start: Some(post_start),
                ..Default::default()
            };
            PatchOperation::Add(AddOperation {
                path,
                value: serde_json::to_value(lifecycle)?,
            })
        }
    };
    Ok(op)
}

fn env_vars(cfg: &PlexConfig) -> Vec<EnvVar> {
    let literal = |name: &str, value: &str| EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        ..Default::default()
    };

    let mut vars = vec![
        literal("PMS_IMAGE", &cfg.pms_image),
        literal("TRANSCODE_PVC", &cfg.transcode_pvc),
        EnvVar {
            name: "KUBE_NAMESPACE".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    field_path: "metadata.namespace".to_string(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
    ];

    if !cfg.data_pvc.is_empty() {
        vars.push(literal("DATA_PVC", &cfg.data_pvc));
    }
    if !cfg.config_pvc.is_empty() {
        vars.push(literal("CONFIG_PVC", &cfg.config_pvc));
    }
    if let Some(address) = pms_internal_address(cfg) {
        vars.push(literal("PMS_INTERNAL_ADDRESS", &address));
    }

    vars
}

/// Address kube-plex uses to reach PMS from transcode pods
///
/// A value that already carries a scheme is used as-is; a bare service name
/// becomes its cluster-local DNS name on the PMS port.
fn pms_internal_address(cfg: &PlexConfig) -> Option<String> {
    let service = cfg.pms_service.as_str();
    if service.is_empty() {
        None
    } else if service.contains("://") {
        Some(service.to_string())
    } else {
        Some(format!(
            "http://{}.{}.svc:{}",
            service, cfg.namespace, DEFAULT_PMS_PORT
        ))
    }
}
