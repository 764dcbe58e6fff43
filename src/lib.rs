//! kube-plex webhook - mutating admission webhook for Plex Media Server pods
//!
//! Pods annotated with `kube-plex.io/enabled: "true"` are rewritten so that the
//! `kube-plex` binary replaces the Plex transcoder inside the PMS container. The
//! webhook adds a shared volume, an init container that copies the binary, a
//! post-start hook that swaps it in, and environment variables describing the
//! storage and service topology kube-plex needs to launch transcode pods.
//!
//! # Modules
//!
//! - [`mutation`] - Mutation gate, config resolution and JSON patch construction
//! - [`webhook`] - AdmissionReview adapter and HTTP routes
//! - [`server`] - TLS listener with graceful shutdown
//! - [`error`] - Error types for the webhook

#![deny(missing_docs)]

pub mod error;
pub mod mutation;
pub mod server;
pub mod webhook;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Annotations
// =============================================================================

/// Opt-in annotation; mutation happens only when set to `"true"`
pub const ANNOTATION_ENABLED: &str = "kube-plex.io/enabled";

/// Name of the PMS service, or a full URL to reach PMS
pub const ANNOTATION_PMS_SERVICE: &str = "kube-plex.io/pms-service";

/// PVC holding the media library
pub const ANNOTATION_DATA_PVC: &str = "kube-plex.io/data-pvc";

/// PVC holding the Plex configuration
pub const ANNOTATION_CONFIG_PVC: &str = "kube-plex.io/config-pvc";

/// PVC used as transcode scratch space (required)
pub const ANNOTATION_TRANSCODE_PVC: &str = "kube-plex.io/transcode-pvc";

/// Name of the container running Plex Media Server
pub const ANNOTATION_PMS_CONTAINER: &str = "kube-plex.io/pms-container";

/// Image used for transcode pods
pub const ANNOTATION_PMS_IMAGE: &str = "kube-plex.io/pms-image";

/// Image that ships the kube-plex binary
pub const ANNOTATION_KUBE_PLEX_IMAGE: &str = "kube-plex.io/kube-plex-image";

// =============================================================================
// Default Configuration Constants
// =============================================================================

/// Default image for the kube-plex init container
pub const DEFAULT_KUBE_PLEX_IMAGE: &str = "ghcr.io/adamjacobmuller/kube-plex:latest";

/// Port Plex Media Server listens on inside the cluster
pub const DEFAULT_PMS_PORT: u16 = 32400;

/// Default port for the webhook HTTPS server
pub const DEFAULT_WEBHOOK_PORT: u16 = 8443;
