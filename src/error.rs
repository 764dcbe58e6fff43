//! Error types for the kube-plex webhook

use thiserror::Error;

/// Main error type for webhook operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Required configuration could not be resolved from annotations or volumes
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The resolved PMS container does not exist in the pod
    #[error("container {0:?} not found")]
    ContainerNotFound(String),

    /// A patch value could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TLS material could not be loaded
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// The HTTPS server stopped with an error
    #[error("server error: {0}")]
    Server(String),
}

impl Error {
    /// Create a configuration error with the given message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a container-not-found error for the given container name
    pub fn container_not_found(name: impl Into<String>) -> Self {
        Self::ContainerNotFound(name.into())
    }

    /// Create a TLS error with the given message
    pub fn tls(msg: impl Into<String>) -> Self {
        Self::Tls(msg.into())
    }

    /// Create a server error with the given message
    pub fn server(msg: impl Into<String>) -> Self {
        Self::Server(msg.into())
    }
}
