//! HTTPS server for the admission webhook
//!
//! The API server only talks to admission webhooks over TLS, so the router is
//! served through `axum-server` with a rustls config loaded from PEM files.
//! SIGINT or SIGTERM triggers a graceful shutdown.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use tracing::{error, info};

use crate::webhook::{webhook_router, WebhookState};
use crate::{Error, Result, DEFAULT_WEBHOOK_PORT};

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the server
    pub addr: SocketAddr,
    /// TLS certificate PEM file
    pub cert_file: PathBuf,
    /// TLS private key PEM file
    pub key_file: PathBuf,
    /// How long in-flight requests may take to finish after a shutdown signal
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_WEBHOOK_PORT)),
            cert_file: PathBuf::from("/etc/webhook/certs/tls.crt"),
            key_file: PathBuf::from("/etc/webhook/certs/tls.key"),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Serve the webhook until a shutdown signal arrives
pub async fn serve(config: ServerConfig, state: Arc<WebhookState>) -> Result<()> {
    let tls_config = load_tls(&config).await?;

    let handle = Handle::new();
    tokio::spawn(shutdown_on_signal(handle.clone(), config.shutdown_timeout));

    info!(addr = %config.addr, "Starting kube-plex webhook server");

    axum_server::bind_rustls(config.addr, tls_config)
        .handle(handle)
        .serve(webhook_router(state).into_make_service())
        .await
        .map_err(|e| Error::server(e.to_string()))?;

    info!("Webhook server stopped");
    Ok(())
}

async fn load_tls(config: &ServerConfig) -> Result<RustlsConfig> {
    RustlsConfig::from_pem_file(&config.cert_file, &config.key_file)
        .await
        .map_err(|e| {
            Error::tls(format!(
                "failed to load certificate {} and key {}: {}",
                config.cert_file.display(),
                config.key_file.display(),
                e
            ))
        })
}

async fn shutdown_on_signal(handle: Handle, timeout: Duration) {
    shutdown_signal().await;
    info!(timeout_secs = timeout.as_secs(), "Shutting down webhook server");
    handle.graceful_shutdown(Some(timeout));
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_deployment_layout() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), 8443);
        assert_eq!(config.cert_file, PathBuf::from("/etc/webhook/certs/tls.crt"));
        assert_eq!(config.key_file, PathBuf::from("/etc/webhook/certs/tls.key"));
    }

    #[tokio::test]
    async fn missing_certificate_is_tls_error() {
        let config = ServerConfig {
            cert_file: PathBuf::from("/nonexistent/tls.crt"),
            key_file: PathBuf::from("/nonexistent/tls.key"),
            ..Default::default()
        };

        let err = serve(config, Arc::new(WebhookState::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
        assert!(err.to_string().contains("/nonexistent/tls.crt"));
    }
}
