//! kube-plex webhook - injects kube-plex into Plex Media Server pods

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kube_plex_webhook::server::{serve, ServerConfig};
use kube_plex_webhook::webhook::{AdmissionDecoder, WebhookState};
use kube_plex_webhook::DEFAULT_WEBHOOK_PORT;

/// kube-plex mutating admission webhook
#[derive(Parser, Debug)]
#[command(
    name = "kube-plex-webhook",
    version,
    about,
    long_about = None,
    after_help = "Command-line flags take precedence over WEBHOOK_PORT, TLS_CERT_FILE and \
                  TLS_KEY_FILE; the environment only replaces the built-in defaults."
)]
struct Cli {
    /// Webhook server port (the flag wins over WEBHOOK_PORT)
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = DEFAULT_WEBHOOK_PORT)]
    port: u16,

    /// TLS certificate file (the flag wins over TLS_CERT_FILE)
    #[arg(long = "cert", env = "TLS_CERT_FILE", default_value = "/etc/webhook/certs/tls.crt")]
    cert_file: PathBuf,

    /// TLS key file (the flag wins over TLS_KEY_FILE)
    #[arg(long = "key", env = "TLS_KEY_FILE", default_value = "/etc/webhook/certs/tls.key")]
    key_file: PathBuf,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long, default_value = "10")]
    shutdown_timeout_secs: u64,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            addr: SocketAddr::from(([0, 0, 0, 0], self.port)),
            cert_file: self.cert_file.clone(),
            key_file: self.key_file.clone(),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install crypto provider: {:?}", e);
        std::process::exit(1);
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let state = Arc::new(WebhookState::new(AdmissionDecoder::new()));

    serve(cli.server_config(), state)
        .await
        .map_err(|e| anyhow::anyhow!("webhook server failed: {}", e))
}
