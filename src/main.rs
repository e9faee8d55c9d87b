//! rangehubd - Range Hub global coordination daemon.
//!
//! Thin binary wrapper: loads configuration, wires up state, and serves the
//! API. All behavior lives in the `rangehubd` library crate.

use std::sync::Arc;

use rangehubd::config::Config;
use rangehubd::security::secret::{is_weak_secret, MIN_TOKEN_SECRET_LEN};
use rangehubd::server::{self, AppState};
use rangehubd::{http, metrics};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "rangehub.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        server = %config.server.name,
        accounts = config.accounts.len(),
        sites = config.sites.len(),
        "Starting rangehubd"
    );

    // SECURITY: Refuse to start with a weak token secret. Every bearer token
    // in the deployment is signed with it; a guessable secret makes tokens
    // forgeable.
    if is_weak_secret(&config.security.token_secret) {
        if std::env::var("RANGEHUB_ALLOW_INSECURE_SECRET").is_ok() {
            tracing::warn!(
                "INSECURE: Running with a weak token_secret (allowed via RANGEHUB_ALLOW_INSECURE_SECRET)"
            );
        } else {
            error!("FATAL: Insecure token_secret detected!");
            error!("  The token_secret signs every bearer token issued by this hub.");
            error!("  A short or placeholder secret makes user tokens forgeable.");
            error!("");
            error!("  To fix, set a strong secret in {config_path}:");
            error!("    [security]");
            error!("    token_secret = \"<random string, at least {MIN_TOKEN_SECRET_LEN} chars>\"");
            error!("");
            error!("  Generate a secure secret with:");
            error!("    openssl rand -hex 32");
            error!("");
            error!("  For testing only, set RANGEHUB_ALLOW_INSECURE_SECRET=1 to bypass this check.");
            return Err(anyhow::anyhow!(
                "Refusing to start with an insecure token_secret. See error messages above."
            ));
        }
    }

    let state = Arc::new(AppState::from_config(&config)?);

    // Prometheus metrics are optional.
    // Convention: metrics_port = 0 disables the HTTP endpoint (used by tests).
    let metrics_port = config.server.metrics_port.unwrap_or(9090);
    if metrics_port == 0 {
        info!("Metrics disabled");
    } else {
        metrics::init();
        info!("Metrics initialized");

        tokio::spawn(async move {
            http::run_metrics_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    let listener = tokio::net::TcpListener::bind(config.server.listen).await?;
    info!(addr = %config.server.listen, "API listening");

    server::serve(state, listener).await?;

    Ok(())
}
