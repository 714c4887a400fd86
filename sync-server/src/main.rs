use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use sync::{ReconcileOptions, Reconciler};
use sync_core::{init_logging, ScimClient, SyncConfig};
use tracing::info;

mod app;
mod metrics;

use app::{router, AppState};
use metrics::SyncMetrics;

#[derive(Parser, Debug)]
#[command(name = "csv-sync-server", version)]
#[command(about = "HTTP endpoint that runs a CSV to SCIM user sync per invocation")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "CSV_SYNC_BIND", default_value = "0.0.0.0:8080")]
    bind: String,

    /// TOML configuration file
    #[arg(short, long, env = "CSV_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// SCIM base URL
    #[arg(long, env = "SCIM_ENDPOINT")]
    endpoint: Option<String>,

    /// Bearer token for the SCIM API
    #[arg(long, env = "SCIM_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    async fn resolve_config(&self) -> Result<SyncConfig> {
        let mut config = SyncConfig::load_or_default(self.config.as_ref())
            .await
            .context("Failed to load configuration")?;

        if let Some(endpoint) = &self.endpoint {
            config.directory.endpoint = endpoint.clone();
        }
        if let Some(token) = &self.token {
            config.directory.token = token.clone();
        }
        if let Some(level) = &self.log_level {
            config.telemetry.log_level = level.clone();
        }
        if self.json_logs {
            config.telemetry.json = true;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.resolve_config().await?;
    let _guard = init_logging(&config.telemetry)?;

    let client =
        ScimClient::from_config(&config.directory).context("Failed to create SCIM client")?;
    let reconciler = Reconciler::new(client, ReconcileOptions::from(&config.reconcile));
    let state = Arc::new(AppState::new(reconciler, SyncMetrics::new()?));

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    info!("Sync server listening on {}", args.bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down sync server...");
        })
        .await?;

    Ok(())
}
