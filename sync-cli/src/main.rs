use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use sync::{CsvSource, ReconcileOptions, Reconciler};
use sync_core::{init_logging, normalize, CsvRow, ScimClient, SyncConfig};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "csv-sync", version)]
#[command(about = "Reconcile a SCIM directory's users with a CSV user list")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "CSV_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// SCIM base URL, e.g. https://example.com/scim/v2
    #[arg(long, global = true, env = "SCIM_ENDPOINT")]
    endpoint: Option<String>,

    /// Bearer token for the SCIM API
    #[arg(long, global = true, env = "SCIM_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create and delete directory users so they match the CSV
    Run {
        #[command(flatten)]
        source: SourceArgs,

        /// Log the plan without changing the directory
        #[arg(long)]
        dry_run: bool,

        /// Cap on concurrent directory requests
        #[arg(long)]
        max_concurrency: Option<usize>,
    },
    /// Show which users would be created and deleted
    Plan {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate every CSV row without contacting the directory
    Check {
        #[command(flatten)]
        source: SourceArgs,
    },
}

/// Exactly one CSV source
#[derive(Args, Debug)]
struct SourceArgs {
    /// CSV file path
    #[arg(short, long, env = "CSV_SYNC_FILE", conflicts_with_all = ["data", "bucket"])]
    file: Option<PathBuf>,

    /// Inline CSV text
    #[arg(long, env = "CSV_SYNC_DATA", conflicts_with = "bucket")]
    data: Option<String>,

    /// Bucket holding the CSV object
    #[arg(long, env = "CSV_SYNC_BUCKET", requires = "key")]
    bucket: Option<String>,

    /// Object key inside the bucket
    #[arg(long, requires = "bucket")]
    key: Option<String>,
}

impl SourceArgs {
    fn into_source(self) -> Result<CsvSource> {
        match (self.file, self.data, self.bucket, self.key) {
            (Some(path), None, None, _) => Ok(CsvSource::File(path)),
            (None, Some(data), None, _) => Ok(CsvSource::Inline(data)),
            (None, None, Some(bucket), Some(key)) => Ok(CsvSource::Object { bucket, key }),
            (None, None, None, _) => {
                bail!("no CSV source given; use --file, --data or --bucket with --key")
            }
            _ => bail!("only one CSV source may be given"),
        }
    }
}

impl Cli {
    /// Configuration file values with command-line overrides applied
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
        if let Commands::Run {
            dry_run,
            max_concurrency,
            ..
        } = &self.command
        {
            config.reconcile.dry_run |= *dry_run;
            if max_concurrency.is_some() {
                config.reconcile.max_concurrency = *max_concurrency;
            }
        }

        Ok(config)
    }
}

fn build_reconciler(config: &SyncConfig) -> Result<Reconciler<ScimClient>> {
    config.validate().context("Invalid configuration")?;
    let client =
        ScimClient::from_config(&config.directory).context("Failed to create SCIM client")?;
    Ok(Reconciler::new(client, ReconcileOptions::from(&config.reconcile)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config().await?;
    let _guard = init_logging(&config.telemetry)?;

    match cli.command {
        Commands::Run { source, .. } => {
            let source = source.into_source()?;
            let reconciler = build_reconciler(&config)?;

            match reconciler.run(&source).await {
                Ok(summary) => {
                    println!("{}", summary.message());
                    Ok(())
                }
                Err(e) => {
                    error!("Sync aborted: {}", e);
                    Err(e.into())
                }
            }
        }
        Commands::Plan { source, json } => {
            let source = source.into_source()?;
            let reconciler = build_reconciler(&config)?;
            let plan = reconciler.plan(&source).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                for record in &plan.to_create {
                    println!("+ {} ({})", record.email, record.display_name);
                }
                for user in &plan.to_delete {
                    println!("- {} [{}]", user.user_name, user.id);
                }
                println!(
                    "{} to create, {} to delete",
                    plan.to_create.len(),
                    plan.to_delete.len()
                );
            }
            Ok(())
        }
        Commands::Check { source } => {
            let source = source.into_source()?;
            let rows = source.load_rows().await?;
            info!(rows = rows.len(), "Checking CSV rows from {}", source.describe());

            check_rows(&rows)
        }
    }
}

/// Print every row that fails validation; error out if any did
fn check_rows(rows: &[CsvRow]) -> Result<()> {
    let mut invalid = 0;
    for (index, row) in rows.iter().enumerate() {
        if let Err(e) = normalize(row) {
            invalid += 1;
            // Row 1 is the header
            println!("row {}: {}", index + 2, e);
        }
    }

    println!("{} row(s) checked, {} invalid", rows.len(), invalid);
    if invalid > 0 {
        bail!("{invalid} invalid row(s)");
    }
    Ok(())
}
