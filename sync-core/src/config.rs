//! Configuration for a sync run
//!
//! Loaded from a TOML file when one is given; command-line options and
//! environment variables are applied on top by the binaries.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::telemetry::TelemetryConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Where the SCIM directory lives and how to reach it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Cap on in-flight create/delete requests; unbounded when unset
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            token: String::new(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl SyncConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Load the file if given, otherwise start from defaults
    pub async fn load_or_default(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::load(path).await
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.directory.endpoint.trim().is_empty() {
            anyhow::bail!("SCIM endpoint is not set");
        }
        let url = url::Url::parse(&self.directory.endpoint)?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("SCIM endpoint must be http or https: {}", self.directory.endpoint);
        }

        if self.directory.token.trim().is_empty() {
            anyhow::bail!("SCIM bearer token is not set");
        }

        if self.reconcile.max_concurrency == Some(0) {
            anyhow::bail!("max_concurrency must be greater than zero");
        }

        Ok(())
    }
}

fn default_timeout_secs() -> u64 { 30 }
fn default_connect_timeout_secs() -> u64 { 10 }
fn default_user_agent() -> String { format!("csv-sync/{}", env!("CARGO_PKG_VERSION")) }
