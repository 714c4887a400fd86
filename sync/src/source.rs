//! CSV sources: a local file, an inline payload or an object in a bucket

use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use sync_core::CsvRow;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Where the CSV text comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvSource {
    File(PathBuf),
    Inline(String),
    Object { bucket: String, key: String },
}

impl CsvSource {
    /// Short description for logs, never the inline payload itself
    pub fn describe(&self) -> String {
        match self {
            CsvSource::File(path) => format!("file '{}'", path.display()),
            CsvSource::Inline(data) => format!("inline payload ({} bytes)", data.len()),
            CsvSource::Object { bucket, key } => format!("object s3://{bucket}/{key}"),
        }
    }

    /// Materialise the CSV text, reading objects from S3
    pub async fn load_text(&self) -> Result<String> {
        self.load_text_with(&S3Buckets).await
    }

    /// Materialise the CSV text, resolving buckets through `buckets`
    pub async fn load_text_with(&self, buckets: &dyn BucketResolver) -> Result<String> {
        debug!("Loading CSV from {}", self.describe());
        match self {
            CsvSource::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| SyncError::io_error(path, e)),
            CsvSource::Inline(data) => Ok(data.clone()),
            CsvSource::Object { bucket, key } => {
                let store = buckets.resolve(bucket)?;
                read_object(store.as_ref(), bucket, key).await
            }
        }
    }

    /// Load and parse the CSV into rows, reading objects from S3
    pub async fn load_rows(&self) -> Result<Vec<CsvRow>> {
        self.load_rows_with(&S3Buckets).await
    }

    /// Load and parse the CSV into rows
    pub async fn load_rows_with(&self, buckets: &dyn BucketResolver) -> Result<Vec<CsvRow>> {
        let text = self.load_text_with(buckets).await?;
        let rows = parse_csv(&text)?;
        debug!(rows = rows.len(), "Parsed CSV from {}", self.describe());
        Ok(rows)
    }
}

/// Maps a bucket name to the store that holds it
pub trait BucketResolver: Send + Sync {
    fn resolve(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>>;
}

/// S3 buckets configured from the standard AWS environment variables
#[derive(Debug, Clone, Copy, Default)]
pub struct S3Buckets;

impl BucketResolver for S3Buckets {
    fn resolve(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()?;
        Ok(Arc::new(store))
    }
}

/// Every bucket name maps to one fixed store
#[derive(Debug, Clone)]
pub struct SingleStore(pub Arc<dyn ObjectStore>);

impl BucketResolver for SingleStore {
    fn resolve(&self, _bucket: &str) -> Result<Arc<dyn ObjectStore>> {
        Ok(Arc::clone(&self.0))
    }
}

async fn read_object(store: &dyn ObjectStore, bucket: &str, key: &str) -> Result<String> {
    let bytes = store.get(&ObjectPath::from(key)).await?.bytes().await?;
    String::from_utf8(bytes.to_vec()).map_err(|e| {
        SyncError::source_error(format!("object s3://{bucket}/{key} is not UTF-8: {e}"))
    })
}

/// Parse CSV text with a header row into string-keyed rows.
///
/// Column order does not matter and rows may be shorter or longer than the
/// header. Values are kept exactly as written; rows where every value is blank
/// are dropped.
pub fn parse_csv(text: &str) -> Result<Vec<CsvRow>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(|value| value.trim().is_empty()) {
            continue;
        }

        let row: CsvRow = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| (header.to_string(), value.to_string()))
            .collect();
        rows.push(row);
    }

    Ok(rows)
}
