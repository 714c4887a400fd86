//! Core library for CSV to SCIM user sync
//!
//! This crate provides the user record model and row normalizer, the SCIM
//! directory client, and the configuration and logging setup shared by the
//! command line and server front ends.

pub mod api;
pub mod config;
pub mod record;
pub mod telemetry;

pub use api::{
    CreateError, DeleteError, DirectoryApi, DirectoryError, RemoteUserRecord, ScimClient,
    ScimClientBuilder,
};
pub use config::{DirectoryConfig, ReconcileConfig, SyncConfig};
pub use record::{normalize, CsvRow, LocalUserRecord, ValidationError};
pub use telemetry::{init_logging, TelemetryConfig};
