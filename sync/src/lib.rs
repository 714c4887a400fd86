//! Sync Engine Library
//!
//! Reconciles a SCIM directory's users with a CSV user list:
//! - CSV loading from a file, an inline payload or object storage
//! - Case-insensitive email/userName diffing
//! - Concurrent create/delete application against the directory
//! - Outcome aggregation into a run summary

pub mod diff;
pub mod error;
pub mod event;
pub mod reconciler;
pub mod source;
pub mod summary;

// Re-export main types and functions
pub use diff::{DiffEngine, DiffPlan};
pub use error::{Result, SyncError};
pub use event::InvocationEvent;
pub use reconciler::{ReconcileOptions, Reconciler};
pub use source::{parse_csv, BucketResolver, CsvSource, S3Buckets, SingleStore};
pub use summary::{FailureDetail, FailureReason, OperationKind, OperationOutcome, SyncSummary};

use sync_core::{LocalUserRecord, RemoteUserRecord};

/// Compute the create/delete sets for two user collections
pub fn diff(remote: Vec<RemoteUserRecord>, local: Vec<LocalUserRecord>) -> DiffPlan {
    DiffEngine::new().generate_plan(remote, local)
}

#[cfg(test)]
mod reconciler_tests;
