//! Per-operation outcomes and the run summary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use sync_core::{LocalUserRecord, RemoteUserRecord};
use uuid::Uuid;

/// Result of one attempted mutation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationOutcome<R> {
    Success(R),
    Failure { reason: FailureReason, record: R },
}

impl<R> OperationOutcome<R> {
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success(_))
    }
}

/// Why a mutation did not happen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// A required attribute was blank; the directory was never called
    Invalid { field: String },
    /// The directory already has this user (HTTP 409)
    Conflict,
    /// The directory no longer has this user (HTTP 404)
    NotFound,
    /// Any other HTTP or network failure
    Request(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Invalid { field } => write!(f, "missing required field '{field}'"),
            FailureReason::Conflict => write!(f, "user already exists"),
            FailureReason::NotFound => write!(f, "user not found"),
            FailureReason::Request(cause) => write!(f, "{cause}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Create,
    Delete,
}

/// One failed operation, for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub operation: OperationKind,
    /// Email for creations, directory id for deletions
    pub key: String,
    pub reason: FailureReason,
}

/// Result of one sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    pub create_attempted: usize,
    pub created_count: usize,
    pub delete_attempted: usize,
    pub deleted_count: usize,
    pub dry_run: bool,
    pub failures: Vec<FailureDetail>,
    pub message: String,
}

impl SyncSummary {
    /// Count settled outcomes. Called once every operation has finished.
    pub fn from_outcomes(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        creations: &[OperationOutcome<LocalUserRecord>],
        deletions: &[OperationOutcome<RemoteUserRecord>],
    ) -> Self {
        let mut failures = Vec::new();

        for outcome in creations {
            if let OperationOutcome::Failure { reason, record } = outcome {
                failures.push(FailureDetail {
                    operation: OperationKind::Create,
                    key: record.email.clone(),
                    reason: reason.clone(),
                });
            }
        }
        for outcome in deletions {
            if let OperationOutcome::Failure { reason, record } = outcome {
                failures.push(FailureDetail {
                    operation: OperationKind::Delete,
                    key: record.id.clone(),
                    reason: reason.clone(),
                });
            }
        }

        let created_count = creations.iter().filter(|o| o.is_success()).count();
        let deleted_count = deletions.iter().filter(|o| o.is_success()).count();

        Self::finish(
            run_id,
            started_at,
            (created_count, creations.len()),
            (deleted_count, deletions.len()),
            false,
            failures,
        )
    }

    /// Summary for a run that only planned work
    pub fn planned(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        create_attempted: usize,
        delete_attempted: usize,
    ) -> Self {
        Self::finish(
            run_id,
            started_at,
            (0, create_attempted),
            (0, delete_attempted),
            true,
            Vec::new(),
        )
    }

    fn finish(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        (created_count, create_attempted): (usize, usize),
        (deleted_count, delete_attempted): (usize, usize),
        dry_run: bool,
        failures: Vec<FailureDetail>,
    ) -> Self {
        let finished_at = Utc::now();
        let duration = (finished_at - started_at).to_std().unwrap_or_default();

        let mut message = compose_message(
            created_count,
            create_attempted,
            deleted_count,
            delete_attempted,
        );
        if dry_run {
            message = format!("Dry run: {message}");
        }

        Self {
            run_id,
            started_at,
            finished_at,
            duration,
            create_attempted,
            created_count,
            delete_attempted,
            deleted_count,
            dry_run,
            failures,
            message,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn failed_count(&self) -> usize {
        (self.create_attempted - self.created_count) + (self.delete_attempted - self.deleted_count)
    }

    pub fn is_complete_success(&self) -> bool {
        !self.dry_run && self.failed_count() == 0
    }
}

/// `Completed creating X/Y and deleting A/B user(s).`
pub fn compose_message(
    created: usize,
    create_attempted: usize,
    deleted: usize,
    delete_attempted: usize,
) -> String {
    format!(
        "Completed creating {created}/{create_attempted} \
         and deleting {deleted}/{delete_attempted} user(s)."
    )
}
