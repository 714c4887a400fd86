//! Reconciler that applies a diff plan against the directory
//!
//! A run has three phases: fetch the directory users and the CSV rows (in
//! parallel), diff them, then fire every create and delete at once and count
//! the outcomes after all of them have settled. Individual failures are
//! logged and counted; only a failed fetch aborts the run.

use chrono::Utc;
use futures::future::{join_all, Either, FutureExt};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use sync_core::{
    CreateError, DeleteError, DirectoryApi, LocalUserRecord, ReconcileConfig, RemoteUserRecord,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::diff::{DiffEngine, DiffPlan};
use crate::error::{Result, SyncError};
use crate::source::{BucketResolver, CsvSource, S3Buckets};
use crate::summary::{FailureReason, OperationOutcome, SyncSummary};

/// Options for reconciliation runs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileOptions {
    /// Maximum number of in-flight directory mutations; all at once when unset
    pub max_concurrency: Option<usize>,
    /// Plan and log only, never mutate the directory
    pub dry_run: bool,
}

impl From<&ReconcileConfig> for ReconcileOptions {
    fn from(config: &ReconcileConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            dry_run: config.dry_run,
        }
    }
}

/// Settled result of one dispatched operation
enum Settled {
    Create(OperationOutcome<LocalUserRecord>),
    Delete(OperationOutcome<RemoteUserRecord>),
}

/// Reconciles the directory against a local user list
pub struct Reconciler<D> {
    directory: D,
    diff_engine: DiffEngine,
    options: ReconcileOptions,
    buckets: Arc<dyn BucketResolver>,
}

impl<D: DirectoryApi> Reconciler<D> {
    pub fn new(directory: D, options: ReconcileOptions) -> Self {
        Self {
            directory,
            diff_engine: DiffEngine::new(),
            options,
            buckets: Arc::new(S3Buckets),
        }
    }

    /// Resolve object sources through `buckets` instead of S3
    pub fn with_buckets(mut self, buckets: Arc<dyn BucketResolver>) -> Self {
        self.buckets = buckets;
        self
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    /// Fetch both sides from scratch and reconcile them
    pub async fn run(&self, source: &CsvSource) -> Result<SyncSummary> {
        info!("Starting sync from {}", source.describe());
        let (remote, local) = self.fetch(source).await?;
        Ok(self.reconcile(remote, local).await)
    }

    /// Fetch both sides and return the plan without applying it
    pub async fn plan(&self, source: &CsvSource) -> Result<DiffPlan> {
        let (remote, local) = self.fetch(source).await?;
        Ok(self.preview(remote, local))
    }

    /// Compute the plan for already-materialised inputs
    pub fn preview(&self, remote: Vec<RemoteUserRecord>, local: Vec<LocalUserRecord>) -> DiffPlan {
        self.diff_engine.generate_plan(remote, local)
    }

    async fn fetch(
        &self,
        source: &CsvSource,
    ) -> Result<(Vec<RemoteUserRecord>, Vec<LocalUserRecord>)> {
        let listing = async {
            self.directory.list_users().await.map_err(|e| {
                error!(error = %e, status = ?e.status(), "Failed to list directory users");
                SyncError::Listing(e)
            })
        };

        let rows = source.load_rows_with(self.buckets.as_ref());
        let (remote, rows) = tokio::try_join!(listing, rows)?;
        let local = rows.iter().map(LocalUserRecord::from_row).collect::<Vec<_>>();

        info!(
            remote_users = remote.len(),
            local_users = local.len(),
            "Fetched directory and CSV users"
        );
        Ok((remote, local))
    }

    /// Diff and apply. Always produces a summary; per-user failures only
    /// lower the success counts.
    pub async fn reconcile(
        &self,
        remote: Vec<RemoteUserRecord>,
        local: Vec<LocalUserRecord>,
    ) -> SyncSummary {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let plan = self.preview(remote, local);
        info!(
            %run_id,
            to_create = plan.to_create.len(),
            to_delete = plan.to_delete.len(),
            "Generated sync plan"
        );

        if self.options.dry_run {
            for record in &plan.to_create {
                info!(email = %record.email, "Dry run: would create user");
            }
            for user in &plan.to_delete {
                info!(id = %user.id, user_name = %user.user_name, "Dry run: would delete user");
            }
            let summary = SyncSummary::planned(
                run_id,
                started_at,
                plan.to_create.len(),
                plan.to_delete.len(),
            );
            info!(%run_id, "{}", summary.message());
            return summary;
        }

        let creations = plan
            .to_create
            .into_iter()
            .map(|record| Either::Left(self.create_one(record).map(Settled::Create)));
        let deletions = plan
            .to_delete
            .into_iter()
            .map(|user| Either::Right(self.delete_one(user).map(Settled::Delete)));
        let operations: Vec<_> = creations.chain(deletions).collect();

        let settled = self.settle(operations).await;

        let mut created = Vec::new();
        let mut deleted = Vec::new();
        for outcome in settled {
            match outcome {
                Settled::Create(outcome) => created.push(outcome),
                Settled::Delete(outcome) => deleted.push(outcome),
            }
        }

        let summary = SyncSummary::from_outcomes(run_id, started_at, &created, &deleted);
        info!(
            %run_id,
            failed = summary.failed_count(),
            duration_ms = summary.duration.as_millis() as u64,
            "{}",
            summary.message()
        );
        summary
    }

    /// Drive every operation to completion and collect one result each
    async fn settle<F>(&self, operations: Vec<F>) -> Vec<F::Output>
    where
        F: Future,
    {
        match self.options.max_concurrency {
            Some(limit) => {
                debug!(limit, "Applying plan with bounded concurrency");
                stream::iter(operations)
                    .buffer_unordered(limit.max(1))
                    .collect()
                    .await
            }
            None => join_all(operations).await,
        }
    }

    /// Validate, then create. On success the record carries the directory id.
    pub(crate) async fn create_one(
        &self,
        mut record: LocalUserRecord,
    ) -> OperationOutcome<LocalUserRecord> {
        if let Err(e) = record.validate() {
            warn!(field = %e.field, record = %e.record, "Skipping invalid user record");
            return OperationOutcome::Failure {
                reason: FailureReason::Invalid { field: e.field },
                record,
            };
        }

        match self.directory.create_user(&record).await {
            Ok(id) => {
                info!(email = %record.email, %id, "Created user");
                record.id = Some(id);
                OperationOutcome::Success(record)
            }
            Err(CreateError::Conflict(record)) => {
                warn!(email = %record.email, "User already exists in directory");
                OperationOutcome::Failure {
                    reason: FailureReason::Conflict,
                    record,
                }
            }
            Err(CreateError::Other(record, cause)) => {
                error!(
                    record = %record,
                    error = %cause,
                    status = ?cause.status(),
                    "Failed to create user"
                );
                OperationOutcome::Failure {
                    reason: FailureReason::Request(cause.to_string()),
                    record,
                }
            }
        }
    }

    pub(crate) async fn delete_one(
        &self,
        user: RemoteUserRecord,
    ) -> OperationOutcome<RemoteUserRecord> {
        match self.directory.delete_user(&user.id).await {
            Ok(()) => {
                info!(id = %user.id, user_name = %user.user_name, "Deleted user");
                OperationOutcome::Success(user)
            }
            Err(DeleteError::NotFound(id)) => {
                warn!(%id, user_name = %user.user_name, "User to delete was not found");
                OperationOutcome::Failure {
                    reason: FailureReason::NotFound,
                    record: user,
                }
            }
            Err(DeleteError::Other(id, cause)) => {
                error!(
                    %id,
                    user_name = %user.user_name,
                    error = %cause,
                    status = ?cause.status(),
                    "Failed to delete user"
                );
                OperationOutcome::Failure {
                    reason: FailureReason::Request(cause.to_string()),
                    record: user,
                }
            }
        }
    }
}
