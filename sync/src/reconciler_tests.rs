//! Reconciler tests against an in-memory directory

use super::*;
use async_trait::async_trait;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sync_core::{
    CreateError, DeleteError, DirectoryApi, DirectoryError, LocalUserRecord, RemoteUserRecord,
};
use test_case::test_case;
use tokio::sync::Barrier;

const HEADER: &str = "email,givenName,familyName,displayName";

/// Directory double that applies mutations to an in-memory user list
#[derive(Default)]
struct FakeDirectory {
    users: Mutex<Vec<RemoteUserRecord>>,
    next_id: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
    conflict_emails: HashSet<String>,
    missing_ids: HashSet<String>,
    failing_ids: HashSet<String>,
    fail_listing: bool,
    /// When set, every mutation waits here until all parties arrive
    barrier: Option<Arc<Barrier>>,
}

impl FakeDirectory {
    fn with_users(users: Vec<RemoteUserRecord>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Default::default()
        }
    }

    fn user_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .users
            .lock()
            .unwrap()
            .iter()
            .map(|u| u.user_name.clone())
            .collect();
        names.sort();
        names
    }

    async fn rendezvous(&self) {
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
    }
}

#[async_trait]
impl DirectoryApi for FakeDirectory {
    async fn list_users(&self) -> sync_core::api::Result<Vec<RemoteUserRecord>> {
        if self.fail_listing {
            return Err(DirectoryError::Server {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self.users.lock().unwrap().clone())
    }

    async fn create_user(
        &self,
        record: &LocalUserRecord,
    ) -> std::result::Result<String, CreateError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.rendezvous().await;

        if self.conflict_emails.contains(&record.email) {
            return Err(CreateError::Conflict(record.clone()));
        }
        let id = format!("id-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.users
            .lock()
            .unwrap()
            .push(RemoteUserRecord::new(id.clone(), record.email.clone()));
        Ok(id)
    }

    async fn delete_user(&self, id: &str) -> std::result::Result<(), DeleteError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.rendezvous().await;

        if self.missing_ids.contains(id) {
            return Err(DeleteError::NotFound(id.to_string()));
        }
        if self.failing_ids.contains(id) {
            return Err(DeleteError::Other(
                id.to_string(),
                DirectoryError::Server {
                    status: 500,
                    message: "boom".to_string(),
                },
            ));
        }
        self.users.lock().unwrap().retain(|u| u.id != id);
        Ok(())
    }
}

fn local(given: &str, family: &str, email: &str) -> LocalUserRecord {
    LocalUserRecord {
        given_name: given.to_string(),
        family_name: family.to_string(),
        display_name: format!("{given} {family}"),
        email: email.to_string(),
        id: None,
    }
}

fn one_to_keep_one_to_swap() -> (Vec<RemoteUserRecord>, Vec<LocalUserRecord>) {
    (
        vec![
            RemoteUserRecord::new("1", "a@x.com"),
            RemoteUserRecord::new("2", "b@x.com"),
        ],
        vec![local("A", "X", "a@x.com"), local("C", "X", "c@x.com")],
    )
}

#[tokio::test]
async fn test_creates_missing_and_deletes_extra_users() {
    let (remote, local_users) = one_to_keep_one_to_swap();
    let directory = FakeDirectory::with_users(remote.clone());
    let reconciler = Reconciler::new(directory, ReconcileOptions::default());

    let summary = reconciler.reconcile(remote, local_users).await;

    assert_eq!(summary.message(), "Completed creating 1/1 and deleting 1/1 user(s).");
    assert!(summary.is_complete_success());
    assert_eq!(reconciler.directory().user_names(), vec!["a@x.com", "c@x.com"]);
}

#[tokio::test]
async fn test_second_run_is_a_no_op() {
    let (remote, local_users) = one_to_keep_one_to_swap();
    let directory = FakeDirectory::with_users(remote.clone());
    let reconciler = Reconciler::new(directory, ReconcileOptions::default());

    reconciler.reconcile(remote, local_users.clone()).await;
    let remote_after = reconciler.directory().list_users().await.unwrap();
    let plan = reconciler.preview(remote_after.clone(), local_users.clone());
    assert!(plan.is_empty());

    let summary = reconciler.reconcile(remote_after, local_users).await;
    assert_eq!(summary.message(), "Completed creating 0/0 and deleting 0/0 user(s).");
    assert_eq!(reconciler.directory().create_calls.load(Ordering::SeqCst), 1);
    assert_eq!(reconciler.directory().delete_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_conflict_counts_as_failed_creation() {
    let directory = FakeDirectory {
        conflict_emails: HashSet::from(["c@x.com".to_string()]),
        ..FakeDirectory::with_users(vec![])
    };
    let reconciler = Reconciler::new(directory, ReconcileOptions::default());

    let summary = reconciler
        .reconcile(vec![], vec![local("C", "X", "c@x.com"), local("D", "X", "d@x.com")])
        .await;

    assert_eq!(summary.message(), "Completed creating 1/2 and deleting 0/0 user(s).");
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].key, "c@x.com");
    assert_eq!(summary.failures[0].reason, FailureReason::Conflict);
}

#[tokio::test]
async fn test_not_found_counts_as_failed_deletion() {
    let remote = vec![
        RemoteUserRecord::new("gone", "gone@x.com"),
        RemoteUserRecord::new("here", "here@x.com"),
    ];
    let directory = FakeDirectory {
        missing_ids: HashSet::from(["gone".to_string()]),
        ..FakeDirectory::with_users(remote.clone())
    };
    let reconciler = Reconciler::new(directory, ReconcileOptions::default());

    let summary = reconciler.reconcile(remote, vec![]).await;

    assert_eq!(summary.message(), "Completed creating 0/0 and deleting 1/2 user(s).");
    assert_eq!(summary.failures[0].operation, OperationKind::Delete);
    assert_eq!(summary.failures[0].reason, FailureReason::NotFound);
}

#[tokio::test]
async fn test_empty_inputs_produce_zero_summary() {
    let reconciler = Reconciler::new(FakeDirectory::default(), ReconcileOptions::default());

    let summary = reconciler.reconcile(vec![], vec![]).await;

    assert_eq!(summary.message(), "Completed creating 0/0 and deleting 0/0 user(s).");
    assert!(summary.failures.is_empty());
}

#[test_case(local("", "X", "e@x.com"), "givenName" ; "missing given name")]
#[test_case(local("E", "  ", "e@x.com"), "familyName" ; "blank family name")]
#[test_case(local("E", "X", ""), "email" ; "missing email")]
#[tokio::test]
async fn test_invalid_record_never_reaches_directory(record: LocalUserRecord, field: &str) {
    let reconciler = Reconciler::new(FakeDirectory::default(), ReconcileOptions::default());

    let summary = reconciler.reconcile(vec![], vec![record]).await;

    assert_eq!(summary.message(), "Completed creating 0/1 and deleting 0/0 user(s).");
    assert_eq!(
        summary.failures[0].reason,
        FailureReason::Invalid { field: field.to_string() }
    );
    assert_eq!(reconciler.directory().create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failures_do_not_stop_siblings() {
    let remote = vec![
        RemoteUserRecord::new("bad", "bad@x.com"),
        RemoteUserRecord::new("ok", "ok@x.com"),
    ];
    let directory = FakeDirectory {
        failing_ids: HashSet::from(["bad".to_string()]),
        conflict_emails: HashSet::from(["taken@x.com".to_string()]),
        ..FakeDirectory::with_users(remote.clone())
    };
    let reconciler = Reconciler::new(directory, ReconcileOptions::default());

    let summary = reconciler
        .reconcile(
            remote,
            vec![
                local("T", "X", "taken@x.com"),
                local("", "X", "invalid@x.com"),
                local("N", "X", "new@x.com"),
            ],
        )
        .await;

    assert_eq!(summary.message(), "Completed creating 1/3 and deleting 1/2 user(s).");
    assert_eq!(summary.failed_count(), 3);
    assert!(summary
        .failures
        .iter()
        .any(|f| f.key == "bad" && matches!(f.reason, FailureReason::Request(_))));
    assert_eq!(reconciler.directory().user_names(), vec!["bad@x.com", "new@x.com"]);
}

#[tokio::test]
async fn test_duplicate_emails_both_attempted() {
    let reconciler = Reconciler::new(FakeDirectory::default(), ReconcileOptions::default());

    let summary = reconciler
        .reconcile(vec![], vec![local("A", "X", "dup@x.com"), local("A", "Y", "dup@x.com")])
        .await;

    assert_eq!(summary.create_attempted, 2);
    assert_eq!(reconciler.directory().create_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_all_operations_are_in_flight_together() {
    // Three creations and two deletions must all reach the directory before
    // any of them can finish.
    let remote = vec![RemoteUserRecord::new("1", "x@x.com"), RemoteUserRecord::new("2", "y@x.com")];
    let directory = FakeDirectory {
        barrier: Some(Arc::new(Barrier::new(5))),
        ..FakeDirectory::with_users(remote.clone())
    };
    let reconciler = Reconciler::new(directory, ReconcileOptions::default());

    let run = reconciler.reconcile(
        remote,
        vec![local("A", "X", "a@x.com"), local("B", "X", "b@x.com"), local("C", "X", "c@x.com")],
    );
    let summary = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("operations were not dispatched concurrently");

    assert_eq!(summary.message(), "Completed creating 3/3 and deleting 2/2 user(s).");
}

#[tokio::test]
async fn test_bounded_concurrency_completes() {
    let remote = vec![RemoteUserRecord::new("1", "x@x.com")];
    let options = ReconcileOptions {
        max_concurrency: Some(1),
        dry_run: false,
    };
    let reconciler = Reconciler::new(FakeDirectory::with_users(remote.clone()), options);

    let summary = reconciler
        .reconcile(remote, vec![local("A", "X", "a@x.com"), local("B", "X", "b@x.com")])
        .await;

    assert_eq!(summary.message(), "Completed creating 2/2 and deleting 1/1 user(s).");
}

#[tokio::test]
async fn test_dry_run_does_not_mutate() {
    let (remote, local_users) = one_to_keep_one_to_swap();
    let options = ReconcileOptions {
        max_concurrency: None,
        dry_run: true,
    };
    let reconciler = Reconciler::new(FakeDirectory::with_users(remote.clone()), options);

    let summary = reconciler.reconcile(remote, local_users).await;

    assert!(summary.dry_run);
    assert_eq!(summary.message(), "Dry run: Completed creating 0/1 and deleting 0/1 user(s).");
    assert_eq!(reconciler.directory().create_calls.load(Ordering::SeqCst), 0);
    assert_eq!(reconciler.directory().delete_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_run_from_inline_source() {
    let directory = FakeDirectory::with_users(vec![
        RemoteUserRecord::new("1", "A@X.COM"),
        RemoteUserRecord::new("2", "b@x.com"),
    ]);
    let reconciler = Reconciler::new(directory, ReconcileOptions::default());
    let source = CsvSource::Inline(format!("{HEADER}\na@x.com,A,X,A X\nc@x.com,C,X,C X\n"));

    let summary = reconciler.run(&source).await.unwrap();

    assert_eq!(summary.message(), "Completed creating 1/1 and deleting 1/1 user(s).");
}

#[tokio::test]
async fn test_listing_failure_aborts_run() {
    let directory = FakeDirectory {
        fail_listing: true,
        ..Default::default()
    };
    let reconciler = Reconciler::new(directory, ReconcileOptions::default());
    let source = CsvSource::Inline(format!("{HEADER}\nc@x.com,C,X,C X\n"));

    let err = reconciler.run(&source).await.unwrap_err();

    assert!(matches!(err, SyncError::Listing(_)));
    assert_eq!(reconciler.directory().create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_source_failure_aborts_run() {
    let reconciler = Reconciler::new(FakeDirectory::default(), ReconcileOptions::default());
    let source = CsvSource::File("/nonexistent/users.csv".into());

    let err = reconciler.run(&source).await.unwrap_err();
    assert!(matches!(err, SyncError::Io { .. }));
}

#[tokio::test]
async fn test_plan_from_source() {
    let directory = FakeDirectory::with_users(vec![RemoteUserRecord::new("2", "b@x.com")]);
    let reconciler = Reconciler::new(directory, ReconcileOptions::default());
    let source = CsvSource::Inline(format!("{HEADER}\nc@x.com,C,X,C X\n"));

    let plan = reconciler.plan(&source).await.unwrap();

    assert_eq!(plan.to_create[0].email, "c@x.com");
    assert_eq!(plan.to_delete[0].id, "2");
    assert_eq!(reconciler.directory().create_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_created_record_carries_directory_id() {
    let reconciler = Reconciler::new(FakeDirectory::default(), ReconcileOptions::default());

    let outcome = reconciler.create_one(local("A", "X", "a@x.com")).await;

    match outcome {
        OperationOutcome::Success(record) => {
            assert_eq!(record.id.as_deref(), Some("id-0"));
            assert_eq!(record.email, "a@x.com");
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_creation_leaves_id_unset() {
    let directory = FakeDirectory {
        conflict_emails: HashSet::from(["a@x.com".to_string()]),
        ..Default::default()
    };
    let reconciler = Reconciler::new(directory, ReconcileOptions::default());

    let conflicted = reconciler.create_one(local("A", "X", "a@x.com")).await;
    let invalid = reconciler.create_one(local("", "X", "b@x.com")).await;

    for outcome in [conflicted, invalid] {
        match outcome {
            OperationOutcome::Failure { record, .. } => assert_eq!(record.id, None),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_deleted_record_is_returned_unchanged() {
    let user = RemoteUserRecord::new("7", "g@x.com");
    let directory = FakeDirectory::with_users(vec![user.clone()]);
    let reconciler = Reconciler::new(directory, ReconcileOptions::default());

    let outcome = reconciler.delete_one(user.clone()).await;

    assert_eq!(outcome, OperationOutcome::Success(user));
}

fn assert_send<T: Send>(_: &T) {}

#[test]
fn test_run_futures_are_send() {
    let reconciler = Reconciler::new(FakeDirectory::default(), ReconcileOptions::default());
    let source = CsvSource::Inline(format!("{HEADER}\n"));

    assert_send(&reconciler.run(&source));
    assert_send(&reconciler.plan(&source));
    assert_send(&reconciler.reconcile(vec![], vec![local("A", "X", "a@x.com")]));
}

#[tokio::test]
async fn test_run_spawned_on_runtime() {
    let reconciler = Arc::new(Reconciler::new(
        FakeDirectory::default(),
        ReconcileOptions::default(),
    ));
    let source = CsvSource::Inline(format!("{HEADER}\na@x.com,A,X,A X\n"));

    let task = tokio::spawn({
        let reconciler = Arc::clone(&reconciler);
        async move { reconciler.run(&source).await }
    });
    let summary = task.await.unwrap().unwrap();

    assert_eq!(summary.message(), "Completed creating 1/1 and deleting 0/0 user(s).");
}

#[tokio::test]
async fn test_run_from_object_source() {
    let store = InMemory::new();
    store
        .put(
            &ObjectPath::from("exports/users.csv"),
            format!("{HEADER}\nc@x.com,C,X,C X\n").into_bytes().into(),
        )
        .await
        .unwrap();

    let directory = FakeDirectory::with_users(vec![RemoteUserRecord::new("2", "b@x.com")]);
    let reconciler = Reconciler::new(directory, ReconcileOptions::default())
        .with_buckets(Arc::new(SingleStore(Arc::new(store))));
    let source = CsvSource::Object {
        bucket: "hr".to_string(),
        key: "exports/users.csv".to_string(),
    };

    let summary = reconciler.run(&source).await.unwrap();

    assert_eq!(summary.message(), "Completed creating 1/1 and deleting 1/1 user(s).");
}
