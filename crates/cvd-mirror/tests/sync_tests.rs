use std::path::Path;
use std::sync::Arc;

use cvd_mirror::test_support::{ContentVersionReader, FakeFetcher, StaticDirectory, base_body};
use cvd_mirror::{
    DiffScan, DiffSkipReason, FailurePolicy, FetchSummary, Fetcher, LocalState, LookupError,
    MirrorLayout, Outcome, RemoteVersions, SyncError, Synchronizer, TransferError, UpdateError,
    VersionDirectory,
};

const MIRROR: &str = "http://mirror.test";

/// Lets a test keep a handle on a fake after handing it to the synchronizer.
struct Shared<T>(Arc<T>);

#[async_trait::async_trait]
impl Fetcher for Shared<FakeFetcher> {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchSummary, TransferError> {
        self.0.fetch(url, dest).await
    }
}

#[async_trait::async_trait]
impl VersionDirectory for Shared<StaticDirectory> {
    fn label(&self) -> &str {
        self.0.label()
    }

    async fn remote_versions(&self) -> Result<RemoteVersions, LookupError> {
        self.0.remote_versions().await
    }
}

fn full_mirror() -> FakeFetcher {
    let mut fetcher = FakeFetcher::new();
    fetcher.serve(format!("{MIRROR}/main.cvd"), base_body(62));
    fetcher.serve(format!("{MIRROR}/daily.cvd"), base_body(27));
    fetcher.serve(format!("{MIRROR}/bytecode.cvd"), base_body(335));
    fetcher
}

fn synchronizer(
    dir: &Path,
    directory: StaticDirectory,
    fetcher: FakeFetcher,
) -> (Synchronizer, Arc<FakeFetcher>, Arc<StaticDirectory>) {
    let fetcher = Arc::new(fetcher);
    let directory = Arc::new(directory);
    let sync = Synchronizer::new(
        MirrorLayout::new(MIRROR, dir),
        Box::new(Shared(Arc::clone(&directory))),
        Box::new(Shared(Arc::clone(&fetcher))),
        Box::new(ContentVersionReader),
    );
    (sync, fetcher, directory)
}

#[tokio::test]
async fn run_updates_default_datasets_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (sync, fetcher, directory) = synchronizer(
        dir.path(),
        StaticDirectory::with_versions(62, 27, 335),
        full_mirror(),
    );

    let report = sync.run().await.unwrap();

    assert!(report.is_success());
    assert!(!report.aborted);
    assert_eq!(directory.lookups(), 1);
    assert_eq!(
        fetcher.requests(),
        vec![
            format!("{MIRROR}/main.cvd"),
            format!("{MIRROR}/daily.cvd"),
            format!("{MIRROR}/bytecode.cvd"),
        ]
    );
    let datasets: Vec<&str> = report.updated.iter().map(|r| r.dataset.as_str()).collect();
    assert_eq!(datasets, vec!["main", "daily", "bytecode"]);
    assert!(report.updated.iter().all(|r| r.outcome == Outcome::Replaced));
}

#[tokio::test]
async fn run_creates_missing_local_dir() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("clam").join("db");
    let (sync, _, _) = synchronizer(
        &nested,
        StaticDirectory::with_versions(62, 27, 335),
        full_mirror(),
    );

    sync.run().await.unwrap();
    assert!(nested.join("main.cvd").exists());
}

#[tokio::test]
async fn malformed_lookup_aborts_before_any_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let (sync, fetcher, _) = synchronizer(
        dir.path(),
        StaticDirectory::new(vec!["0.103.11:62:27".into()]),
        full_mirror(),
    );

    let result = sync.run().await;
    assert!(matches!(
        result,
        Err(SyncError::Lookup(LookupError::FieldCount { .. }))
    ));
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn multiple_records_abort_before_any_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let record = "0.103.11:62:27:1702976940:1:90:49192:335".to_owned();
    let (sync, fetcher, _) = synchronizer(
        dir.path(),
        StaticDirectory::new(vec![record.clone(), record]),
        full_mirror(),
    );

    let result = sync.run().await;
    assert!(matches!(
        result,
        Err(SyncError::Lookup(LookupError::RecordCount(2)))
    ));
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn unknown_dataset_aborts_before_any_fetch() {
    let dir = tempfile::tempdir().unwrap();
    let (sync, fetcher, _) = synchronizer(
        dir.path(),
        StaticDirectory::with_versions(62, 27, 335),
        full_mirror(),
    );
    let sync = sync.with_datasets(vec!["main".into(), "x".into()]);

    let result = sync.run().await;
    assert!(matches!(
        result,
        Err(SyncError::Lookup(LookupError::UnknownDataset(_)))
    ));
    assert!(fetcher.requests().is_empty());
}

#[tokio::test]
async fn continue_policy_updates_remaining_datasets() {
    let dir = tempfile::tempdir().unwrap();
    let mut mirror = full_mirror();
    mirror.fail(format!("{MIRROR}/main.cvd"), 503, "");
    let (sync, fetcher, _) = synchronizer(
        dir.path(),
        StaticDirectory::with_versions(62, 27, 335),
        mirror,
    );

    let report = sync.run().await.unwrap();

    assert!(!report.is_success());
    assert!(!report.aborted);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].dataset, "main");
    assert!(matches!(
        report.failed[0].error,
        UpdateError::Transfer { .. }
    ));
    assert_eq!(report.updated.len(), 2);
    assert_eq!(fetcher.requests().len(), 3);
}

#[tokio::test]
async fn abort_policy_stops_after_first_failure() {
    let dir = tempfile::tempdir().unwrap();
    let mut mirror = full_mirror();
    mirror.fail(format!("{MIRROR}/daily.cvd"), 503, "");
    let (sync, fetcher, _) = synchronizer(
        dir.path(),
        StaticDirectory::with_versions(62, 27, 335),
        mirror,
    );
    let sync = sync.with_policy(FailurePolicy::Abort);

    let report = sync.run().await.unwrap();

    assert!(report.aborted);
    assert_eq!(report.updated.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].dataset, "daily");
    assert!(!fetcher.requests().contains(&format!("{MIRROR}/bytecode.cvd")));
}

#[tokio::test]
async fn status_reports_plans_without_transferring() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("main.cvd"), base_body(62)).unwrap();
    std::fs::write(dir.path().join("daily.cvd"), base_body(25)).unwrap();

    let (sync, fetcher, directory) = synchronizer(
        dir.path(),
        StaticDirectory::with_versions(62, 27, 335),
        full_mirror(),
    );

    let statuses = sync.status().await.unwrap();
    assert_eq!(directory.lookups(), 1);
    assert!(fetcher.requests().is_empty());

    assert_eq!(statuses.len(), 3);

    assert_eq!(statuses[0].local, LocalState::Version(62));
    assert_eq!(statuses[0].plan.diff, DiffScan::Skipped(DiffSkipReason::UpToDate));
    assert!(!statuses[0].plan.replace_base);

    assert_eq!(statuses[1].local, LocalState::Version(25));
    assert_eq!(statuses[1].plan.diff, DiffScan::Window(15..=27));
    assert!(statuses[1].plan.replace_base);

    assert_eq!(statuses[2].local, LocalState::Missing);
    assert_eq!(statuses[2].plan.diff, DiffScan::Skipped(DiffSkipReason::Missing));
    assert!(statuses[2].plan.replace_base);
}
