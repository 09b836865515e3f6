use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::directory::{LookupError, VersionDirectory};
use crate::fetch::Fetcher;
use crate::layout::MirrorLayout;
use crate::planner::{DatasetReport, LocalState, UpdateError, UpdatePlan, UpdatePlanner, plan};
use crate::reader::VersionReader;

/// Datasets synced when none are configured.
pub const DEFAULT_DATASETS: [&str; 3] = ["main", "daily", "bytecode"];

/// What to do with the remaining datasets after one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Continue,
    Abort,
}

/// Errors that stop a whole run.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Inspect(UpdateError),

    #[error("could not create {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A dataset that could not be updated.
#[derive(Debug)]
pub struct DatasetFailure {
    pub dataset: String,
    pub error: UpdateError,
}

/// Outcome of a full run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub updated: Vec<DatasetReport>,
    pub failed: Vec<DatasetFailure>,
    /// True when `FailurePolicy::Abort` stopped the run early.
    pub aborted: bool,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Read-only view of one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetStatus {
    pub dataset: String,
    pub local: LocalState,
    pub remote: u64,
    pub plan: UpdatePlan,
}

/// Runs one update per configured dataset against a single version lookup.
pub struct Synchronizer {
    layout: MirrorLayout,
    datasets: Vec<String>,
    policy: FailurePolicy,
    directory: Box<dyn VersionDirectory>,
    fetcher: Box<dyn Fetcher>,
    reader: Box<dyn VersionReader>,
}

impl Synchronizer {
    pub fn new(
        layout: MirrorLayout,
        directory: Box<dyn VersionDirectory>,
        fetcher: Box<dyn Fetcher>,
        reader: Box<dyn VersionReader>,
    ) -> Self {
        Self {
            layout,
            datasets: DEFAULT_DATASETS.iter().map(|d| (*d).to_owned()).collect(),
            policy: FailurePolicy::default(),
            directory,
            fetcher,
            reader,
        }
    }

    pub fn with_datasets(mut self, datasets: Vec<String>) -> Self {
        self.datasets = datasets;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn layout(&self) -> &MirrorLayout {
        &self.layout
    }

    pub fn datasets(&self) -> &[String] {
        &self.datasets
    }

    fn planner(&self) -> UpdatePlanner<'_> {
        UpdatePlanner::new(&self.layout, self.fetcher.as_ref(), self.reader.as_ref())
    }

    /// Look up remote versions and resolve every configured dataset.
    ///
    /// Any malformed answer or unknown dataset fails here, before a single
    /// transfer.
    async fn targets(&self) -> Result<Vec<(String, u64)>, LookupError> {
        info!("Querying '{}' for current versions.", self.directory.label());
        let versions = self.directory.remote_versions().await?;
        debug!("remote versions: {versions:?}");

        self.datasets
            .iter()
            .map(|dataset| versions.version(dataset).map(|v| (dataset.clone(), v)))
            .collect()
    }

    /// Bring every configured dataset up to its remote version.
    pub async fn run(&self) -> Result<RunReport, SyncError> {
        let targets = self.targets().await?;

        let dir = self.layout.local_dir();
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| SyncError::Io {
                path: dir.to_path_buf(),
                source,
            })?;

        let planner = self.planner();
        let mut report = RunReport::default();

        for (dataset, remote) in targets {
            match planner.update(&dataset, remote).await {
                Ok(dataset_report) => report.updated.push(dataset_report),
                Err(e) => {
                    error!("{e}");
                    report.failed.push(DatasetFailure { dataset, error: e });

                    if self.policy == FailurePolicy::Abort {
                        report.aborted = true;
                        break;
                    }
                }
            }
        }

        Ok(report)
    }

    /// Report each dataset's local and remote versions and the plan an
    /// update would follow. Transfers nothing.
    pub async fn status(&self) -> Result<Vec<DatasetStatus>, SyncError> {
        let targets = self.targets().await?;
        let planner = self.planner();
        let mut statuses = Vec::with_capacity(targets.len());

        for (dataset, remote) in targets {
            let local = planner.inspect(&dataset).await.map_err(SyncError::Inspect)?;

            statuses.push(DatasetStatus {
                plan: plan(local, remote),
                dataset,
                local,
                remote,
            });
        }

        Ok(statuses)
    }
}
