use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::fetch::{Fetcher, TransferError};
use crate::layout::MirrorLayout;
use crate::reader::VersionReader;

/// How far below the local version the patch scan starts.
pub const DIFF_BACKOFF: u64 = 10;

/// What is on disk for a dataset's base artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    Missing,
    /// Present but zero bytes.
    Empty,
    /// Present, but no version could be read from it.
    Unversioned,
    Version(u64),
}

impl LocalState {
    pub fn version(&self) -> Option<u64> {
        match self {
            Self::Version(v) => Some(*v),
            _ => None,
        }
    }
}

impl std::fmt::Display for LocalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "missing"),
            Self::Empty => write!(f, "empty"),
            Self::Unversioned => write!(f, "unknown"),
            Self::Version(v) => write!(f, "{v}"),
        }
    }
}

/// Why the patch scan was not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSkipReason {
    Missing,
    Empty,
    UnknownVersion,
    UpToDate,
}

impl std::fmt::Display for DiffSkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing => write!(f, "does not exist"),
            Self::Empty => write!(f, "is zero sized"),
            Self::UnknownVersion => write!(f, "version unknown"),
            Self::UpToDate => write!(f, "is already current"),
        }
    }
}

/// Which patch sequence numbers to consider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffScan {
    Window(RangeInclusive<u64>),
    Skipped(DiffSkipReason),
}

/// The decisions for one dataset, before any transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub diff: DiffScan,
    pub replace_base: bool,
}

/// Decide what a dataset needs to reach `remote`.
///
/// The scan window starts `DIFF_BACKOFF` below the local version (floored
/// at 0) and ends at `remote`, inclusive. The base is replaced whenever the
/// local version read before the scan differs from `remote`.
pub fn plan(local: LocalState, remote: u64) -> UpdatePlan {
    let diff = match local {
        LocalState::Missing => DiffScan::Skipped(DiffSkipReason::Missing),
        LocalState::Empty => DiffScan::Skipped(DiffSkipReason::Empty),
        LocalState::Unversioned | LocalState::Version(0) => {
            DiffScan::Skipped(DiffSkipReason::UnknownVersion)
        }
        LocalState::Version(v) if v == remote => DiffScan::Skipped(DiffSkipReason::UpToDate),
        LocalState::Version(v) => DiffScan::Window(v.saturating_sub(DIFF_BACKOFF)..=remote),
    };

    UpdatePlan {
        diff,
        replace_base: local.version() != Some(remote),
    }
}

/// How a dataset update ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AlreadyCurrent,
    Replaced,
}

/// Result of a successful dataset update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    pub dataset: String,
    pub local: LocalState,
    pub remote: u64,
    /// Patch sequence numbers downloaded during this run.
    pub patches_fetched: Vec<u64>,
    /// Patches in the window that were already on disk.
    pub patches_present: u64,
    pub outcome: Outcome,
}

/// Errors that can occur while updating one dataset.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("[{dataset}] transfer failed: {source}")]
    Transfer {
        dataset: String,
        #[source]
        source: TransferError,
    },

    #[error("[{dataset}] downloaded file {} is missing or empty", path.display())]
    Validation { dataset: String, path: PathBuf },

    #[error("[{dataset}] I/O error on {}: {source}", path.display())]
    Io {
        dataset: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Brings one dataset's local artifacts up to a remote version.
pub struct UpdatePlanner<'a> {
    layout: &'a MirrorLayout,
    fetcher: &'a dyn Fetcher,
    reader: &'a dyn VersionReader,
}

impl<'a> UpdatePlanner<'a> {
    pub fn new(
        layout: &'a MirrorLayout,
        fetcher: &'a dyn Fetcher,
        reader: &'a dyn VersionReader,
    ) -> Self {
        Self {
            layout,
            fetcher,
            reader,
        }
    }

    /// Look at the base artifact on disk.
    pub async fn inspect(&self, dataset: &str) -> Result<LocalState, UpdateError> {
        let path = self.layout.base_path(dataset);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LocalState::Missing),
            Err(source) => {
                return Err(UpdateError::Io {
                    dataset: dataset.to_owned(),
                    path,
                    source,
                });
            }
        };

        if metadata.len() == 0 {
            return Ok(LocalState::Empty);
        }

        Ok(match self.reader.local_version(&path).await {
            Some(v) => LocalState::Version(v),
            None => LocalState::Unversioned,
        })
    }

    /// Fetch missing patches, then replace the base if it is not current.
    pub async fn update(&self, dataset: &str, remote: u64) -> Result<DatasetReport, UpdateError> {
        let local = self.inspect(dataset).await?;
        let plan = plan(local, remote);

        debug!("{dataset} old: {local}, current: {remote}");

        let mut report = DatasetReport {
            dataset: dataset.to_owned(),
            local,
            remote,
            patches_fetched: Vec::new(),
            patches_present: 0,
            outcome: Outcome::AlreadyCurrent,
        };

        match plan.diff {
            DiffScan::Window(window) => {
                info!(
                    "Checking for '{dataset}' cdiff files ({}..={})",
                    window.start(),
                    window.end()
                );
                self.scan_patches(dataset, window, &mut report).await?;
            }
            DiffScan::Skipped(reason) => {
                debug!(
                    "File {} {reason}. Skipping cdiffs.",
                    self.layout.base_path(dataset).display()
                );
            }
        }

        if !plan.replace_base {
            debug!("Already at the latest version of '{dataset}.cvd'.");
            return Ok(report);
        }

        self.replace_base(dataset).await?;
        report.outcome = Outcome::Replaced;

        Ok(report)
    }

    async fn scan_patches(
        &self,
        dataset: &str,
        window: RangeInclusive<u64>,
        report: &mut DatasetReport,
    ) -> Result<(), UpdateError> {
        for sequence in window {
            let path = self.layout.patch_path(dataset, sequence);

            if is_valid(&path).await {
                debug!("Already have {}", path.display());
                report.patches_present += 1;
                continue;
            }

            let url = self.layout.patch_url(dataset, sequence);
            if let Err(source) = self.fetcher.fetch(&url, &path).await {
                // A partial patch must not pass for a complete one next run.
                discard(&path).await;
                return Err(UpdateError::Transfer {
                    dataset: dataset.to_owned(),
                    source,
                });
            }

            report.patches_fetched.push(sequence);
        }

        Ok(())
    }

    async fn replace_base(&self, dataset: &str) -> Result<(), UpdateError> {
        let temp = self.layout.temp_path(dataset);
        let base = self.layout.base_path(dataset);
        let url = self.layout.base_url(dataset);

        if let Err(source) = self.fetcher.fetch(&url, &temp).await {
            discard(&temp).await;
            return Err(UpdateError::Transfer {
                dataset: dataset.to_owned(),
                source,
            });
        }

        if !is_valid(&temp).await {
            debug!("Temporary file {} is not valid. Deleting.", temp.display());
            discard(&temp).await;
            return Err(UpdateError::Validation {
                dataset: dataset.to_owned(),
                path: temp,
            });
        }

        info!("Moving file '{}' to '{}'", temp.display(), base.display());
        if let Err(source) = tokio::fs::rename(&temp, &base).await {
            discard(&temp).await;
            return Err(UpdateError::Io {
                dataset: dataset.to_owned(),
                path: base,
                source,
            });
        }

        Ok(())
    }
}

/// A regular file with at least one byte.
async fn is_valid(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_file() && m.len() > 0)
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("could not remove {}: {e}", path.display()),
    }
}
