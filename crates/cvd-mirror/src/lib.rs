pub mod directory;
pub mod fetch;
pub mod layout;
pub mod planner;
pub mod reader;
pub mod sync;

pub use directory::{DATASET_FIELDS, LookupError, RemoteVersions, VersionDirectory};
pub use fetch::{FetchSummary, Fetcher, Progress, TransferError};
pub use layout::MirrorLayout;
pub use planner::{
    DatasetReport, DiffScan, DiffSkipReason, LocalState, Outcome, UpdateError, UpdatePlan,
    UpdatePlanner, plan,
};
pub use reader::{HeaderReader, SigtoolReader, VersionReader};
pub use sync::{DatasetFailure, DatasetStatus, FailurePolicy, RunReport, SyncError, Synchronizer};

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
