use anyhow::Result;
use cvd_mirror::{Outcome, Synchronizer};
use tracing::{info, warn};

/// Run one sync pass and log a summary per dataset.
///
/// Fails when any dataset failed, after the failure policy has run.
pub async fn run(sync: &Synchronizer) -> Result<()> {
    let report = sync.run().await?;

    for dataset in &report.updated {
        let state = match dataset.outcome {
            Outcome::AlreadyCurrent => "already current",
            Outcome::Replaced => "replaced",
        };
        info!(
            "{}: {} -> {} ({state}, {} cdiffs fetched, {} present)",
            dataset.dataset,
            dataset.local,
            dataset.remote,
            dataset.patches_fetched.len(),
            dataset.patches_present,
        );
    }

    if report.aborted {
        let remaining = sync.datasets().len() - report.updated.len() - report.failed.len();
        warn!("aborted after first failure; {remaining} dataset(s) not attempted");
    }

    if !report.is_success() {
        let names: Vec<&str> = report.failed.iter().map(|f| f.dataset.as_str()).collect();
        anyhow::bail!(
            "{} of {} datasets failed: {}",
            report.failed.len(),
            sync.datasets().len(),
            names.join(", ")
        );
    }

    Ok(())
}
