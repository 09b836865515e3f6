use anyhow::Result;
use cvd_mirror::{DatasetStatus, DiffScan, Synchronizer};

/// Print local and remote versions and what a sync would do.
pub async fn run(sync: &Synchronizer) -> Result<()> {
    let statuses = sync.status().await?;

    println!("{:<14} {:>10} {:>10}  ACTION", "DATASET", "LOCAL", "REMOTE");
    for status in &statuses {
        println!("{}", format_status(status));
    }

    Ok(())
}

/// One table row for a dataset.
pub fn format_status(status: &DatasetStatus) -> String {
    let action = match (&status.plan.diff, status.plan.replace_base) {
        (_, false) => "up to date".to_owned(),
        (DiffScan::Window(window), true) => format!(
            "check cdiffs {}..={}, replace base",
            window.start(),
            window.end()
        ),
        (DiffScan::Skipped(reason), true) => format!("replace base (local file {reason})"),
    };

    format!(
        "{:<14} {:>10} {:>10}  {action}",
        status.dataset,
        status.local.to_string(),
        status.remote
    )
}

#[cfg(test)]
mod tests {
    use cvd_mirror::{LocalState, plan};

    use super::*;

    fn status(dataset: &str, local: LocalState, remote: u64) -> DatasetStatus {
        DatasetStatus {
            dataset: dataset.to_owned(),
            local,
            remote,
            plan: plan(local, remote),
        }
    }

    #[test]
    fn current_dataset_is_up_to_date() {
        let row = format_status(&status("main", LocalState::Version(62), 62));
        assert!(row.starts_with("main"));
        assert!(row.ends_with("up to date"));
    }

    #[test]
    fn behind_dataset_shows_window() {
        let row = format_status(&status("daily", LocalState::Version(25), 27));
        assert!(row.contains("25"));
        assert!(row.ends_with("check cdiffs 15..=27, replace base"));
    }

    #[test]
    fn missing_dataset_shows_reason() {
        let row = format_status(&status("bytecode", LocalState::Missing, 335));
        assert!(row.contains("missing"));
        assert!(row.ends_with("replace base (local file does not exist)"));
    }
}
