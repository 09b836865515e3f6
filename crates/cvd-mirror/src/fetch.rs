use std::path::{Path, PathBuf};

/// Errors that can occur while transferring an artifact.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("client setup failed: {0}")]
    Client(String),

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("writing {url} to {} failed: {source}", path.display())]
    Io {
        url: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a completed transfer produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchSummary {
    pub bytes: u64,
}

/// Retrieves a remote artifact into a local file.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Stream everything at `url` into `dest`, creating or truncating it.
    ///
    /// On error the contents of `dest` are undefined; callers validate
    /// before trusting it.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchSummary, TransferError>;
}

/// Percentage step at which progress is reported.
const PROGRESS_STEP: u8 = 5;

/// Per-transfer progress tracker.
///
/// Reports each 5% boundary at most once, so large transfers do not
/// flood the log. Owned by a single transfer.
#[derive(Debug, Clone)]
pub struct Progress {
    total: Option<u64>,
    reported: u8,
}

impl Progress {
    pub fn new(total: Option<u64>) -> Self {
        Self { total, reported: 0 }
    }

    /// Record `current` bytes received. Returns the newly crossed
    /// boundary, if any.
    pub fn advance(&mut self, current: u64) -> Option<u8> {
        let total = self.total.filter(|t| *t > 0)?;
        let percent = (u128::from(current.min(total)) * 100 / u128::from(total)) as u8;
        let boundary = percent - percent % PROGRESS_STEP;

        if boundary > self.reported {
            self.reported = boundary;
            Some(boundary)
        } else {
            None
        }
    }
}
