use std::path::Path;
use std::time::Duration;

use cvd_mirror::{FetchSummary, Fetcher, Progress, TransferError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Transport settings for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub user_agent: String,
    pub connect_timeout: Option<Duration>,
    /// Limit on a whole transfer, body included.
    pub timeout: Option<Duration>,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            connect_timeout: Some(Duration::from_secs(30)),
            timeout: None,
        }
    }
}

pub fn default_user_agent() -> String {
    format!("cvd-mirror/{}", env!("CARGO_PKG_VERSION"))
}

/// Downloads artifacts over HTTP(S).
///
/// This is a pure transport utility: it streams a URL into a file and
/// knows nothing about datasets or versions.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: HttpFetcherConfig) -> Result<Self, TransferError> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent);

        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder
            .build()
            .map_err(|e| TransferError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchSummary, TransferError> {
        info!("Fetching '{url}' to file '{}'...", dest.display());

        let request_error = |e: reqwest::Error| TransferError::Request {
            url: url.to_owned(),
            message: e.to_string(),
        };
        let io_error = |source: std::io::Error| TransferError::Io {
            url: url.to_owned(),
            path: dest.to_path_buf(),
            source,
        };

        let mut response = self.client.get(url).send().await.map_err(request_error)?;

        if !response.status().is_success() {
            return Err(TransferError::Status {
                url: url.to_owned(),
                status: response.status().as_u16(),
            });
        }

        let mut progress = Progress::new(response.content_length());
        let mut file = tokio::fs::File::create(dest).await.map_err(io_error)?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(request_error)? {
            file.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;

            if let Some(percent) = progress.advance(written) {
                debug!("{percent}%");
            }
        }

        file.flush().await.map_err(io_error)?;

        Ok(FetchSummary { bytes: written })
    }
}
