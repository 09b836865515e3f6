use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use crate::reader::parse_version_output;
use crate::{
    FetchSummary, Fetcher, LookupError, RemoteVersions, TransferError, VersionDirectory,
    VersionReader,
};

/// In-memory mirror for testing. Serves registered bodies by URL and
/// answers everything else with HTTP 404.
#[derive(Default)]
pub struct FakeFetcher {
    bodies: HashMap<String, Vec<u8>>,
    failures: HashMap<String, u16>,
    silent: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.bodies.insert(url.into(), body.into());
    }

    /// Make `url` fail with the given status after writing `partial`
    /// bytes to the destination, like a connection cut mid-transfer.
    pub fn fail(&mut self, url: impl Into<String>, status: u16, partial: impl Into<Vec<u8>>) {
        let url = url.into();
        self.failures.insert(url.clone(), status);
        self.bodies.insert(url, partial.into());
    }

    /// Make `url` report success without creating the destination.
    pub fn serve_nothing(&mut self, url: impl Into<String>) {
        self.silent.insert(url.into());
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<FetchSummary, TransferError> {
        self.requests.lock().unwrap().push(url.to_owned());

        if self.silent.contains(url) {
            return Ok(FetchSummary::default());
        }

        let Some(body) = self.bodies.get(url) else {
            return Err(TransferError::Status {
                url: url.to_owned(),
                status: 404,
            });
        };

        tokio::fs::write(dest, body)
            .await
            .map_err(|source| TransferError::Io {
                url: url.to_owned(),
                path: dest.to_path_buf(),
                source,
            })?;

        if let Some(status) = self.failures.get(url) {
            return Err(TransferError::Status {
                url: url.to_owned(),
                status: *status,
            });
        }

        Ok(FetchSummary {
            bytes: body.len() as u64,
        })
    }
}

/// Directory that answers with a fixed set of records.
pub struct StaticDirectory {
    records: Vec<String>,
    lookups: Mutex<usize>,
}

impl StaticDirectory {
    pub fn new(records: Vec<String>) -> Self {
        Self {
            records,
            lookups: Mutex::new(0),
        }
    }

    /// Directory answering with one well-formed record.
    pub fn with_versions(main: u64, daily: u64, bytecode: u64) -> Self {
        Self::new(vec![format!(
            "0.103.11:{main}:{daily}:1702976940:1:90:49192:{bytecode}"
        )])
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl VersionDirectory for StaticDirectory {
    fn label(&self) -> &str {
        "static"
    }

    async fn remote_versions(&self) -> Result<RemoteVersions, LookupError> {
        *self.lookups.lock().unwrap() += 1;
        RemoteVersions::from_records(&self.records)
    }
}

/// Reads the version from a `Version: <n>` line in the file itself, so
/// tests can write base artifacts as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentVersionReader;

#[async_trait::async_trait]
impl VersionReader for ContentVersionReader {
    async fn local_version(&self, path: &Path) -> Option<u64> {
        let bytes = tokio::fs::read(path).await.ok()?;
        parse_version_output(&String::from_utf8_lossy(&bytes))
    }
}

/// Body of a fake base artifact at `version`.
pub fn base_body(version: u64) -> String {
    format!("Version: {version}\n")
}
