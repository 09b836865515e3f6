use std::path::{Path, PathBuf};

use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Default location of the `sigtool` binary.
pub const DEFAULT_SIGTOOL: &str = "/opt/clamav/current/bin/sigtool";

/// Size of the fixed header at the start of a CVD file.
const CVD_HEADER_LEN: usize = 512;

const CVD_MAGIC: &str = "ClamAV-VDB";

/// Reads the version embedded in a local base artifact.
///
/// `None` means the version is unknown. That is a normal outcome, not a
/// failure: the caller falls back to a full replacement.
#[async_trait::async_trait]
pub trait VersionReader: Send + Sync {
    async fn local_version(&self, path: &Path) -> Option<u64>;
}

/// Runs `sigtool -i <file>` and parses its `Version:` line.
#[derive(Debug, Clone)]
pub struct SigtoolReader {
    program: PathBuf,
}

impl SigtoolReader {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SigtoolReader {
    fn default() -> Self {
        Self::new(DEFAULT_SIGTOOL)
    }
}

#[async_trait::async_trait]
impl VersionReader for SigtoolReader {
    async fn local_version(&self, path: &Path) -> Option<u64> {
        debug!(
            "Running command: {} -i {}",
            self.program.display(),
            path.display()
        );

        let output = match tokio::process::Command::new(&self.program)
            .arg("-i")
            .arg(path)
            .output()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                warn!("could not run {}: {e}", self.program.display());
                return None;
            }
        };

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        parse_version_output(&text)
    }
}

/// Find the first line that is exactly `Version: <digits>`.
pub fn parse_version_output(output: &str) -> Option<u64> {
    output.lines().find_map(|line| {
        let digits = line.strip_prefix("Version: ")?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    })
}

/// Reads the version straight from the CVD header, without an external
/// program.
///
/// Header layout: `ClamAV-VDB:<build time>:<version>:<signatures>:...`,
/// space padded to 512 bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderReader;

#[async_trait::async_trait]
impl VersionReader for HeaderReader {
    async fn local_version(&self, path: &Path) -> Option<u64> {
        let mut file = match tokio::fs::File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                debug!("could not open {}: {e}", path.display());
                return None;
            }
        };

        let mut header = Vec::with_capacity(CVD_HEADER_LEN);
        if let Err(e) = (&mut file)
            .take(CVD_HEADER_LEN as u64)
            .read_to_end(&mut header)
            .await
        {
            debug!("could not read header of {}: {e}", path.display());
            return None;
        }

        parse_cvd_header(&header)
    }
}

/// Extract the version from raw CVD header bytes.
pub fn parse_cvd_header(header: &[u8]) -> Option<u64> {
    let text = std::str::from_utf8(header).ok()?;
    let mut fields = text.split(':');

    if fields.next()? != CVD_MAGIC {
        return None;
    }

    fields.nth(1)?.trim().parse().ok()
}
