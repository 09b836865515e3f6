use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cvd_mirror::layout::{DEFAULT_LOCAL_DIR, DEFAULT_MIRROR_URL};
use cvd_mirror::reader::DEFAULT_SIGTOOL;
use cvd_mirror::sync::DEFAULT_DATASETS;
use cvd_mirror::FailurePolicy;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub mirror_url: String,
    pub local_dir: PathBuf,
    pub datasets: Vec<String>,
    pub on_error: FailurePolicy,
    pub dns_domain: String,
    pub user_agent: String,
    pub connect_timeout_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub version_reader: VersionReaderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mirror_url: DEFAULT_MIRROR_URL.into(),
            local_dir: DEFAULT_LOCAL_DIR.into(),
            datasets: DEFAULT_DATASETS.iter().map(|d| (*d).to_owned()).collect(),
            on_error: FailurePolicy::default(),
            dns_domain: cvd_mirror_dns::DEFAULT_DOMAIN.into(),
            user_agent: cvd_mirror_http::default_user_agent(),
            connect_timeout_secs: Some(30),
            timeout_secs: None,
            version_reader: VersionReaderConfig::default(),
        }
    }
}

/// How the version of a local base file is read.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum VersionReaderConfig {
    /// Run `sigtool -i` and parse its output.
    #[serde(rename = "sigtool")]
    Sigtool {
        #[serde(default = "default_sigtool")]
        program: PathBuf,
    },

    /// Parse the CVD header directly.
    #[serde(rename = "header")]
    Header,
}

impl Default for VersionReaderConfig {
    fn default() -> Self {
        Self::Sigtool {
            program: default_sigtool(),
        }
    }
}

fn default_sigtool() -> PathBuf {
    DEFAULT_SIGTOOL.into()
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct Overrides {
    pub mirror_url: Option<String>,
    pub local_dir: Option<PathBuf>,
    pub datasets: Vec<String>,
    pub on_error: Option<FailurePolicy>,
}

impl AppConfig {
    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(url) = overrides.mirror_url {
            self.mirror_url = url;
        }
        if let Some(dir) = overrides.local_dir {
            self.local_dir = dir;
        }
        if !overrides.datasets.is_empty() {
            self.datasets = overrides.datasets;
        }
        if let Some(policy) = overrides.on_error {
            self.on_error = policy;
        }
    }
}

/// Config file path: `~/.config/cvd-mirror/config.toml`
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cvd-mirror").join("config.toml"))
}

/// Load config from an explicit path, or from the default path falling
/// back to defaults if it is missing or unreadable.
///
/// An explicit path must exist and parse.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = explicit {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        return toml::from_str(&contents)
            .with_context(|| format!("failed to parse config at {}", path.display()));
    }

    if let Some(path) = config_path()
        && let Ok(contents) = std::fs::read_to_string(&path)
    {
        if let Ok(config) = toml::from_str::<AppConfig>(&contents) {
            return Ok(config);
        }
        warn!(
            "failed to parse config at {}, using defaults",
            path.display()
        );
    }

    Ok(AppConfig::default())
}
