use std::path::{Path, PathBuf};

/// Default remote mirror.
pub const DEFAULT_MIRROR_URL: &str = "http://database.clamav.net";

/// Default local storage root.
pub const DEFAULT_LOCAL_DIR: &str = "/var/tmp/clam";

/// Where artifacts live, both on the mirror and on local disk.
///
/// Layout:
/// - base: `{mirror}/{name}.cvd` and `{dir}/{name}.cvd`
/// - patch: `{mirror}/{name}-{n}.cdiff` and `{dir}/{name}-{n}.cdiff`
/// - temporary download: `{dir}/{name}.cvd.tmp`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorLayout {
    mirror_url: String,
    local_dir: PathBuf,
}

impl MirrorLayout {
    pub fn new(mirror_url: impl Into<String>, local_dir: impl Into<PathBuf>) -> Self {
        let mirror_url = mirror_url.into();
        let mirror_url = mirror_url.trim_end_matches('/').to_owned();

        Self {
            mirror_url,
            local_dir: local_dir.into(),
        }
    }

    pub fn mirror_url(&self) -> &str {
        &self.mirror_url
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn base_url(&self, dataset: &str) -> String {
        format!("{}/{}", self.mirror_url, base_file_name(dataset))
    }

    pub fn patch_url(&self, dataset: &str, sequence: u64) -> String {
        format!("{}/{}", self.mirror_url, patch_file_name(dataset, sequence))
    }

    pub fn base_path(&self, dataset: &str) -> PathBuf {
        self.local_dir.join(base_file_name(dataset))
    }

    pub fn patch_path(&self, dataset: &str, sequence: u64) -> PathBuf {
        self.local_dir.join(patch_file_name(dataset, sequence))
    }

    pub fn temp_path(&self, dataset: &str) -> PathBuf {
        self.local_dir.join(format!("{}.tmp", base_file_name(dataset)))
    }
}

impl Default for MirrorLayout {
    fn default() -> Self {
        Self::new(DEFAULT_MIRROR_URL, DEFAULT_LOCAL_DIR)
    }
}

fn base_file_name(dataset: &str) -> String {
    format!("{dataset}.cvd")
}

fn patch_file_name(dataset: &str, sequence: u64) -> String {
    format!("{dataset}-{sequence}.cdiff")
}
