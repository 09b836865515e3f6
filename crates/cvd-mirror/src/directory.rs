use std::str::FromStr;

/// Field names of the version record, in wire order.
pub const DATASET_FIELDS: [&str; 8] = [
    "clam",
    "main",
    "daily",
    "x",
    "y",
    "z",
    "safebrowsing",
    "bytecode",
];

/// Fields that hold a dataset version and can be synced.
const VERSIONED_FIELDS: [&str; 4] = ["main", "daily", "safebrowsing", "bytecode"];

/// Errors that can occur while discovering remote versions.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("lookup failed: {0}")]
    Resolve(String),

    #[error("expected exactly 1 version record, got {0}")]
    RecordCount(usize),

    #[error("expected {expected} fields in version record, got {found}: {record:?}")]
    FieldCount {
        expected: usize,
        found: usize,
        record: String,
    },

    #[error("field `{field}` is not a version number: {value:?}")]
    InvalidVersion { field: String, value: String },

    #[error("unknown dataset `{0}`")]
    UnknownDataset(String),
}

/// The authoritative version record, decomposed into its fixed fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVersions {
    fields: [String; 8],
}

impl RemoteVersions {
    /// Build from the full answer of a lookup. The answer must hold
    /// exactly one record.
    pub fn from_records<S: AsRef<str>>(records: &[S]) -> Result<Self, LookupError> {
        match records {
            [record] => record.as_ref().parse(),
            _ => Err(LookupError::RecordCount(records.len())),
        }
    }

    /// Raw text of a named field.
    pub fn field(&self, name: &str) -> Option<&str> {
        DATASET_FIELDS
            .iter()
            .position(|f| *f == name)
            .map(|idx| self.fields[idx].as_str())
    }

    /// Engine version advertised alongside the datasets.
    pub fn engine_version(&self) -> &str {
        &self.fields[0]
    }

    /// Current version of a dataset.
    pub fn version(&self, dataset: &str) -> Result<u64, LookupError> {
        if !VERSIONED_FIELDS.contains(&dataset) {
            return Err(LookupError::UnknownDataset(dataset.to_owned()));
        }

        let value = self
            .field(dataset)
            .ok_or_else(|| LookupError::UnknownDataset(dataset.to_owned()))?;

        value.parse().map_err(|_| LookupError::InvalidVersion {
            field: dataset.to_owned(),
            value: value.to_owned(),
        })
    }
}

impl FromStr for RemoteVersions {
    type Err = LookupError;

    fn from_str(record: &str) -> Result<Self, Self::Err> {
        let text = record.trim().trim_matches('"');
        let parts: Vec<&str> = text.split(':').collect();

        let fields: [String; 8] = parts
            .iter()
            .map(|p| p.trim().to_owned())
            .collect::<Vec<_>>()
            .try_into()
            .map_err(|_| LookupError::FieldCount {
                expected: DATASET_FIELDS.len(),
                found: parts.len(),
                record: text.to_owned(),
            })?;

        Ok(Self { fields })
    }
}

/// Reports the current version of every dataset in one round trip.
#[async_trait::async_trait]
pub trait VersionDirectory: Send + Sync {
    /// Human-readable label (e.g. the domain queried).
    fn label(&self) -> &str;

    async fn remote_versions(&self) -> Result<RemoteVersions, LookupError>;
}
