use cvd_mirror::{LookupError, RemoteVersions, VersionDirectory};
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveErrorKind, ResolveResult};
use tracing::{debug, warn};

/// Domain whose TXT record carries the current dataset versions.
pub const DEFAULT_DOMAIN: &str = "current.cvd.clamav.net";

/// Discovers remote versions from a DNS TXT record.
pub struct TxtDirectory {
    domain: String,
    resolver: TokioAsyncResolver,
}

impl TxtDirectory {
    /// Use the host's resolver configuration, or public defaults when it
    /// cannot be read.
    pub fn new(domain: impl Into<String>) -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|e| {
            warn!("could not read system resolver config ({e}), using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });

        Self::with_resolver(domain, resolver)
    }

    pub fn with_resolver(domain: impl Into<String>, resolver: TokioAsyncResolver) -> Self {
        Self {
            domain: domain.into(),
            resolver,
        }
    }
}

#[async_trait::async_trait]
impl VersionDirectory for TxtDirectory {
    fn label(&self) -> &str {
        &self.domain
    }

    async fn remote_versions(&self) -> Result<RemoteVersions, LookupError> {
        let answer = self
            .resolver
            .txt_lookup(self.domain.as_str())
            .await
            .map(|lookup| {
                lookup
                    .iter()
                    .map(|txt| join_character_strings(txt.txt_data()))
                    .collect::<Vec<_>>()
            });
        let records = records_from_answer(&self.domain, answer)?;

        debug!("{} answered {records:?}", self.domain);
        RemoteVersions::from_records(&records)
    }
}

/// An empty answer is not a resolver failure: it reaches the strict parser
/// as zero records.
pub fn records_from_answer(
    domain: &str,
    answer: ResolveResult<Vec<String>>,
) -> Result<Vec<String>, LookupError> {
    match answer {
        Ok(records) => Ok(records),
        Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(LookupError::Resolve(format!("{domain}: {e}"))),
    }
}

/// A TXT record may be split into several character-strings; they form
/// one value when concatenated.
pub fn join_character_strings(parts: &[Box<[u8]>]) -> String {
    parts
        .iter()
        .map(|part| String::from_utf8_lossy(part))
        .collect()
}

#[cfg(test)]
mod tests {
    use hickory_resolver::error::ResolveError;
    use hickory_resolver::proto::op::{Query, ResponseCode};
    use hickory_resolver::proto::rr::{Name, RecordType};

    use super::*;

    fn no_records() -> ResolveError {
        let name = Name::from_ascii("current.cvd.clamav.net.").unwrap();
        ResolveErrorKind::NoRecordsFound {
            query: Box::new(Query::query(name, RecordType::TXT)),
            soa: None,
            negative_ttl: None,
            response_code: ResponseCode::NXDomain,
            trusted: true,
        }
        .into()
    }

    fn parts(strings: &[&str]) -> Vec<Box<[u8]>> {
        strings
            .iter()
            .map(|s| s.as_bytes().to_vec().into_boxed_slice())
            .collect()
    }

    #[test]
    fn single_string_is_returned_verbatim() {
        let joined = join_character_strings(&parts(&["0.103.11:62:27123:1702976940:1:90:49192:335"]));
        assert_eq!(joined, "0.103.11:62:27123:1702976940:1:90:49192:335");
    }

    #[test]
    fn split_strings_are_concatenated() {
        let joined = join_character_strings(&parts(&["0.103.11:62:27123:", "1702976940:1:90:49192:335"]));
        let versions = RemoteVersions::from_records(&[joined]).unwrap();
        assert_eq!(versions.version("bytecode").unwrap(), 335);
    }

    #[tokio::test]
    async fn label_is_the_queried_domain() {
        let directory = TxtDirectory::with_resolver(
            DEFAULT_DOMAIN,
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
        );
        assert_eq!(directory.label(), "current.cvd.clamav.net");
    }

    #[test]
    fn answered_records_pass_through() {
        let records = vec!["0.103.11:62:27123:1702976940:1:90:49192:335".to_owned()];
        let result = records_from_answer(DEFAULT_DOMAIN, Ok(records.clone())).unwrap();
        assert_eq!(result, records);
    }

    #[test]
    fn no_records_becomes_an_empty_answer() {
        let records = records_from_answer(DEFAULT_DOMAIN, Err(no_records())).unwrap();
        assert!(records.is_empty());

        let err = RemoteVersions::from_records(&records).unwrap_err();
        assert!(matches!(err, LookupError::RecordCount(0)));
    }

    #[test]
    fn other_resolver_failures_are_resolve_errors() {
        let timeout: ResolveError = ResolveErrorKind::Timeout.into();
        let err = records_from_answer(DEFAULT_DOMAIN, Err(timeout)).unwrap_err();
        let LookupError::Resolve(message) = err else {
            panic!("expected a resolve error, got {err:?}");
        };
        assert!(message.starts_with("current.cvd.clamav.net: "));
    }
}
