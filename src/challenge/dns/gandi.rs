use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{top_level_domain, DnsDataExtractor};
use crate::challenge::{send, AuthorizationChallenge, ChallengeKind, Solver};
use crate::protocol::{AcmeError, Transport, Url};

const GANDI_API: &str = "https://dns.api.gandi.net/api/v5";
const API_KEY_HEADER: &str = "X-Api-Key";
const RECORD_TTL: u32 = 600;

/// Credentials and endpoint for the Gandi LiveDNS API.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct GandiConfig {
    /// The LiveDNS API key, sent as the `X-Api-Key` header.
    pub api_key: String,

    /// Base URL of the API.
    #[serde(default = "default_api_base")]
    pub api_base: Url,
}

fn default_api_base() -> Url {
    GANDI_API.parse().expect("Gandi API URL is valid")
}

impl GandiConfig {
    /// Configuration for the public LiveDNS API.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: default_api_base(),
        }
    }
}

impl fmt::Debug for GandiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GandiConfig")
            .field("api_key", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

/// A LiveDNS resource record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GandiRecord {
    /// Record type, e.g. `TXT`.
    pub rrset_type: String,

    /// Time to live, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rrset_ttl: Option<u32>,

    /// Record name, relative to the zone.
    pub rrset_name: String,

    /// Record values.
    #[serde(default)]
    pub rrset_values: Vec<String>,
}

impl GandiRecord {
    fn txt(name: &str, values: Vec<String>) -> Self {
        Self {
            rrset_type: "TXT".to_owned(),
            rrset_ttl: Some(RECORD_TTL),
            rrset_name: name.to_owned(),
            rrset_values: values,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordPage {
    Paginated {
        #[serde(alias = "items")]
        data: Vec<GandiRecord>,
        #[serde(default)]
        pagination: Option<Pagination>,
    },
    Plain(Vec<GandiRecord>),
}

#[derive(Debug, Deserialize)]
struct Pagination {
    #[serde(default)]
    next: Option<String>,
}

/// The zone and relative record name targeted by a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordTarget {
    zone: String,
    name: String,
}

/// Solves DNS-01 challenges by writing TXT records through the Gandi LiveDNS API.
///
/// The zone is the last two labels of the domain. Records are upserted with `PUT`, so
/// solving twice replaces the earlier value, and removed with `DELETE`.
#[derive(Debug, Clone)]
pub struct GandiSolver {
    transport: Arc<dyn Transport>,
    config: GandiConfig,
    extractor: DnsDataExtractor,
}

impl GandiSolver {
    /// Create a solver which sends API calls through `transport`.
    pub fn new(transport: Arc<dyn Transport>, config: GandiConfig) -> Self {
        Self {
            transport,
            config,
            extractor: DnsDataExtractor,
        }
    }

    fn target(&self, challenge: &AuthorizationChallenge) -> RecordTarget {
        let zone = top_level_domain(challenge.domain());
        let record = self.extractor.record_name(challenge);
        let name = record
            .strip_suffix(&format!(".{zone}."))
            .unwrap_or_else(|| record.trim_end_matches('.'))
            .to_owned();
        RecordTarget { zone, name }
    }

    fn api_url(&self, path: &str) -> Result<Url, AcmeError> {
        let base = self.config.api_base.as_str().trim_end_matches('/');
        Ok(format!("{base}{path}").parse()?)
    }

    fn record_url(&self, target: &RecordTarget) -> Result<Url, AcmeError> {
        self.api_url(&format!(
            "/domains/{}/records/{}/TXT",
            target.zone, target.name
        ))
    }

    async fn upsert(&self, target: &RecordTarget, values: Vec<String>) -> Result<(), AcmeError> {
        let url = self.record_url(target)?;
        let body = serde_json::to_vec(&GandiRecord::txt(&target.name, values))
            .map_err(AcmeError::ser)?;

        tracing::debug!(zone = %target.zone, name = %target.name, "Upserting TXT record");
        send(
            &self.transport,
            http::Method::PUT,
            &url,
            &[(API_KEY_HEADER, self.config.api_key.as_str())],
            Some(body),
        )
        .await?;
        Ok(())
    }

    async fn delete(&self, target: &RecordTarget) -> Result<(), AcmeError> {
        let url = self.record_url(target)?;

        tracing::debug!(zone = %target.zone, name = %target.name, "Deleting TXT record");
        match send(
            &self.transport,
            http::Method::DELETE,
            &url,
            &[(API_KEY_HEADER, self.config.api_key.as_str())],
            None,
        )
        .await
        {
            Ok(_) => Ok(()),
            Err(AcmeError::Http { status, .. }) if status == http::StatusCode::NOT_FOUND => {
                tracing::debug!(zone = %target.zone, name = %target.name, "TXT record already absent");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    /// List every record in `zone`, following `pagination.next` links until they run out.
    pub async fn list_records(&self, zone: &str) -> Result<Vec<GandiRecord>, AcmeError> {
        let mut records = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(self.api_url(&format!("/domains/{zone}/records"))?);

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                tracing::warn!(%url, "Pagination loops back to a visited page");
                break;
            }

            let response = send(
                &self.transport,
                http::Method::GET,
                &url,
                &[(API_KEY_HEADER, self.config.api_key.as_str())],
                None,
            )
            .await?;

            let page: RecordPage =
                serde_json::from_slice(response.body()).map_err(|source| {
                    AcmeError::ExpectedJson {
                        body: String::from_utf8_lossy(response.body()).into_owned(),
                        source,
                    }
                })?;

            match page {
                RecordPage::Paginated { data, pagination } => {
                    records.extend(data);
                    if let Some(link) = pagination.and_then(|p| p.next) {
                        next = Some(url.join(&link)?.into());
                    }
                }
                RecordPage::Plain(data) => records.extend(data),
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl Solver for GandiSolver {
    fn kind(&self) -> ChallengeKind {
        ChallengeKind::Dns01
    }

    async fn solve(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError> {
        self.solve_all(std::slice::from_ref(challenge)).await
    }

    /// One `PUT` per distinct record. A wildcard and its base domain share a record,
    /// so both values are written to the same record set.
    #[tracing::instrument(skip_all, fields(challenges = challenges.len()))]
    async fn solve_all(&self, challenges: &[AuthorizationChallenge]) -> Result<(), AcmeError> {
        let mut records: Vec<(RecordTarget, Vec<String>)> = Vec::new();
        for challenge in challenges {
            let target = self.target(challenge);
            let value = self.extractor.record_value(challenge);
            match records.iter_mut().find(|(t, _)| *t == target) {
                Some((_, values)) => {
                    if !values.contains(&value) {
                        values.push(value);
                    }
                }
                None => records.push((target, vec![value])),
            }
        }

        for (target, values) in records {
            self.upsert(&target, values).await?;
        }
        Ok(())
    }

    async fn cleanup(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError> {
        self.cleanup_all(std::slice::from_ref(challenge)).await
    }

    /// One `DELETE` per distinct record. Every record is attempted, and the first
    /// error is returned.
    #[tracing::instrument(skip_all, fields(challenges = challenges.len()))]
    async fn cleanup_all(&self, challenges: &[AuthorizationChallenge]) -> Result<(), AcmeError> {
        let mut targets: Vec<RecordTarget> = Vec::new();
        for challenge in challenges {
            let target = self.target(challenge);
            if !targets.contains(&target) {
                targets.push(target);
            }
        }

        let mut result = Ok(());
        for target in &targets {
            if let Err(error) = self.delete(target).await {
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn solver() -> GandiSolver {
        let transport: Arc<dyn Transport> = Arc::new(reqwest::Client::new());
        GandiSolver::new(transport, GandiConfig::new("stub"))
    }

    fn challenge(domain: &str) -> AuthorizationChallenge {
        AuthorizationChallenge::new(
            domain,
            "dns-01",
            "https://example.com/acme/chall/1".parse().unwrap(),
            "token",
            "token.thumb",
        )
    }

    #[test]
    fn record_target_from_domain() {
        let solver = solver();
        let target = solver.target(&challenge("sub-domain.bar.com"));
        assert_eq!(target.zone, "bar.com");
        assert_eq!(target.name, "_acme-challenge.sub-domain");
        assert_eq!(
            solver.record_url(&target).unwrap().as_str(),
            "https://dns.api.gandi.net/api/v5/domains/bar.com/records/_acme-challenge.sub-domain/TXT"
        );

        let apex = solver.target(&challenge("*.bar.com"));
        assert_eq!(apex.name, "_acme-challenge");
    }

    #[test]
    fn record_target_from_fully_qualified_domain() {
        let target = solver().target(&challenge("sub-domain.bar.com."));
        assert_eq!(target.zone, "bar.com");
        assert_eq!(target.name, "_acme-challenge.sub-domain");
    }

    #[test]
    fn record_body_field_order() {
        let body =
            serde_json::to_string(&GandiRecord::txt("_acme-challenge.sub-domain", vec!["record_value".into()]))
                .unwrap();
        assert_eq!(
            body,
            r#"{"rrset_type":"TXT","rrset_ttl":600,"rrset_name":"_acme-challenge.sub-domain","rrset_values":["record_value"]}"#
        );
    }

    #[test]
    fn config_defaults_api_base() {
        let config: GandiConfig = serde_json::from_str(r#"{"api_key": "stub"}"#).unwrap();
        assert_eq!(config, GandiConfig::new("stub"));
        assert!(!format!("{config:?}").contains("stub"));
    }

    #[test]
    fn record_pages() {
        let page: RecordPage = serde_json::from_str(
            r#"{"data": [{"rrset_type": "A", "rrset_name": "@", "rrset_values": ["192.0.2.1"]}],
                "pagination": {"next": "https://dns.api.gandi.net/api/v5/domains/bar.com/records?page=2"}}"#,
        )
        .unwrap();
        assert!(matches!(page, RecordPage::Paginated { pagination: Some(Pagination { next: Some(_) }), .. }));

        let page: RecordPage = serde_json::from_str(
            r#"[{"rrset_type": "TXT", "rrset_ttl": 300, "rrset_name": "_acme-challenge", "rrset_values": []}]"#,
        )
        .unwrap();
        assert!(matches!(page, RecordPage::Plain(records) if records[0].rrset_ttl == Some(300)));
    }
}
