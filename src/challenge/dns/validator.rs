use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfig, ResolverConfig, ResolverOpts};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::xfer::Protocol;
use hickory_resolver::{Resolver, TokioResolver};
use serde::Deserialize;

use super::DnsDataExtractor;
use crate::challenge::{AuthorizationChallenge, ChallengeKind, Solver, Validator};
use crate::protocol::transport::BoxError;

/// Looks up TXT records.
#[async_trait]
pub trait TxtResolver: std::fmt::Debug + Send + Sync {
    /// All TXT strings at `name`. Multi-part records are joined into one string.
    async fn txt_records(&self, name: &str) -> Result<Vec<String>, BoxError>;
}

/// Nameservers to query when checking DNS-01 records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DnsValidatorConfig {
    /// Nameservers to ask directly. When empty, the resolver's default upstreams are used.
    #[serde(default)]
    pub nameservers: Vec<SocketAddr>,
}

/// A [`TxtResolver`] backed by `hickory-resolver`, with caching disabled so that
/// repeated checks see fresh answers.
#[derive(Debug)]
pub struct HickoryResolver {
    resolver: TokioResolver,
}

impl HickoryResolver {
    /// Build a resolver for the given configuration.
    pub fn new(config: &DnsValidatorConfig) -> Self {
        let resolver_config = if config.nameservers.is_empty() {
            ResolverConfig::default()
        } else {
            let mut resolver_config = ResolverConfig::new();
            for addr in &config.nameservers {
                resolver_config.add_name_server(NameServerConfig::new(*addr, Protocol::Udp));
            }
            resolver_config
        };

        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_secs(5);
        opts.attempts = 2;
        opts.cache_size = 0;

        let resolver =
            Resolver::builder_with_config(resolver_config, TokioConnectionProvider::default())
                .with_options(opts)
                .build();
        Self { resolver }
    }
}

#[async_trait]
impl TxtResolver for HickoryResolver {
    async fn txt_records(&self, name: &str) -> Result<Vec<String>, BoxError> {
        let lookup = self.resolver.txt_lookup(name).await?;
        Ok(lookup
            .iter()
            .map(|record| {
                record
                    .txt_data()
                    .iter()
                    .map(|data| String::from_utf8_lossy(data))
                    .collect()
            })
            .collect())
    }
}

/// Resolves the DNS-01 TXT record and compares it with the expected digest.
#[derive(Debug, Clone)]
pub struct DnsValidator {
    resolver: Arc<dyn TxtResolver>,
    extractor: DnsDataExtractor,
}

impl DnsValidator {
    /// A validator using `hickory-resolver` with the given nameservers.
    pub fn new(config: &DnsValidatorConfig) -> Self {
        Self::with_resolver(Arc::new(HickoryResolver::new(config)))
    }

    /// A validator using a custom resolver.
    pub fn with_resolver(resolver: Arc<dyn TxtResolver>) -> Self {
        Self {
            resolver,
            extractor: DnsDataExtractor,
        }
    }
}

#[async_trait]
impl Validator for DnsValidator {
    fn supports(&self, challenge: &AuthorizationChallenge, solver: &dyn Solver) -> bool {
        *challenge.kind() == ChallengeKind::Dns01 && solver.externally_observable()
    }

    async fn is_valid(&self, challenge: &AuthorizationChallenge, _solver: &dyn Solver) -> bool {
        let name = self.extractor.record_name(challenge);
        let expected = self.extractor.record_value(challenge);

        match self.resolver.txt_records(&name).await {
            Ok(values) => {
                tracing::trace!(record = %name, ?values, %expected, "Checking TXT record");
                values.iter().any(|value| *value == expected)
            }
            Err(error) => {
                tracing::debug!(record = %name, "DNS lookup failed: {error}");
                false
            }
        }
    }
}
