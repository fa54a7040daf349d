use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::challenge::{send, AuthorizationChallenge, ChallengeKind, Solver};
use crate::protocol::{AcmeError, Transport, Url};

const MOCK_SERVER_URL: &str = "http://localhost:8055";

/// Where to find the pebble-challtestsrv control API.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MockServerConfig {
    /// Base URL of the management interface.
    #[serde(default = "default_base_url")]
    pub base_url: Url,
}

fn default_base_url() -> Url {
    MOCK_SERVER_URL
        .parse()
        .expect("mock server URL is valid")
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

/// Solves HTTP-01 challenges by registering them with the pebble challenge test
/// server, which then serves them to pebble.
///
/// This is test tooling. The challenge server only answers pebble, so its proofs are
/// not [externally observable][Solver::externally_observable].
#[derive(Debug, Clone)]
pub struct MockServerHttpSolver {
    transport: Arc<dyn Transport>,
    config: MockServerConfig,
}

#[derive(Debug, Serialize)]
struct Http01ChallengeSetup<'c> {
    token: &'c str,
    content: &'c str,
}

#[derive(Debug, Serialize)]
struct Http01ChallengeRemoval<'c> {
    token: &'c str,
}

impl MockServerHttpSolver {
    /// A solver for the challenge server at `http://localhost:8055`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, MockServerConfig::default())
    }

    /// A solver for the challenge server described by `config`.
    pub fn with_config(transport: Arc<dyn Transport>, config: MockServerConfig) -> Self {
        Self { transport, config }
    }

    fn endpoint(&self, name: &str) -> Result<Url, AcmeError> {
        let base = self.config.base_url.as_str().trim_end_matches('/');
        Ok(format!("{base}/{name}").parse()?)
    }

    async fn post<T: Serialize>(&self, name: &str, body: &T) -> Result<(), AcmeError> {
        let url = self.endpoint(name)?;
        let body = serde_json::to_vec(body).map_err(AcmeError::ser)?;
        tracing::trace!("Challenge setup:\n{}", String::from_utf8_lossy(&body));

        send(&self.transport, http::Method::POST, &url, &[], Some(body)).await?;
        Ok(())
    }
}

#[async_trait]
impl Solver for MockServerHttpSolver {
    fn kind(&self) -> ChallengeKind {
        ChallengeKind::Http01
    }

    fn externally_observable(&self) -> bool {
        false
    }

    #[tracing::instrument(skip_all, fields(domain = challenge.domain()))]
    async fn solve(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError> {
        tracing::debug!("Registering HTTP-01 token with the challenge server");
        self.post(
            "add-http01",
            &Http01ChallengeSetup {
                token: challenge.token(),
                content: challenge.payload(),
            },
        )
        .await
    }

    #[tracing::instrument(skip_all, fields(domain = challenge.domain()))]
    async fn cleanup(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError> {
        tracing::debug!("Removing HTTP-01 token from the challenge server");
        self.post(
            "del-http01",
            &Http01ChallengeRemoval {
                token: challenge.token(),
            },
        )
        .await
    }
}
