use std::sync::Arc;

use async_trait::async_trait;

use super::HttpDataExtractor;
use crate::challenge::{send, AuthorizationChallenge, ChallengeKind, Solver, Validator};
use crate::protocol::{AcmeError, Transport};

/// Fetches the HTTP-01 resource and compares it with the expected key authorization.
#[derive(Debug, Clone)]
pub struct HttpValidator {
    transport: Arc<dyn Transport>,
    extractor: HttpDataExtractor,
}

impl HttpValidator {
    /// Create a validator which fetches challenge resources through `transport`.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            extractor: HttpDataExtractor,
        }
    }

    async fn fetch(&self, challenge: &AuthorizationChallenge) -> Result<String, AcmeError> {
        let url = self.extractor.check_url(challenge)?;
        let response = send(&self.transport, http::Method::GET, &url, &[], None).await?;
        Ok(String::from_utf8_lossy(response.body()).into_owned())
    }
}

#[async_trait]
impl Validator for HttpValidator {
    fn supports(&self, challenge: &AuthorizationChallenge, solver: &dyn Solver) -> bool {
        *challenge.kind() == ChallengeKind::Http01 && solver.externally_observable()
    }

    async fn is_valid(&self, challenge: &AuthorizationChallenge, _solver: &dyn Solver) -> bool {
        match self.fetch(challenge).await {
            Ok(body) => body.trim() == self.extractor.check_content(challenge).trim(),
            Err(error) => {
                tracing::debug!(domain = challenge.domain(), "HTTP-01 check failed: {error}");
                false
            }
        }
    }
}
