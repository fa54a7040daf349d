use std::fmt;

use async_trait::async_trait;

use super::{AuthorizationChallenge, ChallengeKind};
use crate::protocol::AcmeError;

/// Publishes the proof for a challenge, and retracts it afterwards.
///
/// A solver handles exactly one [`ChallengeKind`]. Solvers which gain nothing from
/// batching only implement [`Solver::solve`] and [`Solver::cleanup`]; providers with
/// expensive per-call setup (a DNS zone API) override [`Solver::solve_all`] and
/// [`Solver::cleanup_all`] to make fewer calls.
///
/// Errors from the underlying transport or API are returned unchanged, and are never
/// retried here.
#[async_trait]
pub trait Solver: fmt::Debug + Send + Sync {
    /// The kind of challenge this solver satisfies.
    fn kind(&self) -> ChallengeKind;

    /// Can this solver handle this particular challenge?
    fn supports(&self, challenge: &AuthorizationChallenge) -> bool {
        *challenge.kind() == self.kind()
    }

    /// Whether the published proof can be observed from outside, by fetching the HTTP
    /// resource or resolving the DNS record. Test harness solvers return `false`, so that
    /// validators skip them.
    fn externally_observable(&self) -> bool {
        true
    }

    /// Publish the proof for a single challenge.
    async fn solve(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError>;

    /// Publish the proof for several challenges at once.
    async fn solve_all(&self, challenges: &[AuthorizationChallenge]) -> Result<(), AcmeError> {
        for challenge in challenges {
            self.solve(challenge).await?;
        }
        Ok(())
    }

    /// Retract the proof for a single challenge.
    ///
    /// This must be safe to call when [`Solver::solve`] failed part way.
    async fn cleanup(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError>;

    /// Retract the proof for several challenges at once.
    ///
    /// Every challenge is attempted, and the first error is returned.
    async fn cleanup_all(&self, challenges: &[AuthorizationChallenge]) -> Result<(), AcmeError> {
        let mut result = Ok(());
        for challenge in challenges {
            if let Err(error) = self.cleanup(challenge).await {
                tracing::debug!(domain = challenge.domain(), "Cleanup failed: {error}");
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
    use std::sync::Mutex;

    use super::*;

    fn cleanup_failed() -> AcmeError {
        AcmeError::Http {
            status: ::http::StatusCode::INTERNAL_SERVER_ERROR,
            body: "cleanup failed".to_owned(),
        }
    }

    #[derive(Debug, Default)]
    struct Recording {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Solver for Recording {
        fn kind(&self) -> ChallengeKind {
            ChallengeKind::Http01
        }

        async fn solve(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("solve {}", challenge.domain()));
            Ok(())
        }

        async fn cleanup(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("cleanup {}", challenge.domain()));
            if challenge.domain() == "a.example.org" {
                return Err(cleanup_failed());
            }
            Ok(())
        }
    }

    fn challenge(domain: &str) -> AuthorizationChallenge {
        AuthorizationChallenge::new(
            domain,
            ChallengeKind::Http01,
            "https://example.com/acme/chall/1".parse().unwrap(),
            "token",
            "token.thumb",
        )
    }

    #[tokio::test]
    async fn default_batches_loop_over_single_calls() {
        let solver = Recording::default();
        let challenges = vec![challenge("a.example.org"), challenge("b.example.org")];

        solver.solve_all(&challenges).await.unwrap();
        let error = solver.cleanup_all(&challenges).await.unwrap_err();
        assert!(matches!(
            error,
            AcmeError::Http { status, .. } if status == ::http::StatusCode::INTERNAL_SERVER_ERROR
        ));

        assert_eq!(
            *solver.calls.lock().unwrap(),
            vec![
                "solve a.example.org",
                "solve b.example.org",
                "cleanup a.example.org",
                "cleanup b.example.org",
            ]
        );
    }

    #[test]
    fn supports_matching_kind() {
        let solver = Recording::default();
        assert!(solver.supports(&challenge("example.org")));
        assert!(solver.externally_observable());

        let dns = AuthorizationChallenge::new(
            "example.org",
            ChallengeKind::Dns01,
            "https://example.com/acme/chall/2".parse().unwrap(),
            "token",
            "token.thumb",
        );
        assert!(!solver.supports(&dns));
    }
}
