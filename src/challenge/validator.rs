use std::fmt;

use async_trait::async_trait;

use super::{AuthorizationChallenge, Solver};

/// Independently confirms that a challenge's proof is observable, before the ACME
/// provider is asked to verify it.
#[async_trait]
pub trait Validator: fmt::Debug + Send + Sync {
    /// Can this validator check `challenge`, as solved by `solver`?
    ///
    /// Validators use the solver's capabilities (e.g. [`Solver::externally_observable`])
    /// to exclude solvers whose proof cannot be seen from outside.
    fn supports(&self, challenge: &AuthorizationChallenge, solver: &dyn Solver) -> bool;

    /// Is the proof for `challenge` observable yet?
    ///
    /// Network failures mean "not yet", and return `false`, so callers can poll.
    async fn is_valid(&self, challenge: &AuthorizationChallenge, solver: &dyn Solver) -> bool;
}
