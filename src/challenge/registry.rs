use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{AuthorizationChallenge, ChallengeKind, Solver, Validator};
use crate::protocol::AcmeError;

/// Outcome of an independent challenge check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// A validator observed the proof.
    Valid,

    /// A validator looked, but the proof is not observable yet.
    Pending,

    /// No registered validator supports this challenge and its solver.
    Unchecked,
}

/// Dispatches challenges to the solver registered for their [`ChallengeKind`].
///
/// At most one solver is registered per kind. Validators are consulted in the
/// order they were added, and the first one which supports a challenge decides.
#[derive(Debug, Default, Clone)]
pub struct ChallengeRegistry {
    solvers: HashMap<ChallengeKind, Arc<dyn Solver>>,
    validators: Vec<Arc<dyn Validator>>,
}

impl ChallengeRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a solver, builder style.
    pub fn with_solver<S>(mut self, solver: S) -> Self
    where
        S: Solver + 'static,
    {
        self.register(Arc::new(solver));
        self
    }

    /// Register a validator, builder style.
    pub fn with_validator<V>(mut self, validator: V) -> Self
    where
        V: Validator + 'static,
    {
        self.add_validator(Arc::new(validator));
        self
    }

    /// Register a solver for its kind, returning the solver it replaces.
    pub fn register(&mut self, solver: Arc<dyn Solver>) -> Option<Arc<dyn Solver>> {
        let kind = solver.kind();
        tracing::trace!(%kind, "Registering solver {solver:?}");
        self.solvers.insert(kind, solver)
    }

    /// Add a validator after all the existing ones.
    pub fn add_validator(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
    }

    /// The solver for this challenge.
    ///
    /// Fails with [`AcmeError::UnknownChallenge`] when no solver is registered for the
    /// challenge's kind, or the registered one declines it.
    pub fn solver_for(
        &self,
        challenge: &AuthorizationChallenge,
    ) -> Result<&Arc<dyn Solver>, AcmeError> {
        self.solvers
            .get(challenge.kind())
            .filter(|solver| solver.supports(challenge))
            .ok_or_else(|| AcmeError::UnknownChallenge(challenge.kind().to_string()))
    }

    /// Publish the proof for a single challenge.
    pub async fn solve(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError> {
        self.solver_for(challenge)?.solve(challenge).await
    }

    /// Retract the proof for a single challenge.
    pub async fn cleanup(&self, challenge: &AuthorizationChallenge) -> Result<(), AcmeError> {
        self.solver_for(challenge)?.cleanup(challenge).await
    }

    /// Publish the proofs for several challenges, with one batched call per solver.
    ///
    /// Every challenge is resolved to a solver before anything is published, so an
    /// unknown challenge kind fails without side effects.
    pub async fn solve_all(&self, challenges: &[AuthorizationChallenge]) -> Result<(), AcmeError> {
        for (solver, group) in self.group(challenges)? {
            solver.solve_all(&group).await?;
        }
        Ok(())
    }

    /// Retract the proofs for several challenges, with one batched call per solver.
    ///
    /// Every solver is called, even after a failure, and the first error is returned.
    pub async fn cleanup_all(
        &self,
        challenges: &[AuthorizationChallenge],
    ) -> Result<(), AcmeError> {
        let mut result = Ok(());
        for (solver, group) in self.group(challenges)? {
            if let Err(error) = solver.cleanup_all(&group).await {
                tracing::debug!(kind = %solver.kind(), "Cleanup failed: {error}");
                if result.is_ok() {
                    result = Err(error);
                }
            }
        }
        result
    }

    /// Check the challenge with the first validator that supports it.
    pub async fn validate(
        &self,
        challenge: &AuthorizationChallenge,
    ) -> Result<Validation, AcmeError> {
        let solver = self.solver_for(challenge)?;
        let Some(validator) = self
            .validators
            .iter()
            .find(|validator| validator.supports(challenge, &**solver))
        else {
            tracing::debug!(domain = challenge.domain(), kind = %challenge.kind(), "No validator");
            return Ok(Validation::Unchecked);
        };

        if validator.is_valid(challenge, &**solver).await {
            Ok(Validation::Valid)
        } else {
            Ok(Validation::Pending)
        }
    }

    /// Poll [`ChallengeRegistry::validate`] until the proof is observable, sleeping
    /// `interval` between attempts.
    ///
    /// Returns [`Validation::Pending`] if `attempts` checks all came back pending.
    pub async fn wait_until_valid(
        &self,
        challenge: &AuthorizationChallenge,
        attempts: usize,
        interval: Duration,
    ) -> Result<Validation, AcmeError> {
        let mut validation = Validation::Pending;
        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(interval).await;
            }

            validation = self.validate(challenge).await?;
            if validation != Validation::Pending {
                break;
            }
            tracing::trace!(domain = challenge.domain(), attempt, "Challenge not observable yet");
        }
        Ok(validation)
    }

    /// Group challenges by solver, keeping the order in which kinds first appear.
    fn group(
        &self,
        challenges: &[AuthorizationChallenge],
    ) -> Result<Vec<(Arc<dyn Solver>, Vec<AuthorizationChallenge>)>, AcmeError> {
        let mut groups: Vec<(ChallengeKind, Arc<dyn Solver>, Vec<AuthorizationChallenge>)> =
            Vec::new();

        for challenge in challenges {
            let solver = self.solver_for(challenge)?;
            match groups
                .iter_mut()
                .find(|(kind, _, _)| kind == challenge.kind())
            {
                Some((_, _, group)) => group.push(challenge.clone()),
                None => groups.push((
                    challenge.kind().clone(),
                    solver.clone(),
                    vec![challenge.clone()],
                )),
            }
        }

        Ok(groups
            .into_iter()
            .map(|(_, solver, group)| (solver, group))
            .collect())
    }
}
