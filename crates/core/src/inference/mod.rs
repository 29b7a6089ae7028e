//! Exact conditional inference over the trained housing network.
//!
//! The network is loaded once and shared read-only between requests; callers
//! hold it behind `Arc<dyn InferenceModel>` and query it from any thread.

pub mod factor;
pub mod network;
pub mod query;
pub mod variables;

pub use network::{BayesianNetwork, NetworkSpec, NodeSpec};
pub use query::{QueryEngine, RankedState};
pub use variables::{Evidence, ModelVariable, StateValue};

use crate::errors::DomainError;

pub trait InferenceModel: Send + Sync {
    /// States of `variable` in model order.
    fn states(&self, variable: ModelVariable) -> Result<Vec<StateValue>, DomainError>;

    /// Posterior over every state of `target` given `evidence`.
    ///
    /// Evidence without joint support yields all-zero probabilities rather than
    /// an error.
    fn posterior(&self, target: ModelVariable, evidence: &Evidence) -> Result<Posterior, DomainError>;
}

/// Posterior distribution over the states of one variable, in model order.
#[derive(Clone, Debug, PartialEq)]
pub struct Posterior {
    variable: ModelVariable,
    entries: Vec<(StateValue, f64)>,
}

impl Posterior {
    pub fn new(variable: ModelVariable, entries: Vec<(StateValue, f64)>) -> Self {
        Self { variable, entries }
    }

    pub fn variable(&self) -> ModelVariable {
        self.variable
    }

    pub fn entries(&self) -> &[(StateValue, f64)] {
        &self.entries
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, probability)| probability).sum()
    }

    /// States sorted by descending probability; ties keep model order.
    pub fn ranked(&self) -> Vec<RankedState> {
        let mut ranked: Vec<RankedState> = self
            .entries
            .iter()
            .map(|(state, probability)| RankedState { probability: *probability, state: state.clone() })
            .collect();
        ranked.sort_by(|a, b| b.probability.total_cmp(&a.probability));
        ranked
    }

    pub fn best(&self) -> Option<RankedState> {
        self.ranked().into_iter().next()
    }

    /// Probability-weighted standard deviation of bin midpoints.
    ///
    /// Fails when the variable is categorical.
    pub fn weighted_std(&self) -> Result<f64, DomainError> {
        let mut mean = 0.0;
        let mut second_moment = 0.0;
        for (state, probability) in &self.entries {
            let mid = state.as_bin().map(|bin| bin.mid()).ok_or_else(|| {
                DomainError::InvariantViolation(format!(
                    "`{}` is categorical; volatility needs interval states",
                    self.variable
                ))
            })?;
            mean += probability * mid;
            second_moment += probability * mid * mid;
        }
        Ok((second_moment - mean * mean).max(0.0).sqrt())
    }
}
