use std::sync::Arc;

use serde::Serialize;
use tracing::trace;

use super::variables::{Evidence, ModelVariable, StateValue};
use super::{InferenceModel, Posterior};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedState {
    pub probability: f64,
    pub state: StateValue,
}

/// Shared, read-only handle for posterior queries.
#[derive(Clone)]
pub struct QueryEngine {
    model: Arc<dyn InferenceModel>,
}

impl QueryEngine {
    pub fn new(model: Arc<dyn InferenceModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<dyn InferenceModel> {
        &self.model
    }

    pub fn posterior(
        &self,
        evidence: &Evidence,
        target: ModelVariable,
    ) -> Result<Posterior, DomainError> {
        self.model.posterior(target, evidence)
    }

    /// The `k` most probable states of `target`, descending. `k = 0` returns
    /// the full posterior.
    pub fn query_top_k(
        &self,
        evidence: &Evidence,
        target: ModelVariable,
        k: usize,
    ) -> Result<Vec<RankedState>, DomainError> {
        let mut ranked = self.posterior(evidence, target)?.ranked();
        if k > 0 {
            ranked.truncate(k);
        }
        trace!(
            event_name = "inference.query.top_k",
            target = %target,
            k,
            returned = ranked.len(),
            "posterior query completed"
        );
        Ok(ranked)
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::QueryEngine;
    use crate::domain::interval::Interval;
    use crate::inference::network::fixtures::housing_spec;
    use crate::inference::{BayesianNetwork, Evidence, ModelVariable};

    fn engine() -> QueryEngine {
        QueryEngine::new(Arc::new(BayesianNetwork::from_spec(housing_spec()).expect("network")))
    }

    #[test]
    fn top_k_truncates_descending_posterior() {
        let evidence = Evidence { town: Some("BEDOK".to_owned()), ..Evidence::default() }
            .with_resale_price(Interval::new(400_000.0, 600_000.0).expect("bin"));

        let top = engine()
            .query_top_k(&evidence, ModelVariable::RemainingLeaseYears, 1)
            .expect("query");
        assert_eq!(top.len(), 1);
        assert_eq!(
            top[0].state.as_bin().copied(),
            Some(Interval::new(80.0, 99.0).expect("bin"))
        );
    }

    #[test]
    fn k_zero_returns_full_distribution_summing_to_one() {
        let evidence = Evidence { town: Some("TAMPINES".to_owned()), ..Evidence::default() };
        for target in [
            ModelVariable::RemainingLeaseYears,
            ModelVariable::ResalePrice,
            ModelVariable::FloorAreaSqm,
        ] {
            let all = engine().query_top_k(&evidence, target, 0).expect("query");
            let total: f64 = all.iter().map(|entry| entry.probability).sum();
            assert!((total - 1.0).abs() < 1e-9, "{target} sums to {total}");
            assert!(all.windows(2).all(|pair| pair[0].probability >= pair[1].probability));
        }
    }

    #[test]
    fn k_larger_than_state_count_returns_all_states() {
        let all = engine()
            .query_top_k(&Evidence::default(), ModelVariable::FloorAreaSqm, 10)
            .expect("query");
        assert_eq!(all.len(), 2);
    }
}
