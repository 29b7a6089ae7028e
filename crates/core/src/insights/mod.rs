//! Insight rule engine.
//!
//! Turns one ranked listing into a single human-readable sentence. Rules are
//! tried in order until one has enough evidence to say something; a query
//! whose leading probability sits below [`SIGNIFICANCE_CUTOFF`] is treated as
//! insufficient evidence rather than as a confident zero.

mod rules;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::discretize::{CategoryTable, ListingEvidence};
use crate::domain::listing::ListingRecord;
use crate::errors::DomainError;
use crate::inference::QueryEngine;

/// Minimum posterior probability for a query result to count as evidence.
pub const SIGNIFICANCE_CUTOFF: f64 = 0.05;

pub const FALLBACK_INSIGHT: &str = "No insights for this flat.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleOutcome {
    Insight(String),
    /// Not enough evidence; the orchestrator moves on to the next rule.
    Insufficient,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightRule {
    ValueForLease,
    LeaseDecayVolatility,
    FloorAreaComparison,
}

impl InsightRule {
    /// Deterministic evaluation order.
    pub const PRIORITY: [InsightRule; 3] = [
        InsightRule::FloorAreaComparison,
        InsightRule::LeaseDecayVolatility,
        InsightRule::ValueForLease,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValueForLease => "value_for_lease",
            Self::LeaseDecayVolatility => "lease_decay_volatility",
            Self::FloorAreaComparison => "floor_area_comparison",
        }
    }

    pub fn evaluate(
        self,
        query: &QueryEngine,
        categories: &CategoryTable,
        listing: &ListingEvidence,
    ) -> Result<RuleOutcome, DomainError> {
        match self {
            Self::ValueForLease => rules::value_for_lease(query, categories, listing),
            Self::LeaseDecayVolatility => rules::lease_decay_volatility(query, categories, listing),
            Self::FloorAreaComparison => rules::floor_area_comparison(query, listing),
        }
    }
}

impl fmt::Display for InsightRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the orchestrator sequences rules for each listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOrder {
    /// Floor area, then lease decay, then value for lease.
    #[default]
    Priority,
    /// A fresh random permutation per listing.
    Shuffled,
}

impl RuleOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Priority => "priority",
            Self::Shuffled => "shuffled",
        }
    }
}

impl fmt::Display for RuleOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleOrder {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "priority" => Ok(Self::Priority),
            "shuffled" | "random" => Ok(Self::Shuffled),
            other => Err(format!("unsupported rule order `{other}` (expected priority|shuffled)")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct InsightEngine {
    query: QueryEngine,
    categories: Arc<CategoryTable>,
    order: RuleOrder,
    deadline: Option<Duration>,
}

impl InsightEngine {
    pub fn new(query: QueryEngine, categories: Arc<CategoryTable>) -> Self {
        Self { query, categories, order: RuleOrder::default(), deadline: None }
    }

    pub fn with_order(mut self, order: RuleOrder) -> Self {
        self.order = order;
        self
    }

    /// Bound the work spent on one listing. Once elapsed, no further rule is
    /// started and the fallback sentence is returned.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn order(&self) -> RuleOrder {
        self.order
    }

    /// Insight sentence for one listing.
    ///
    /// Fails only when the listing cannot be expressed in the model's terms
    /// (out-of-domain values, unseen categories); insufficient evidence ends
    /// in the fallback sentence instead.
    pub fn insight_for<R: Rng + ?Sized>(
        &self,
        listing: &ListingRecord,
        rng: &mut R,
    ) -> Result<String, DomainError> {
        let evidence = self.categories.discretize(listing)?;
        let started = Instant::now();

        for rule in self.rule_sequence(rng) {
            if let Some(deadline) = self.deadline {
                if started.elapsed() >= deadline {
                    warn!(
                        event_name = "insights.deadline_exceeded",
                        listing = %listing.index,
                        deadline_ms = deadline.as_millis() as u64,
                        next_rule = %rule,
                        "insight deadline elapsed, returning fallback"
                    );
                    return Ok(FALLBACK_INSIGHT.to_string());
                }
            }

            match rule.evaluate(&self.query, &self.categories, &evidence)? {
                RuleOutcome::Insight(text) => {
                    debug!(
                        event_name = "insights.rule_applied",
                        listing = %listing.index,
                        rule = %rule,
                        "insight generated"
                    );
                    return Ok(text);
                }
                RuleOutcome::Insufficient => {
                    debug!(
                        event_name = "insights.rule_insufficient",
                        listing = %listing.index,
                        rule = %rule,
                        "rule lacked significant evidence"
                    );
                }
            }
        }

        Ok(FALLBACK_INSIGHT.to_string())
    }

    fn rule_sequence<R: Rng + ?Sized>(&self, rng: &mut R) -> [InsightRule; 3] {
        let mut sequence = InsightRule::PRIORITY;
        if self.order == RuleOrder::Shuffled {
            sequence.shuffle(rng);
        }
        sequence
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::domain::interval::Interval;
    use crate::errors::DomainError;
    use crate::inference::{Evidence, InferenceModel, ModelVariable, Posterior, StateValue};

    pub fn interval(left: f64, right: f64) -> Interval {
        Interval::new(left, right).expect("interval")
    }

    /// Table-driven model: price posteriors keyed by the lease bin in the
    /// evidence, one fixed floor-area posterior. Unconfigured leases answer
    /// with an empty posterior.
    #[derive(Clone, Debug, Default)]
    pub struct StubModel {
        prices: Vec<(Interval, Vec<(Interval, f64)>)>,
        areas: Vec<(Interval, f64)>,
        unseen_towns: Vec<String>,
    }

    impl StubModel {
        pub fn price_at(mut self, lease: Interval, entries: Vec<(Interval, f64)>) -> Self {
            self.prices.push((lease, entries));
            self
        }

        pub fn area(mut self, entries: Vec<(Interval, f64)>) -> Self {
            self.areas = entries;
            self
        }

        pub fn unseen_town(mut self, town: &str) -> Self {
            self.unseen_towns.push(town.to_owned());
            self
        }
    }

    impl InferenceModel for StubModel {
        fn states(&self, variable: ModelVariable) -> Result<Vec<StateValue>, DomainError> {
            match variable {
                ModelVariable::FloorAreaSqm => {
                    Ok(self.areas.iter().map(|(bin, _)| StateValue::Bin(*bin)).collect())
                }
                other => Err(DomainError::UnknownVariable(other.as_str().to_owned())),
            }
        }

        fn posterior(
            &self,
            target: ModelVariable,
            evidence: &Evidence,
        ) -> Result<Posterior, DomainError> {
            if let Some(town) = evidence.town.as_ref().filter(|town| self.unseen_towns.contains(town)) {
                return Err(DomainError::UnknownState {
                    variable: "town".to_owned(),
                    state: town.clone(),
                });
            }

            let entries = match target {
                ModelVariable::ResalePrice => evidence
                    .remaining_lease_years
                    .and_then(|lease| self.prices.iter().find(|(bin, _)| *bin == lease))
                    .map(|(_, entries)| entries.clone())
                    .unwrap_or_default(),
                ModelVariable::FloorAreaSqm => self.areas.clone(),
                other => return Err(DomainError::UnknownVariable(other.as_str().to_owned())),
            };

            Ok(Posterior::new(
                target,
                entries.into_iter().map(|(bin, probability)| (StateValue::Bin(bin), probability)).collect(),
            ))
        }
    }
}
