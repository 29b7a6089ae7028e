pub mod config;
pub mod discretize;
pub mod domain;
pub mod errors;
pub mod filter;
pub mod inference;
pub mod insights;
pub mod ranking;
pub mod recommend;

pub use discretize::{CategoryTable, ListingEvidence, NeighborDirection};
pub use domain::constraints::ConstraintSet;
pub use domain::criteria::{CriteriaConfig, CriterionSpec, Direction, Priority, WeightVector};
pub use domain::interval::Interval;
pub use domain::listing::{ListingIndex, ListingRecord, NumericField};
pub use errors::{ApplicationError, DomainError};
pub use filter::{ConstraintViolation, DeterministicListingFilter, ListingFilter};
pub use inference::{
    BayesianNetwork, Evidence, InferenceModel, ModelVariable, NetworkSpec, Posterior, QueryEngine,
    RankedState, StateValue,
};
pub use insights::{InsightEngine, InsightRule, RuleOrder, RuleOutcome, FALLBACK_INSIGHT};
pub use ranking::{Ranking, RankedRecord, RankingMetadata};
pub use recommend::{
    OutOfDomainPolicy, RecommendRequest, RecommendSettings, Recommendation, RecommendationPage,
    Recommender,
};
