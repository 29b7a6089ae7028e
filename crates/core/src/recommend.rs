//! Filter, rank and annotate: the full recommendation pipeline over shared,
//! read-only artifacts.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::discretize::CategoryTable;
use crate::domain::constraints::ConstraintSet;
use crate::domain::criteria::{CriteriaConfig, Priority, WeightVector};
use crate::domain::listing::ListingRecord;
use crate::errors::{ApplicationError, DomainError};
use crate::filter;
use crate::inference::{InferenceModel, QueryEngine};
use crate::insights::{InsightEngine, RuleOrder, FALLBACK_INSIGHT};
use crate::ranking::{self, RankedRecord, Ranking, RankingMetadata, DEFAULT_PAGE_SIZE};

/// What to do when a listing in the page cannot be expressed in model terms.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfDomainPolicy {
    /// Attach the fallback sentence and keep going.
    #[default]
    Fallback,
    /// Abort the whole request.
    Fail,
}

impl OutOfDomainPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fallback => "fallback",
            Self::Fail => "fail",
        }
    }
}

impl fmt::Display for OutOfDomainPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutOfDomainPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fallback" => Ok(Self::Fallback),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unsupported out-of-domain policy `{other}` (expected fallback|fail)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecommendSettings {
    pub page_size: usize,
    pub rule_order: RuleOrder,
    /// Seeds the per-row rule shuffle; each row uses `seed ^ original index`.
    pub seed: Option<u64>,
    pub deadline: Option<Duration>,
    pub out_of_domain: OutOfDomainPolicy,
}

impl Default for RecommendSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            rule_order: RuleOrder::default(),
            seed: None,
            deadline: None,
            out_of_domain: OutOfDomainPolicy::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub constraints: ConstraintSet,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default = "first_page")]
    pub page: usize,
}

fn first_page() -> usize {
    1
}

impl Default for RecommendRequest {
    fn default() -> Self {
        Self { constraints: ConstraintSet::default(), priority: Priority::default(), page: first_page() }
    }
}

impl RecommendRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.page == 0 {
            return Err(DomainError::InvalidConstraint {
                field: "page",
                message: "pages are numbered from 1".to_string(),
            });
        }
        self.constraints.validate()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Recommendation {
    pub rank: usize,
    pub score: f64,
    pub listing: ListingRecord,
    pub insight: String,
    pub ranking_reason: String,
    pub score_breakdown: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RecommendationPage {
    pub recommendations: Vec<Recommendation>,
    pub total_found: usize,
    pub page: usize,
}

pub struct Recommender {
    listings: Arc<[ListingRecord]>,
    categories: Arc<CategoryTable>,
    criteria: CriteriaConfig,
    settings: RecommendSettings,
    insights: InsightEngine,
}

impl Recommender {
    pub fn new(
        listings: Arc<[ListingRecord]>,
        categories: Arc<CategoryTable>,
        model: Arc<dyn InferenceModel>,
        criteria: CriteriaConfig,
        settings: RecommendSettings,
    ) -> Self {
        let insights = InsightEngine::new(QueryEngine::new(model), Arc::clone(&categories))
            .with_order(settings.rule_order)
            .with_deadline(settings.deadline);
        Self { listings, categories, criteria, settings, insights }
    }

    pub fn listings(&self) -> &[ListingRecord] {
        &self.listings
    }

    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    pub fn criteria(&self) -> &CriteriaConfig {
        &self.criteria
    }

    pub fn settings(&self) -> &RecommendSettings {
        &self.settings
    }

    pub fn filter(&self, constraints: &ConstraintSet) -> Result<Vec<ListingRecord>, ApplicationError> {
        constraints.validate()?;
        Ok(filter::filter(&self.listings, constraints))
    }

    pub fn rank(&self, listings: &[ListingRecord], priority: Priority) -> Result<Ranking, ApplicationError> {
        let weights = WeightVector::resolve(&self.criteria, priority.weights().as_ref())?;
        Ok(ranking::rank(listings, &self.criteria, &weights))
    }

    /// Attach an insight sentence to every row of `window`, in parallel.
    pub fn annotate(
        &self,
        window: &[RankedRecord],
        metadata: &RankingMetadata,
    ) -> Result<Vec<Recommendation>, ApplicationError> {
        let annotated = window
            .par_iter()
            .map(|record| {
                let insight = self.insight_for(&record.listing)?;
                Ok(Recommendation {
                    rank: record.rank,
                    score: record.score,
                    listing: record.listing.clone(),
                    insight,
                    ranking_reason: ranking::ranking_reason(record.score).to_string(),
                    score_breakdown: ranking::explain_score(record, metadata),
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;
        Ok(annotated)
    }

    pub fn recommend(&self, request: &RecommendRequest) -> Result<RecommendationPage, ApplicationError> {
        request.validate()?;

        let filtered = filter::filter(&self.listings, &request.constraints);
        if filtered.is_empty() {
            info!(
                event_name = "recommend.empty",
                listings = self.listings.len(),
                "no listings satisfy the constraints"
            );
            return Ok(RecommendationPage {
                recommendations: Vec::new(),
                total_found: 0,
                page: request.page,
            });
        }

        let ranking = self.rank(&filtered, request.priority)?;
        let window = ranking.page(request.page, self.settings.page_size);
        let recommendations = self.annotate(window, &ranking.metadata)?;

        info!(
            event_name = "recommend.completed",
            total_found = ranking.len(),
            page = request.page,
            returned = recommendations.len(),
            "recommendations ready"
        );

        Ok(RecommendationPage { recommendations, total_found: ranking.len(), page: request.page })
    }

    fn insight_for(&self, listing: &ListingRecord) -> Result<String, DomainError> {
        let mut rng = match self.settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed ^ listing.index.0 as u64),
            None => StdRng::from_entropy(),
        };

        match self.insights.insight_for(listing, &mut rng) {
            Ok(text) => Ok(text),
            Err(error)
                if error.is_outside_model()
                    && self.settings.out_of_domain == OutOfDomainPolicy::Fallback =>
            {
                warn!(
                    event_name = "recommend.insight_fallback",
                    listing = %listing.index,
                    error = %error,
                    "listing is outside the model domain"
                );
                Ok(FALLBACK_INSIGHT.to_string())
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{OutOfDomainPolicy, RecommendRequest, RecommendSettings, Recommender};
    use crate::discretize::fixtures::category_table;
    use crate::domain::constraints::ConstraintSet;
    use crate::domain::criteria::fixtures::default_criteria;
    use crate::domain::criteria::Priority;
    use crate::domain::listing::fixtures::listing;
    use crate::domain::listing::ListingRecord;
    use crate::insights::fixtures::{interval, StubModel};
    use crate::insights::{RuleOrder, FALLBACK_INSIGHT};

    fn dataset() -> Vec<ListingRecord> {
        (0..14)
            .map(|index| {
                let town = if index % 2 == 0 { "TAMPINES" } else { "BEDOK" };
                let mut record = listing(index, town, 300_000.0 + index as f64 * 15_000.0);
                record.remaining_lease_years = 55.0 + index as f64;
                record
            })
            .collect()
    }

    fn recommender(listings: Vec<ListingRecord>, settings: RecommendSettings) -> Recommender {
        let model = StubModel::default().area(vec![(interval(90.0, 110.0), 0.7)]);
        Recommender::new(
            listings.into(),
            Arc::new(category_table()),
            Arc::new(model),
            default_criteria(),
            settings,
        )
    }

    #[test]
    fn empty_filter_result_short_circuits() {
        let request = RecommendRequest {
            constraints: ConstraintSet::default().with_towns(["PUNGGOL"]),
            ..RecommendRequest::default()
        };

        let page = recommender(dataset(), RecommendSettings::default())
            .recommend(&request)
            .expect("recommend");
        assert!(page.recommendations.is_empty());
        assert_eq!(page.total_found, 0);
    }

    #[test]
    fn pages_report_total_and_keep_original_indices() {
        let recommender = recommender(dataset(), RecommendSettings::default());
        let request = RecommendRequest {
            constraints: ConstraintSet::default().with_towns(["TAMPINES"]),
            priority: Priority::Price,
            page: 1,
        };

        let page = recommender.recommend(&request).expect("recommend");
        assert_eq!(page.total_found, 7);
        assert_eq!(page.recommendations.len(), 7);
        assert!(page.recommendations.iter().all(|row| row.listing.index.0 % 2 == 0));
        assert_eq!(
            page.recommendations.iter().map(|row| row.rank).collect::<Vec<_>>(),
            (1..=7).collect::<Vec<_>>()
        );
        assert!(page
            .recommendations
            .iter()
            .all(|row| row.insight == "Average floor area (~100 sqm) in this price range"));
        assert!(page.recommendations[0].score_breakdown.starts_with("Overall Score: "));
    }

    #[test]
    fn page_size_and_past_the_end_pages() {
        let settings = RecommendSettings { page_size: 4, ..RecommendSettings::default() };
        let recommender = recommender(dataset(), settings);

        let second = recommender
            .recommend(&RecommendRequest { page: 4, ..RecommendRequest::default() })
            .expect("recommend");
        assert_eq!(second.total_found, 14);
        assert_eq!(second.recommendations.len(), 2);
        assert_eq!(second.recommendations[0].rank, 13);

        let past = recommender
            .recommend(&RecommendRequest { page: 5, ..RecommendRequest::default() })
            .expect("recommend");
        assert!(past.recommendations.is_empty());
        assert_eq!(past.total_found, 14);
    }

    #[test]
    fn out_of_domain_rows_follow_the_configured_policy() {
        let mut listings = dataset();
        listings[0].floor_area_sqm = 512.0;
        let request = RecommendRequest {
            constraints: ConstraintSet::default().with_towns(["TAMPINES"]),
            ..RecommendRequest::default()
        };

        let page = recommender(listings.clone(), RecommendSettings::default())
            .recommend(&request)
            .expect("fallback policy keeps the request alive");
        let row = page
            .recommendations
            .iter()
            .find(|row| row.listing.index.0 == 0)
            .expect("listing 0 is on the page");
        assert_eq!(row.insight, FALLBACK_INSIGHT);

        let strict = RecommendSettings {
            out_of_domain: OutOfDomainPolicy::Fail,
            ..RecommendSettings::default()
        };
        let error = recommender(listings, strict).recommend(&request).expect_err("fail policy");
        assert_eq!(error.class(), "out_of_domain");
    }

    #[test]
    fn invalid_requests_are_rejected_before_filtering() {
        let recommender = recommender(dataset(), RecommendSettings::default());

        let error = recommender
            .recommend(&RecommendRequest { page: 0, ..RecommendRequest::default() })
            .expect_err("page 0");
        assert_eq!(error.class(), "invalid_constraint");

        let error = recommender
            .filter(&ConstraintSet::default().with_max_price(-5.0))
            .expect_err("negative price");
        assert_eq!(error.class(), "invalid_constraint");
    }

    #[test]
    fn seeded_shuffle_is_reproducible_across_calls() {
        let settings = RecommendSettings {
            rule_order: RuleOrder::Shuffled,
            seed: Some(2024),
            ..RecommendSettings::default()
        };
        let recommender = recommender(dataset(), settings);
        let request = RecommendRequest::default();

        let first = recommender.recommend(&request).expect("recommend");
        let second = recommender.recommend(&request).expect("recommend");
        assert_eq!(first, second);
    }

    #[test]
    fn request_deserializes_with_defaults() {
        let request: RecommendRequest =
            serde_json::from_str(r#"{"constraints": {"max_price": 400000}, "priority": "lease"}"#)
                .expect("request");
        assert_eq!(request.page, 1);
        assert_eq!(request.priority, Priority::Lease);
        assert_eq!(request.constraints.max_price, Some(400_000.0));
    }
}
