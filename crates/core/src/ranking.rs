//! Multi-criteria weighted-sum ranking.
//!
//! Each criterion column is min-max scaled over the filtered set only, then
//! combined with the resolved weights into a score on a 0-10 scale.

use serde::Serialize;
use tracing::debug;

use crate::domain::criteria::{CriteriaConfig, Direction, WeightVector};
use crate::domain::listing::{ListingRecord, NumericField};

/// Rows per page when the caller does not choose one.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Normalised value above which a criterion reads as `high`.
const HIGH_TIER: f64 = 0.7;
/// Normalised value below which a criterion reads as `low`.
const LOW_TIER: f64 = 0.3;

/// A listing with its per-criterion normalised values, score and rank.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedRecord {
    pub listing: ListingRecord,
    pub normalized: Vec<(NumericField, Option<f64>)>,
    /// Weighted sum scaled to `[0, 10]`, rounded to two decimals.
    pub score: f64,
    /// Dense rank, 1 is best.
    pub rank: usize,
}

impl RankedRecord {
    pub fn normalized(&self, field: NumericField) -> Option<f64> {
        self.normalized
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .and_then(|(_, value)| *value)
    }
}

/// The criteria and weights a ranking was computed with.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankingMetadata {
    pub criteria: CriteriaConfig,
    pub weights: WeightVector,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Ranking {
    pub records: Vec<RankedRecord>,
    pub metadata: RankingMetadata,
}

impl Ranking {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Contiguous 1-based page of ranked rows. Pages past the end, and page 0,
    /// are empty.
    pub fn page(&self, page: usize, page_size: usize) -> &[RankedRecord] {
        if page == 0 || page_size == 0 {
            return &[];
        }
        let start = (page - 1).saturating_mul(page_size);
        if start >= self.records.len() {
            return &[];
        }
        let end = start.saturating_add(page_size).min(self.records.len());
        &self.records[start..end]
    }
}

/// Min-max scale one column.
///
/// `benefit` maps the column minimum to 0 and maximum to 1; `cost` reverses
/// that. When every present value is equal they all map to 1. Missing values
/// stay missing.
pub fn normalize_column(values: &[Option<f64>], direction: Direction) -> Vec<Option<f64>> {
    let present = values.iter().flatten().copied();
    let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), value| {
        (min.min(value), max.max(value))
    });

    values
        .iter()
        .map(|value| {
            value.map(|value| {
                if min == max {
                    return 1.0;
                }
                match direction {
                    Direction::Benefit => (value - min) / (max - min),
                    Direction::Cost => (max - value) / (max - min),
                }
            })
        })
        .collect()
}

/// Score and order `listings`.
///
/// Equal scores are ordered by original index, lowest first.
pub fn rank(listings: &[ListingRecord], criteria: &CriteriaConfig, weights: &WeightVector) -> Ranking {
    let columns: Vec<(NumericField, Vec<Option<f64>>)> = criteria
        .iter()
        .map(|criterion| {
            let raw: Vec<Option<f64>> =
                listings.iter().map(|listing| listing.numeric(criterion.field)).collect();
            (criterion.field, normalize_column(&raw, criterion.direction))
        })
        .collect();

    let mut records: Vec<RankedRecord> = listings
        .iter()
        .enumerate()
        .map(|(row, listing)| {
            let normalized: Vec<(NumericField, Option<f64>)> =
                columns.iter().map(|(field, column)| (*field, column[row])).collect();
            let weighted: f64 = normalized
                .iter()
                .map(|(field, value)| value.unwrap_or(0.0) * weights.get(*field))
                .sum();
            RankedRecord { listing: listing.clone(), normalized, score: scaled_score(weighted), rank: 0 }
        })
        .collect();

    records.sort_by(|a, b| {
        b.score.total_cmp(&a.score).then_with(|| a.listing.index.cmp(&b.listing.index))
    });
    for (position, record) in records.iter_mut().enumerate() {
        record.rank = position + 1;
    }

    debug!(
        event_name = "ranking.completed",
        ranked = records.len(),
        criteria = criteria.len(),
        top_score = records.first().map(|record| record.score),
        "listings ranked"
    );

    Ranking {
        records,
        metadata: RankingMetadata { criteria: criteria.clone(), weights: weights.clone() },
    }
}

/// Human-readable breakdown of one score, criterion by criterion.
pub fn explain_score(record: &RankedRecord, metadata: &RankingMetadata) -> String {
    let parts: Vec<String> = metadata
        .criteria
        .iter()
        .map(|criterion| {
            let value = record
                .listing
                .numeric(criterion.field)
                .map(display_value)
                .unwrap_or_else(|| "n/a".to_string());
            let tier = match record.normalized(criterion.field) {
                Some(norm) if norm > HIGH_TIER => "high",
                Some(norm) if norm < LOW_TIER => "low",
                _ => "average",
            };
            format!(
                "{}: {value} ({tier}) – Weight: {:.0}% ({})",
                criterion.label,
                metadata.weights.get(criterion.field) * 100.0,
                criterion.direction
            )
        })
        .collect();

    format!("Overall Score: {:.2} | {}", record.score, parts.join(", "))
}

/// Short tiered reason shown next to each recommendation.
pub fn ranking_reason(score: f64) -> &'static str {
    if score >= 9.0 {
        "Excellent overall match for all your criteria"
    } else if score >= 8.0 {
        "Strong match with premium features"
    } else if score >= 7.0 {
        "Good value proposition with key preferences met"
    } else if score >= 6.0 {
        "Solid option meeting most requirements"
    } else {
        "Meets essential criteria"
    }
}

/// Ten times the weighted sum rounded to two decimals.
fn scaled_score(weighted_sum: f64) -> f64 {
    (weighted_sum * 100.0).round() / 10.0
}

fn display_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}
