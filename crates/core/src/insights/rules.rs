//! The three insight rules. Each one reads the listing through its bins and
//! asks the inference model a handful of what-if questions.

use crate::discretize::{CategoryTable, ListingEvidence, NeighborDirection};
use crate::domain::interval::Interval;
use crate::errors::DomainError;
use crate::inference::{ModelVariable, QueryEngine, StateValue};

use super::{RuleOutcome, SIGNIFICANCE_CUTOFF};

/// Confidence above which a cheaper longer-lease flat makes this one a poor deal.
const NOT_COMPETITIVE_CONFIDENCE: f64 = 0.30;
/// Lease sweeps look at most this many years ahead.
const DEPRECIATION_HORIZON_YEARS: f64 = 20.0;
/// Volatility increase, in price units, reported as a large impact.
const LARGE_VOLATILITY_DELTA: f64 = 50_000.0;
const FLOOR_AREA_TOP_K: usize = 3;

/// Compare the asking price with what longer leases usually sell for.
pub(crate) fn value_for_lease(
    query: &QueryEngine,
    categories: &CategoryTable,
    listing: &ListingEvidence,
) -> Result<RuleOutcome, DomainError> {
    let longer = categories.neighbors(
        ModelVariable::RemainingLeaseYears,
        &listing.remaining_lease,
        NeighborDirection::AtLeast,
    )?;

    let mut max_confidence = 0.0_f64;
    for lease in longer {
        let top = query.query_top_k(&listing.with_lease(lease), ModelVariable::ResalePrice, 1)?;
        let Some(best) = top.first() else {
            continue;
        };
        if best.probability < SIGNIFICANCE_CUTOFF {
            continue;
        }
        if bin_of(&best.state)?.mid() < listing.price {
            max_confidence = max_confidence.max(best.probability);
        }
    }

    let verdict = if max_confidence > NOT_COMPETITIVE_CONFIDENCE {
        "Not competitive value"
    } else if max_confidence >= SIGNIFICANCE_CUTOFF {
        "Competitive value"
    } else {
        "Best value"
    };

    Ok(RuleOutcome::Insight(format!(
        "{verdict} among {} flats in {} with >{} years lease",
        listing.flat_type,
        listing.town,
        listing.remaining_lease.left.trunc() as i64
    )))
}

/// How much wider the price spread gets as the lease runs down.
pub(crate) fn lease_decay_volatility(
    query: &QueryEngine,
    categories: &CategoryTable,
    listing: &ListingEvidence,
) -> Result<RuleOutcome, DomainError> {
    let current = listing.remaining_lease;
    let baseline = query.posterior(&listing.with_lease(current), ModelVariable::ResalePrice)?;
    match baseline.best() {
        Some(best) if best.probability >= SIGNIFICANCE_CUTOFF => {}
        _ => return Ok(RuleOutcome::Insufficient),
    }
    let baseline = baseline.weighted_std()?;

    let shorter = categories.neighbors(
        ModelVariable::RemainingLeaseYears,
        &current,
        NeighborDirection::AtMost,
    )?;

    let mut max_volatility = baseline;
    let mut years_to_peak = 0.0;
    for lease in shorter {
        let years = current.mid() - lease.mid();
        if years > DEPRECIATION_HORIZON_YEARS {
            continue;
        }

        let posterior = query.posterior(&listing.with_lease(lease), ModelVariable::ResalePrice)?;
        match posterior.best() {
            Some(best) if best.probability >= SIGNIFICANCE_CUTOFF => {}
            _ => continue,
        }

        let volatility = posterior.weighted_std()?;
        if volatility > max_volatility {
            max_volatility = volatility;
            years_to_peak = years;
        }
    }

    let message = if max_volatility > baseline {
        let delta = max_volatility - baseline;
        if delta > LARGE_VOLATILITY_DELTA {
            format!(
                "Large impact on resale potential due to lease decay - High change in volatility (+{}) in ~{} years",
                delta.trunc() as i64,
                years_to_peak.trunc() as i64
            )
        } else {
            "Minimal impact on resale potential due to lease decay for next 20 years".to_string()
        }
    } else {
        "No impact on resale potential due to lease decay for next 20 years".to_string()
    };

    Ok(RuleOutcome::Insight(message))
}

/// Place the listing's floor area against the typical area at its price.
pub(crate) fn floor_area_comparison(
    query: &QueryEngine,
    listing: &ListingEvidence,
) -> Result<RuleOutcome, DomainError> {
    let evidence =
        listing.with_lease(listing.remaining_lease).with_resale_price(listing.resale_price);
    let top = query.query_top_k(&evidence, ModelVariable::FloorAreaSqm, FLOOR_AREA_TOP_K)?;

    let Some(first) = top.first() else {
        return Ok(RuleOutcome::Insufficient);
    };
    if first.probability < SIGNIFICANCE_CUTOFF {
        return Ok(RuleOutcome::Insufficient);
    }
    let typical = bin_of(&first.state)?;
    let typical_mid = typical.mid().trunc() as i64;

    for candidate in top.iter().filter(|candidate| candidate.probability >= SIGNIFICANCE_CUTOFF) {
        if bin_of(&candidate.state)?.contains(listing.floor_area_sqm) {
            return Ok(RuleOutcome::Insight(format!(
                "Average floor area (~{typical_mid} sqm) in this price range"
            )));
        }
    }

    let message = if listing.floor_area_sqm < typical.mid() {
        format!("Lower than average floor area ({typical_mid} sqm) in this price range")
    } else {
        format!("Higher than average floor area ({typical_mid} sqm) in this price range")
    };
    Ok(RuleOutcome::Insight(message))
}

fn bin_of(state: &StateValue) -> Result<Interval, DomainError> {
    state.as_bin().copied().ok_or_else(|| {
        DomainError::InvariantViolation(format!("expected an interval state, got `{state}`"))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{floor_area_comparison, lease_decay_volatility, value_for_lease};
    use crate::discretize::fixtures::category_table;
    use crate::discretize::ListingEvidence;
    use crate::domain::listing::fixtures::listing;
    use crate::insights::fixtures::{interval, StubModel};
    use crate::insights::RuleOutcome;
    use crate::inference::QueryEngine;

    fn evidence(lease: f64, area: f64, price: f64) -> ListingEvidence {
        let mut record = listing(0, "TAMPINES", price);
        record.remaining_lease_years = lease;
        record.floor_area_sqm = area;
        category_table().discretize(&record).expect("in domain")
    }

    fn insight(outcome: RuleOutcome) -> String {
        match outcome {
            RuleOutcome::Insight(text) => text,
            RuleOutcome::Insufficient => panic!("expected an insight"),
        }
    }

    /// Every longer lease (50..100) predicts `price_bin` with `confidence`,
    /// except (50, 60] which predicts `cheap_bin` with `cheap_confidence`.
    fn value_model(cheap_confidence: f64) -> QueryEngine {
        let mut model = StubModel::default();
        for left in [60.0, 70.0, 80.0, 90.0] {
            model = model.price_at(
                interval(left, left + 10.0),
                vec![(interval(500_000.0, 600_000.0), 0.8), (interval(300_000.0, 400_000.0), 0.2)],
            );
        }
        model = model.price_at(
            interval(50.0, 60.0),
            vec![(interval(300_000.0, 400_000.0), cheap_confidence)],
        );
        QueryEngine::new(Arc::new(model))
    }

    fn value_verdict(cheap_confidence: f64) -> String {
        let listing = evidence(45.0, 92.0, 500_000.0);
        insight(value_for_lease(&value_model(cheap_confidence), &category_table(), &listing).expect("rule"))
    }

    #[test]
    fn value_for_lease_is_best_when_longer_leases_cost_more() {
        assert_eq!(value_verdict(0.0), "Best value among 4 ROOM flats in TAMPINES with >40 years lease");
        // below the significance cutoff the cheaper prediction is ignored
        assert!(value_verdict(0.049).starts_with("Best value"));
    }

    #[test]
    fn value_for_lease_thresholds_are_inclusive_between_cutoff_and_030() {
        assert!(value_verdict(0.05).starts_with("Competitive value"));
        assert!(value_verdict(0.30).starts_with("Competitive value"));
        assert!(value_verdict(0.31).starts_with("Not competitive value"));
    }

    #[test]
    fn value_for_lease_needs_a_strictly_cheaper_prediction() {
        // midpoint 350k equals the asking price
        let listing = evidence(45.0, 92.0, 350_000.0);
        let outcome =
            value_for_lease(&value_model(0.9), &category_table(), &listing).expect("rule");
        assert!(insight(outcome).starts_with("Best value"));
    }

    #[test]
    fn lease_decay_reports_large_volatility_jump_with_horizon() {
        let model = StubModel::default()
            .price_at(interval(60.0, 70.0), vec![(interval(300_000.0, 400_000.0), 1.0)])
            .price_at(
                interval(50.0, 60.0),
                vec![(interval(100_000.0, 200_000.0), 0.5), (interval(400_000.0, 500_000.0), 0.5)],
            )
            .price_at(interval(40.0, 50.0), vec![(interval(300_000.0, 400_000.0), 1.0)]);

        let listing = evidence(65.0, 92.0, 350_000.0);
        let outcome = lease_decay_volatility(&QueryEngine::new(Arc::new(model)), &category_table(), &listing)
            .expect("rule");
        assert_eq!(
            insight(outcome),
            "Large impact on resale potential due to lease decay - High change in volatility (+150000) in ~10 years"
        );
    }

    #[test]
    fn lease_decay_reports_minimal_and_no_impact() {
        let listing = evidence(65.0, 92.0, 350_000.0);
        let point = vec![(interval(300_000.0, 400_000.0), 1.0)];

        let minimal = StubModel::default().price_at(interval(60.0, 70.0), point.clone()).price_at(
            interval(50.0, 60.0),
            vec![(interval(100_000.0, 200_000.0), 0.9), (interval(200_000.0, 300_000.0), 0.1)],
        );
        let outcome =
            lease_decay_volatility(&QueryEngine::new(Arc::new(minimal)), &category_table(), &listing)
                .expect("rule");
        assert_eq!(
            insight(outcome),
            "Minimal impact on resale potential due to lease decay for next 20 years"
        );

        let flat = StubModel::default()
            .price_at(interval(60.0, 70.0), point.clone())
            .price_at(interval(50.0, 60.0), point.clone())
            .price_at(interval(40.0, 50.0), point);
        let outcome =
            lease_decay_volatility(&QueryEngine::new(Arc::new(flat)), &category_table(), &listing)
                .expect("rule");
        assert_eq!(
            insight(outcome),
            "No impact on resale potential due to lease decay for next 20 years"
        );
    }

    #[test]
    fn lease_decay_ignores_bins_past_the_horizon_or_without_support() {
        let spread =
            vec![(interval(100_000.0, 200_000.0), 0.5), (interval(600_000.0, 700_000.0), 0.5)];
        // (40, 50] is 30 years away from (70, 80]; (50, 60] and (60, 70] have no support
        let model = StubModel::default()
            .price_at(interval(70.0, 80.0), vec![(interval(300_000.0, 400_000.0), 1.0)])
            .price_at(interval(40.0, 50.0), spread);

        let listing = evidence(75.0, 92.0, 350_000.0);
        let outcome = lease_decay_volatility(&QueryEngine::new(Arc::new(model)), &category_table(), &listing)
            .expect("rule");
        assert!(insight(outcome).starts_with("No impact"));
    }

    #[test]
    fn lease_decay_without_support_at_the_current_lease_is_insufficient() {
        let spread =
            vec![(interval(100_000.0, 200_000.0), 0.5), (interval(600_000.0, 700_000.0), 0.5)];
        let listing = evidence(65.0, 92.0, 350_000.0);

        let unsupported = StubModel::default().price_at(interval(50.0, 60.0), spread.clone());
        let outcome =
            lease_decay_volatility(&QueryEngine::new(Arc::new(unsupported)), &category_table(), &listing)
                .expect("rule");
        assert_eq!(outcome, RuleOutcome::Insufficient);

        let weak = StubModel::default()
            .price_at(interval(60.0, 70.0), vec![(interval(300_000.0, 400_000.0), 0.04)])
            .price_at(interval(50.0, 60.0), spread);
        let outcome =
            lease_decay_volatility(&QueryEngine::new(Arc::new(weak)), &category_table(), &listing)
                .expect("rule");
        assert_eq!(outcome, RuleOutcome::Insufficient);
    }

    #[test]
    fn floor_area_within_top_bins_is_average() {
        let model = StubModel::default().area(vec![
            (interval(90.0, 110.0), 0.3),
            (interval(70.0, 90.0), 0.6),
            (interval(110.0, 130.0), 0.1),
        ]);
        let listing = evidence(65.0, 92.0, 350_000.0);
        let outcome = floor_area_comparison(&QueryEngine::new(Arc::new(model)), &listing).expect("rule");
        assert_eq!(insight(outcome), "Average floor area (~80 sqm) in this price range");
    }

    #[test]
    fn floor_area_outside_top_bins_compares_with_most_probable_midpoint() {
        let listing = evidence(65.0, 92.0, 350_000.0);

        let smaller = StubModel::default().area(vec![
            (interval(50.0, 70.0), 0.9),
            (interval(90.0, 110.0), 0.04),
        ]);
        let outcome = floor_area_comparison(&QueryEngine::new(Arc::new(smaller)), &listing).expect("rule");
        assert_eq!(insight(outcome), "Higher than average floor area (60 sqm) in this price range");

        let larger = StubModel::default().area(vec![(interval(110.0, 130.0), 0.7)]);
        let outcome = floor_area_comparison(&QueryEngine::new(Arc::new(larger)), &listing).expect("rule");
        assert_eq!(insight(outcome), "Lower than average floor area (120 sqm) in this price range");
    }

    #[test]
    fn floor_area_without_significant_evidence_is_insufficient() {
        let listing = evidence(65.0, 92.0, 350_000.0);
        let weak = StubModel::default().area(vec![(interval(90.0, 110.0), 0.04)]);
        let outcome = floor_area_comparison(&QueryEngine::new(Arc::new(weak)), &listing).expect("rule");
        assert_eq!(outcome, RuleOutcome::Insufficient);

        let empty = StubModel::default();
        let outcome = floor_area_comparison(&QueryEngine::new(Arc::new(empty)), &listing).expect("rule");
        assert_eq!(outcome, RuleOutcome::Insufficient);
    }
}
