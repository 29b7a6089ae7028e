use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::constraints::{membership, ConstraintSet};
use crate::domain::listing::ListingRecord;

/// One failed predicate for one listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub code: String,
    pub message: String,
}

pub trait ListingFilter: Send + Sync {
    fn filter(&self, listings: &[ListingRecord], constraints: &ConstraintSet) -> Vec<ListingRecord>;
}

#[derive(Default)]
pub struct DeterministicListingFilter;

impl ListingFilter for DeterministicListingFilter {
    fn filter(&self, listings: &[ListingRecord], constraints: &ConstraintSet) -> Vec<ListingRecord> {
        filter(listings, constraints)
    }
}

/// Listings satisfying every present constraint, in input order with their
/// original indices. An empty result is a valid outcome.
pub fn filter(listings: &[ListingRecord], constraints: &ConstraintSet) -> Vec<ListingRecord> {
    if constraints.is_unconstrained() {
        return listings.to_vec();
    }

    let kept: Vec<ListingRecord> =
        listings.iter().filter(|listing| satisfies(listing, constraints)).cloned().collect();

    debug!(
        event_name = "filter.applied",
        input = listings.len(),
        kept = kept.len(),
        "constraint filter applied"
    );
    kept
}

pub fn satisfies(listing: &ListingRecord, constraints: &ConstraintSet) -> bool {
    violations(listing, constraints).is_empty()
}

/// Every present predicate that `listing` fails.
pub fn violations(listing: &ListingRecord, constraints: &ConstraintSet) -> Vec<ConstraintViolation> {
    let mut violations = Vec::new();

    if let Some(max_price) = constraints.max_price {
        if !(listing.resale_price <= max_price) {
            violations.push(violation(
                "MAX_PRICE",
                format!("price {} exceeds {max_price}", listing.resale_price),
            ));
        }
    }

    if let Some(min_lease) = constraints.min_remaining_lease {
        if !(listing.remaining_lease_years >= min_lease) {
            violations.push(violation(
                "MIN_REMAINING_LEASE",
                format!(
                    "remaining lease {} is below {min_lease} years",
                    listing.remaining_lease_years
                ),
            ));
        }
    }

    if let Some(max_km) = constraints.max_mrt_distance {
        match listing.dist_mrt_km {
            Some(km) if km <= max_km => {}
            Some(km) => violations.push(violation(
                "MAX_MRT_DISTANCE",
                format!("MRT distance {km} km exceeds {max_km} km"),
            )),
            None => violations.push(violation(
                "MAX_MRT_DISTANCE",
                "MRT distance is unknown".to_string(),
            )),
        }
    }

    let memberships = [
        ("TOWN", "town", &constraints.towns, &listing.town),
        ("FLAT_TYPE", "flat type", &constraints.flat_types, &listing.flat_type),
        ("STOREY_RANGE", "storey range", &constraints.storey_ranges, &listing.storey_range),
        ("FLAT_MODEL", "flat model", &constraints.flat_models, &listing.flat_model),
    ];
    for (code, label, allowed, value) in memberships {
        if let Some(allowed) = membership(allowed) {
            if !allowed.iter().any(|candidate| candidate.eq_ignore_ascii_case(value.trim())) {
                violations.push(violation(code, format!("{label} `{value}` is not selected")));
            }
        }
    }

    violations
}

fn violation(code: &str, message: String) -> ConstraintViolation {
    ConstraintViolation { code: code.to_string(), message }
}
