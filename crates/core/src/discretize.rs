//! Interval category mapper.
//!
//! Maps continuous listing attributes onto the training-derived bins the
//! inference model was fitted on, and enumerates neighbouring bins for
//! what-if sweeps over the lease.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::interval::Interval;
use crate::domain::listing::ListingRecord;
use crate::errors::DomainError;
use crate::inference::{Evidence, ModelVariable};

/// Which side of the baseline bin a sweep explores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborDirection {
    /// Bins whose midpoint lies strictly above the baseline midpoint.
    AtLeast,
    /// Bins whose midpoint lies strictly below the baseline midpoint.
    AtMost,
}

/// Ordered, non-overlapping bins per binned model variable.
///
/// The JSON artifact maps each variable to its bins in interval notation:
/// `{ "remaining_lease_years": ["(40.0, 50.0]", "(50.0, 60.0]"], ... }`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(try_from = "BTreeMap<ModelVariable, Vec<Interval>>")]
pub struct CategoryTable {
    bins: BTreeMap<ModelVariable, Vec<Interval>>,
}

impl CategoryTable {
    pub fn new(bins: BTreeMap<ModelVariable, Vec<Interval>>) -> Result<Self, DomainError> {
        for (variable, intervals) in &bins {
            if !variable.is_binned() {
                return Err(DomainError::InvalidArtifact(format!(
                    "`{variable}` is categorical and cannot carry interval bins"
                )));
            }
            if intervals.is_empty() {
                return Err(DomainError::InvalidArtifact(format!("`{variable}` has no bins")));
            }
            for pair in intervals.windows(2) {
                if pair[1].left < pair[0].right {
                    return Err(DomainError::InvalidArtifact(format!(
                        "bins of `{variable}` must be ascending and non-overlapping, found {} before {}",
                        pair[0], pair[1]
                    )));
                }
            }
        }

        if let Some(missing) =
            ModelVariable::BINNED.into_iter().find(|variable| !bins.contains_key(variable))
        {
            return Err(DomainError::InvalidArtifact(format!("category table has no bins for `{missing}`")));
        }

        Ok(Self { bins })
    }

    pub fn bins(&self, variable: ModelVariable) -> Result<&[Interval], DomainError> {
        self.bins
            .get(&variable)
            .map(Vec::as_slice)
            .ok_or_else(|| DomainError::UnknownVariable(variable.as_str().to_owned()))
    }

    pub fn bin_for(&self, variable: ModelVariable, value: f64) -> Result<Interval, DomainError> {
        bin_for(variable, value, self.bins(variable)?)
    }

    pub fn neighbors(
        &self,
        variable: ModelVariable,
        baseline: &Interval,
        direction: NeighborDirection,
    ) -> Result<Vec<Interval>, DomainError> {
        Ok(neighbor_bins(self.bins(variable)?, baseline, direction))
    }

    /// Bin every continuous attribute of `listing`.
    pub fn discretize(&self, listing: &ListingRecord) -> Result<ListingEvidence, DomainError> {
        Ok(ListingEvidence {
            town: listing.town.clone(),
            flat_type: listing.flat_type.clone(),
            flat_model: listing.flat_model.clone(),
            remaining_lease: self
                .bin_for(ModelVariable::RemainingLeaseYears, listing.remaining_lease_years)?,
            floor_area: self.bin_for(ModelVariable::FloorAreaSqm, listing.floor_area_sqm)?,
            resale_price: self.bin_for(ModelVariable::ResalePrice, listing.resale_price)?,
            floor_area_sqm: listing.floor_area_sqm,
            price: listing.resale_price,
        })
    }
}

impl TryFrom<BTreeMap<ModelVariable, Vec<Interval>>> for CategoryTable {
    type Error = DomainError;

    fn try_from(bins: BTreeMap<ModelVariable, Vec<Interval>>) -> Result<Self, Self::Error> {
        Self::new(bins)
    }
}

/// The bin containing `value`, first match in ascending order.
///
/// Bounds are checked inclusively on both sides, so a value sitting on a
/// shared edge lands in the lower bin. Values outside every bin are
/// out of domain; they are never clamped.
pub fn bin_for(variable: ModelVariable, value: f64, bins: &[Interval]) -> Result<Interval, DomainError> {
    bins.iter()
        .find(|bin| bin.contains(value))
        .copied()
        .ok_or_else(|| DomainError::OutOfDomain { variable: variable.as_str().to_owned(), value })
}

/// Bins strictly above or below `baseline` by midpoint, in ascending order.
pub fn neighbor_bins(bins: &[Interval], baseline: &Interval, direction: NeighborDirection) -> Vec<Interval> {
    let pivot = baseline.mid();
    bins.iter()
        .filter(|bin| match direction {
            NeighborDirection::AtLeast => bin.mid() > pivot,
            NeighborDirection::AtMost => bin.mid() < pivot,
        })
        .copied()
        .collect()
}

/// A listing seen through the model: its categories, its bins and the raw
/// values the insight rules compare against.
#[derive(Clone, Debug, PartialEq)]
pub struct ListingEvidence {
    pub town: String,
    pub flat_type: String,
    pub flat_model: String,
    pub remaining_lease: Interval,
    pub floor_area: Interval,
    pub resale_price: Interval,
    pub floor_area_sqm: f64,
    pub price: f64,
}

impl ListingEvidence {
    /// Town, flat type and flat model observed; every binned variable free.
    pub fn categorical(&self) -> Evidence {
        Evidence {
            town: Some(self.town.clone()),
            flat_type: Some(self.flat_type.clone()),
            flat_model: Some(self.flat_model.clone()),
            ..Evidence::default()
        }
    }

    /// Categorical evidence with the lease pinned to `lease`.
    pub fn with_lease(&self, lease: Interval) -> Evidence {
        self.categorical().with_remaining_lease(lease)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;

    use super::CategoryTable;
    use crate::domain::interval::Interval;
    use crate::inference::ModelVariable;

    pub fn bins(edges: &[f64]) -> Vec<Interval> {
        edges
            .windows(2)
            .map(|pair| Interval::new(pair[0], pair[1]).expect("edges ascend"))
            .collect()
    }

    /// Lease in 10-year bins from 40 to 100, area in 20 sqm bins, price in
    /// 100k bins.
    pub fn category_table() -> CategoryTable {
        CategoryTable::new(BTreeMap::from([
            (
                ModelVariable::RemainingLeaseYears,
                bins(&[40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]),
            ),
            (ModelVariable::FloorAreaSqm, bins(&[30.0, 50.0, 70.0, 90.0, 110.0, 130.0, 150.0])),
            (
                ModelVariable::ResalePrice,
                bins(&[100_000.0, 200_000.0, 300_000.0, 400_000.0, 500_000.0, 600_000.0, 700_000.0]),
            ),
        ]))
        .expect("fixture table")
    }
}
