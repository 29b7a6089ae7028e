use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Position of a listing in the loaded dataset. Survives filtering and ranking
/// so enriched rows can be joined back to the untouched source row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ListingIndex(pub usize);

impl fmt::Display for ListingIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One resale transaction. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub index: ListingIndex,
    pub town: String,
    pub flat_type: String,
    pub flat_model: String,
    pub storey_range: String,
    pub block: Option<String>,
    pub street_name: Option<String>,
    pub floor_area_sqm: f64,
    pub remaining_lease_years: f64,
    pub resale_price: f64,
    pub dist_mrt_km: Option<f64>,
}

impl ListingRecord {
    /// Value of a numeric column, `None` when the source value is missing.
    pub fn numeric(&self, field: NumericField) -> Option<f64> {
        let value = match field {
            NumericField::ResalePrice => Some(self.resale_price),
            NumericField::FloorAreaSqm => Some(self.floor_area_sqm),
            NumericField::RemainingLeaseYears => Some(self.remaining_lease_years),
            NumericField::DistMrtKm => self.dist_mrt_km,
        };
        value.filter(|value| value.is_finite())
    }

    pub fn address(&self) -> String {
        match (self.block.as_deref(), self.street_name.as_deref()) {
            (Some(block), Some(street)) => format!("{street}, Block {block}"),
            (None, Some(street)) => street.to_owned(),
            (Some(block), None) => format!("Block {block}"),
            (None, None) => format!("{} listing {}", self.town, self.index),
        }
    }
}

/// Numeric listing columns usable as ranking criteria.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericField {
    ResalePrice,
    FloorAreaSqm,
    RemainingLeaseYears,
    DistMrtKm,
}

impl NumericField {
    pub const ALL: [NumericField; 4] = [
        NumericField::ResalePrice,
        NumericField::FloorAreaSqm,
        NumericField::RemainingLeaseYears,
        NumericField::DistMrtKm,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResalePrice => "resale_price",
            Self::FloorAreaSqm => "floor_area_sqm",
            Self::RemainingLeaseYears => "remaining_lease_years",
            Self::DistMrtKm => "dist_mrt_km",
        }
    }
}

impl fmt::Display for NumericField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NumericField {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == value.trim())
            .ok_or_else(|| DomainError::UnknownField(value.to_owned()))
    }
}
