use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::interval::Interval;
use crate::errors::DomainError;

/// Discrete variables of the trained network that the core conditions on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariable {
    Town,
    FlatType,
    FlatModel,
    RemainingLeaseYears,
    FloorAreaSqm,
    ResalePrice,
}

impl ModelVariable {
    pub const ALL: [ModelVariable; 6] = [
        ModelVariable::Town,
        ModelVariable::FlatType,
        ModelVariable::FlatModel,
        ModelVariable::RemainingLeaseYears,
        ModelVariable::FloorAreaSqm,
        ModelVariable::ResalePrice,
    ];

    pub const BINNED: [ModelVariable; 3] = [
        ModelVariable::RemainingLeaseYears,
        ModelVariable::FloorAreaSqm,
        ModelVariable::ResalePrice,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Town => "town",
            Self::FlatType => "flat_type",
            Self::FlatModel => "flat_model",
            Self::RemainingLeaseYears => "remaining_lease_years",
            Self::FloorAreaSqm => "floor_area_sqm",
            Self::ResalePrice => "resale_price",
        }
    }

    /// Continuous attributes that the network sees through interval bins.
    pub fn is_binned(self) -> bool {
        matches!(self, Self::RemainingLeaseYears | Self::FloorAreaSqm | Self::ResalePrice)
    }
}

impl fmt::Display for ModelVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelVariable {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|variable| variable.as_str() == value.trim())
            .ok_or_else(|| DomainError::UnknownVariable(value.to_owned()))
    }
}

/// A state of a model variable: a category label or an interval bin.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StateValue {
    Category(String),
    Bin(Interval),
}

impl StateValue {
    pub fn as_bin(&self) -> Option<&Interval> {
        match self {
            Self::Bin(interval) => Some(interval),
            Self::Category(_) => None,
        }
    }

    pub fn as_category(&self) -> Option<&str> {
        match self {
            Self::Category(label) => Some(label),
            Self::Bin(_) => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category(label) => f.write_str(label),
            Self::Bin(interval) => write!(f, "{interval}"),
        }
    }
}

/// Conditioning evidence with one optional slot per model variable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evidence {
    pub town: Option<String>,
    pub flat_type: Option<String>,
    pub flat_model: Option<String>,
    pub remaining_lease_years: Option<Interval>,
    pub floor_area_sqm: Option<Interval>,
    pub resale_price: Option<Interval>,
}

impl Evidence {
    pub fn with_remaining_lease(mut self, bin: Interval) -> Self {
        self.remaining_lease_years = Some(bin);
        self
    }

    pub fn with_floor_area(mut self, bin: Interval) -> Self {
        self.floor_area_sqm = Some(bin);
        self
    }

    pub fn with_resale_price(mut self, bin: Interval) -> Self {
        self.resale_price = Some(bin);
        self
    }

    pub fn get(&self, variable: ModelVariable) -> Option<StateValue> {
        match variable {
            ModelVariable::Town => self.town.clone().map(StateValue::Category),
            ModelVariable::FlatType => self.flat_type.clone().map(StateValue::Category),
            ModelVariable::FlatModel => self.flat_model.clone().map(StateValue::Category),
            ModelVariable::RemainingLeaseYears => self.remaining_lease_years.map(StateValue::Bin),
            ModelVariable::FloorAreaSqm => self.floor_area_sqm.map(StateValue::Bin),
            ModelVariable::ResalePrice => self.resale_price.map(StateValue::Bin),
        }
    }

    /// Observed variables in declaration order.
    pub fn observations(&self) -> Vec<(ModelVariable, StateValue)> {
        ModelVariable::ALL
            .into_iter()
            .filter_map(|variable| self.get(variable).map(|state| (variable, state)))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.observations().is_empty()
    }
}
