use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::listing::NumericField;
use crate::errors::{ApplicationError, DomainError};

/// Whether higher (`benefit`) or lower (`cost`) values are better.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Benefit,
    Cost,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Benefit => f.write_str("benefit"),
            Self::Cost => f.write_str("cost"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CriterionSpec {
    pub field: NumericField,
    pub direction: Direction,
    pub label: String,
}

/// Ordered list of ranking criteria, one per listing column.
///
/// Deserialises from the `{ "column": { "direction": .., "label": .. } }` shape
/// used by `mcda_criteria.json`, keeping the file's key order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CriteriaConfig {
    criteria: Vec<CriterionSpec>,
}

impl CriteriaConfig {
    pub fn new(criteria: Vec<CriterionSpec>) -> Result<Self, DomainError> {
        let mut seen = Vec::with_capacity(criteria.len());
        for criterion in &criteria {
            if seen.contains(&criterion.field) {
                return Err(DomainError::InvalidArtifact(format!(
                    "criterion `{}` is configured more than once",
                    criterion.field
                )));
            }
            seen.push(criterion.field);
        }
        Ok(Self { criteria })
    }

    pub fn iter(&self) -> impl Iterator<Item = &CriterionSpec> {
        self.criteria.iter()
    }

    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn get(&self, field: NumericField) -> Option<&CriterionSpec> {
        self.criteria.iter().find(|criterion| criterion.field == field)
    }
}

impl<'de> Deserialize<'de> for CriteriaConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Entry {
            direction: Direction,
            label: Option<String>,
        }

        struct CriteriaVisitor;

        impl<'de> Visitor<'de> for CriteriaVisitor {
            type Value = CriteriaConfig;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of column name to {direction, label}")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut criteria = Vec::new();
                while let Some((column, entry)) = map.next_entry::<String, Entry>()? {
                    let field = column.parse::<NumericField>().map_err(serde::de::Error::custom)?;
                    criteria.push(CriterionSpec {
                        field,
                        direction: entry.direction,
                        label: entry.label.unwrap_or(column),
                    });
                }
                CriteriaConfig::new(criteria).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_map(CriteriaVisitor)
    }
}

/// Buyer priority presets, each mapping to a fixed weight table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Price,
    FloorArea,
    Lease,
    Mrt,
    #[default]
    Balanced,
}

impl Priority {
    /// Raw weights for the preset; `None` means equal weighting.
    pub fn weights(self) -> Option<BTreeMap<NumericField, f64>> {
        use NumericField::*;

        let table = match self {
            Self::Price => [0.5, 0.2, 0.2, 0.1],
            Self::FloorArea => [0.2, 0.5, 0.2, 0.1],
            Self::Lease => [0.2, 0.2, 0.5, 0.1],
            Self::Mrt => [0.2, 0.2, 0.1, 0.5],
            Self::Balanced => return None,
        };

        Some(
            [ResalePrice, FloorAreaSqm, RemainingLeaseYears, DistMrtKm]
                .into_iter()
                .zip(table)
                .collect(),
        )
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "price" => Ok(Self::Price),
            "floor_area" | "floor area" => Ok(Self::FloorArea),
            "lease" => Ok(Self::Lease),
            "mrt" | "nearest mrt" => Ok(Self::Mrt),
            "balanced" | "none" | "none - treat equally" => Ok(Self::Balanced),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported priority `{other}` (expected price|floor_area|lease|mrt|balanced)"
            ))),
        }
    }
}

/// Normalised criterion weights; always covers every configured criterion and
/// sums to 1.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeightVector {
    weights: Vec<(NumericField, f64)>,
}

impl WeightVector {
    /// Resolve the weights used for one ranking call.
    ///
    /// Without supplied weights every criterion gets `1 / n`. Supplied weights
    /// default to 0 for missing criteria and are renormalised; all-zero weights
    /// are a configuration error.
    pub fn resolve(
        criteria: &CriteriaConfig,
        supplied: Option<&BTreeMap<NumericField, f64>>,
    ) -> Result<Self, ApplicationError> {
        if criteria.is_empty() {
            return Err(ApplicationError::Configuration(
                "no ranking criteria are configured".to_string(),
            ));
        }

        let Some(supplied) = supplied else {
            let equal = 1.0 / criteria.len() as f64;
            return Ok(Self {
                weights: criteria.iter().map(|criterion| (criterion.field, equal)).collect(),
            });
        };

        let raw: Vec<(NumericField, f64)> = criteria
            .iter()
            .map(|criterion| (criterion.field, supplied.get(&criterion.field).copied().unwrap_or(0.0)))
            .collect();

        if let Some((field, weight)) =
            raw.iter().find(|(_, weight)| !weight.is_finite() || *weight < 0.0)
        {
            return Err(ApplicationError::Configuration(format!(
                "weight for `{field}` must be a non-negative number, got {weight}"
            )));
        }

        let total: f64 = raw.iter().map(|(_, weight)| weight).sum();
        if total == 0.0 {
            return Err(ApplicationError::Configuration(
                "all weights for MCDA are zero".to_string(),
            ));
        }

        Ok(Self { weights: raw.into_iter().map(|(field, weight)| (field, weight / total)).collect() })
    }

    pub fn get(&self, field: NumericField) -> f64 {
        self.weights
            .iter()
            .find(|(candidate, _)| *candidate == field)
            .map(|(_, weight)| *weight)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NumericField, f64)> + '_ {
        self.weights.iter().copied()
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().map(|(_, weight)| weight).sum()
    }
}
