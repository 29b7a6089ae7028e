//! Discretisation bins shared by the category table and the inference model.
//!
//! Bins are written in pandas interval notation, `(left, right]`, which is the
//! form the training pipeline emits for both the category table and the state
//! names of the network.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    pub left: f64,
    pub right: f64,
}

impl Interval {
    pub fn new(left: f64, right: f64) -> Result<Self, DomainError> {
        if !left.is_finite() || !right.is_finite() || left >= right {
            return Err(DomainError::InvalidArtifact(format!(
                "interval bounds must be finite with left < right, got ({left}, {right}]"
            )));
        }
        Ok(Self { left, right })
    }

    pub fn mid(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    /// Closed containment, `left <= value <= right`.
    pub fn contains(&self, value: f64) -> bool {
        self.left <= value && value <= self.right
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?}]", self.left, self.right)
    }
}

impl FromStr for Interval {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let invalid = || DomainError::InvalidArtifact(format!("`{trimmed}` is not an interval"));

        let inner = trimmed
            .strip_prefix(['(', '['])
            .and_then(|rest| rest.strip_suffix([']', ')']))
            .ok_or_else(invalid)?;
        let (left, right) = inner.split_once(',').ok_or_else(invalid)?;
        let left = left.trim().parse::<f64>().map_err(|_| invalid())?;
        let right = right.trim().parse::<f64>().map_err(|_| invalid())?;

        Self::new(left, right)
    }
}

impl TryFrom<String> for Interval {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}
