use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Buyer-supplied hard constraints. An absent field imposes no restriction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConstraintSet {
    pub max_price: Option<f64>,
    pub min_remaining_lease: Option<f64>,
    pub max_mrt_distance: Option<f64>,
    pub towns: Option<Vec<String>>,
    pub flat_types: Option<Vec<String>>,
    pub storey_ranges: Option<Vec<String>>,
    pub flat_models: Option<Vec<String>>,
}

impl ConstraintSet {
    pub fn unconstrained() -> Self {
        Self::default()
    }

    pub fn with_max_price(mut self, max_price: f64) -> Self {
        self.max_price = Some(max_price);
        self
    }

    pub fn with_min_remaining_lease(mut self, years: f64) -> Self {
        self.min_remaining_lease = Some(years);
        self
    }

    pub fn with_max_mrt_distance(mut self, km: f64) -> Self {
        self.max_mrt_distance = Some(km);
        self
    }

    pub fn with_towns<I, S>(mut self, towns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.towns = Some(towns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_flat_types<I, S>(mut self, flat_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flat_types = Some(flat_types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_storey_ranges<I, S>(mut self, storey_ranges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.storey_ranges = Some(storey_ranges.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_flat_models<I, S>(mut self, flat_models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flat_models = Some(flat_models.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_unconstrained(&self) -> bool {
        self.max_price.is_none()
            && self.min_remaining_lease.is_none()
            && self.max_mrt_distance.is_none()
            && membership(&self.towns).is_none()
            && membership(&self.flat_types).is_none()
            && membership(&self.storey_ranges).is_none()
            && membership(&self.flat_models).is_none()
    }

    /// Numeric bounds must be finite and non-negative.
    pub fn validate(&self) -> Result<(), DomainError> {
        validate_bound("max_price", self.max_price)?;
        validate_bound("min_remaining_lease", self.min_remaining_lease)?;
        validate_bound("max_mrt_distance", self.max_mrt_distance)?;
        Ok(())
    }
}

/// An empty membership list is treated the same as an absent one.
pub(crate) fn membership(values: &Option<Vec<String>>) -> Option<&[String]> {
    values.as_deref().filter(|values| !values.is_empty())
}

fn validate_bound(field: &'static str, value: Option<f64>) -> Result<(), DomainError> {
    match value {
        Some(value) if !value.is_finite() => Err(DomainError::InvalidConstraint {
            field,
            message: format!("must be a finite number, got {value}"),
        }),
        Some(value) if value < 0.0 => Err(DomainError::InvalidConstraint {
            field,
            message: format!("must be greater than or equal to 0, got {value}"),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::ConstraintSet;
    use crate::errors::DomainError;

    #[test]
    fn default_and_empty_lists_are_unconstrained() {
        assert!(ConstraintSet::unconstrained().is_unconstrained());
        assert!(ConstraintSet::default().with_towns(Vec::<String>::new()).is_unconstrained());
        assert!(!ConstraintSet::default().with_max_price(1.0).is_unconstrained());
    }

    #[test]
    fn negative_bounds_are_rejected() {
        let error = ConstraintSet::default()
            .with_min_remaining_lease(-1.0)
            .validate()
            .expect_err("negative lease should fail");

        assert!(matches!(
            error,
            DomainError::InvalidConstraint { field: "min_remaining_lease", .. }
        ));
    }

    #[test]
    fn deserializes_partial_request_payload() {
        let constraints: ConstraintSet =
            serde_json::from_str(r#"{"max_price": 400000, "towns": ["TAMPINES"]}"#)
                .expect("constraints");

        assert_eq!(constraints.max_price, Some(400_000.0));
        assert_eq!(constraints.towns.as_deref(), Some(&["TAMPINES".to_owned()][..]));
        assert!(constraints.flat_types.is_none());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_json::from_str::<ConstraintSet>(r#"{"max_prize": 1}"#);
        assert!(result.is_err());
    }
}
