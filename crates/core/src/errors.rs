use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DomainError {
    #[error("value {value} for `{variable}` does not fit in any known category interval")]
    OutOfDomain { variable: String, value: f64 },
    #[error("variable `{0}` is not part of the inference model")]
    UnknownVariable(String),
    #[error("state `{state}` is not a known state of `{variable}`")]
    UnknownState { variable: String, state: String },
    #[error("invalid constraint `{field}`: {message}")]
    InvalidConstraint { field: &'static str, message: String },
    #[error("`{0}` is not a numeric listing field")]
    UnknownField(String),
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    pub fn is_out_of_domain(&self) -> bool {
        matches!(self, Self::OutOfDomain { .. })
    }

    /// The listing carries a value or category the trained model never saw.
    pub fn is_outside_model(&self) -> bool {
        matches!(self, Self::OutOfDomain { .. } | Self::UnknownState { .. })
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("configuration failure: {0}")]
    Configuration(String),
    #[error("artifact failure: {0}")]
    Artifact(String),
}

impl ApplicationError {
    /// Stable machine-readable class used by operator tooling.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::OutOfDomain { .. }) => "out_of_domain",
            Self::Domain(DomainError::InvalidConstraint { .. }) => "invalid_constraint",
            Self::Domain(_) => "domain",
            Self::Configuration(_) => "configuration",
            Self::Artifact(_) => "artifact",
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError};

    #[test]
    fn out_of_domain_message_names_variable_and_value() {
        let error =
            DomainError::OutOfDomain { variable: "floor_area_sqm".to_owned(), value: 512.0 };

        assert!(error.is_out_of_domain());
        assert!(error.is_outside_model());
        assert!(DomainError::UnknownState { variable: "town".to_owned(), state: "X".to_owned() }
            .is_outside_model());
        assert!(!DomainError::InvalidArtifact("bad".to_owned()).is_outside_model());
        assert_eq!(
            error.to_string(),
            "value 512 for `floor_area_sqm` does not fit in any known category interval"
        );
    }

    #[test]
    fn application_error_classes_are_stable() {
        let domain = ApplicationError::from(DomainError::OutOfDomain {
            variable: "resale_price".to_owned(),
            value: -1.0,
        });
        assert_eq!(domain.class(), "out_of_domain");

        let constraint = ApplicationError::from(DomainError::InvalidConstraint {
            field: "max_price",
            message: "must be non-negative".to_owned(),
        });
        assert_eq!(constraint.class(), "invalid_constraint");

        assert_eq!(
            ApplicationError::Configuration("all weights are zero".to_owned()).class(),
            "configuration"
        );
        assert_eq!(ApplicationError::Artifact("missing file".to_owned()).class(), "artifact");
    }
}
