//! Caller-side validation run before a row reaches the shim.

use tracing::debug;

use crate::error::ShimError;

/// Result of validating a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// The row satisfies every constraint.
    Valid,
    /// The row violates one or more constraints.
    Invalid {
        /// Human-readable descriptions of each failure.
        errors: Vec<String>,
    },
}

impl ValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Converts to the shim's validation error.
    ///
    /// # Errors
    ///
    /// Returns [`ShimError::Validation`] when invalid.
    pub fn into_result(self) -> Result<(), ShimError> {
        match self {
            Self::Valid => Ok(()),
            Self::Invalid { errors } => Err(ShimError::Validation { errors }),
        }
    }
}

/// Rows that can check their own required fields.
pub trait Validate {
    fn validate(&self) -> ValidationResult;
}

/// Accumulates constraint failures for one row.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<String>,
}

impl Validator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires a non-blank string.
    pub fn required(&mut self, field: &str, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            self.errors.push(format!("{field} is required"));
        }
        self
    }

    /// Requires a non-empty list.
    pub fn non_empty<T>(&mut self, field: &str, value: &[T]) -> &mut Self {
        if value.is_empty() {
            self.errors.push(format!("{field} must not be empty"));
        }
        self
    }

    /// Records `message` when `condition` is false.
    pub fn check(&mut self, condition: bool, message: impl Into<String>) -> &mut Self {
        if !condition {
            self.errors.push(message.into());
        }
        self
    }

    #[must_use]
    pub fn finish(&mut self) -> ValidationResult {
        if self.errors.is_empty() {
            ValidationResult::Valid
        } else {
            debug!(failures = self.errors.len(), "row failed validation");
            ValidationResult::Invalid {
                errors: std::mem::take(&mut self.errors),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_required_field_is_reported() {
        let result = Validator::new().required("title", "   ").finish();
        assert_eq!(
            result,
            ValidationResult::Invalid {
                errors: vec!["title is required".into()]
            }
        );
    }

    #[test]
    fn all_failures_are_collected() {
        let result = Validator::new()
            .required("name", "")
            .non_empty::<u8>("tags", &[])
            .check(false, "rank out of range")
            .finish();
        match result {
            ValidationResult::Invalid { errors } => assert_eq!(errors.len(), 3),
            ValidationResult::Valid => panic!("expected invalid"),
        }
    }

    #[test]
    fn valid_converts_to_ok() {
        assert!(Validator::new().required("name", "x").finish().into_result().is_ok());
    }

    #[test]
    fn invalid_converts_to_validation_error() {
        let err = Validator::new()
            .required("name", "")
            .finish()
            .into_result()
            .unwrap_err();
        assert!(matches!(err, ShimError::Validation { .. }));
    }
}
