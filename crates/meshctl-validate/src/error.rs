//! Validation errors
//!
//! Validation never stops at the first problem: every check returns a
//! [`ValidationErrors`] list and callers concatenate them.

use std::fmt;

use thiserror::Error;

/// A single validation failure
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The walker was handed something other than a struct-like node
    #[error("validate path {path}, value: {value}, expected {expected}")]
    TypeMismatch {
        /// Path the walker was invoked at
        path: String,
        /// Rendering of the offending value
        value: String,
        /// Node shape the walker expected
        expected: String,
    },

    /// A required field is empty
    #[error("field {path} is required but not set")]
    RequiredField {
        /// Path in user-facing (YAML) spelling
        path: String,
    },

    /// A value does not match its grammar
    #[error("invalid value {path}: {value}")]
    InvalidValue {
        /// Path of the value
        path: String,
        /// The value as written
        value: String,
    },

    /// A rule rejected a value
    #[error("{message}")]
    Rule {
        /// Path of the value
        path: String,
        /// Human readable description, including the observed value
        message: String,
    },

    /// A nested document (e.g. mesh config) failed to decode or validate
    #[error("{path}: {message}")]
    Document {
        /// Path of the nested document
        path: String,
        /// Description of what's wrong
        message: String,
    },
}

impl ValidationError {
    /// Path the error refers to
    pub fn path(&self) -> &str {
        match self {
            Self::TypeMismatch { path, .. }
            | Self::RequiredField { path }
            | Self::InvalidValue { path, .. }
            | Self::Rule { path, .. }
            | Self::Document { path, .. } => path,
        }
    }
}

/// Aggregated validation failures, in discovery order
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// No errors
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Add one error
    pub fn push(&mut self, err: ValidationError) {
        self.0.push(err);
    }

    /// Append every error from `other`
    pub fn append(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    /// True when validation passed
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of errors
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over the errors
    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// `Ok(())` when empty, otherwise `Err(self)`
    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&lines.join("\n"))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(err: ValidationError) -> Self {
        Self(vec![err])
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<I: IntoIterator<Item = ValidationError>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<ValidationError> for ValidationErrors {
    fn extend<I: IntoIterator<Item = ValidationError>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for ValidationErrors {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<ValidationErrors> for meshctl_common::Error {
    fn from(errs: ValidationErrors) -> Self {
        meshctl_common::Error::Multiple(
            errs.into_iter()
                .map(|e| {
                    let field = e.path().to_string();
                    meshctl_common::Error::validation_for_field("IstioOperator", field, e.to_string())
                })
                .collect(),
        )
    }
}
