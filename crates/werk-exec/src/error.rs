//! Validation error types for command arguments and program paths.

use std::fmt;
use thiserror::Error;

/// The kind of validation error that occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Input was empty when a value was required.
    Empty,
    /// Input contained dangerous shell metacharacters or control bytes.
    ShellInjection {
        /// The dangerous character found.
        found: char,
    },
    /// Input contained path traversal sequences.
    PathTraversal {
        /// The traversal pattern found.
        pattern: String,
    },
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "input cannot be empty"),
            Self::ShellInjection { found } => {
                write!(f, "character {found:?} not allowed")
            }
            Self::PathTraversal { pattern } => {
                write!(f, "path traversal pattern '{pattern}' detected")
            }
        }
    }
}

/// Error returned when validation fails.
#[derive(Debug, Clone, Error)]
#[error("validation failed for '{field}': {kind}")]
pub struct ValidationError {
    /// The name of the field that failed validation.
    pub field: String,
    /// The kind of validation error.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// Create a new validation error.
    #[must_use]
    pub fn new(field: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }

    /// Create an "empty" validation error.
    #[must_use]
    pub fn empty(field: impl Into<String>) -> Self {
        Self::new(field, ValidationErrorKind::Empty)
    }

    /// Create a "shell injection" validation error.
    #[must_use]
    pub fn shell_injection(field: impl Into<String>, found: char) -> Self {
        Self::new(field, ValidationErrorKind::ShellInjection { found })
    }

    /// Create a "path traversal" validation error.
    #[must_use]
    pub fn path_traversal(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(
            field,
            ValidationErrorKind::PathTraversal {
                pattern: pattern.into(),
            },
        )
    }
}
