//! Error types for elimination and queries
//!
//! Every fallible operation in the crate reports one of these variants. They
//! fall into four classes (see [`ErrorKind`]): structural problems with the
//! input, variables without information, lookups of keys that do not exist,
//! and numerically singular systems.

use std::fmt;

use crate::discrete::Key;

/// Coarse classification of a [`HybridError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input: orderings, cardinalities, dimensions, tree shape
    Structural,
    /// A variable has no incident factors when it is eliminated
    Underdetermined,
    /// A query references a key that is missing or was never eliminated
    Lookup,
    /// A linear system is singular beyond the configured tolerance
    Numeric,
}

/// Errors that can occur during elimination, incremental updates and queries
#[derive(Debug, Clone, PartialEq)]
pub enum HybridError {
    /// A discrete key is used with two different cardinalities
    CardinalityMismatch {
        /// Offending key
        key: Key,
        /// Cardinality seen first
        expected: usize,
        /// Conflicting cardinality
        actual: usize,
    },

    /// A continuous key is used with two different dimensions
    DimensionMismatch {
        /// Offending key
        key: Key,
        /// Dimension seen first
        expected: usize,
        /// Conflicting dimension
        actual: usize,
    },

    /// An ordering lists the same key more than once
    DuplicateKey {
        /// Repeated key
        key: Key,
    },

    /// Any other structural violation
    InvalidStructure {
        /// Description of the violation
        description: String,
    },

    /// A variable has zero incident factors at the time of its elimination
    Underdetermined {
        /// Variable being eliminated
        key: Key,
    },

    /// An assignment or value container lacks a required key
    MissingKey {
        /// Required key
        key: Key,
    },

    /// A query references a key that was never eliminated
    NotEliminated {
        /// Queried key
        key: Key,
    },

    /// A linear system could not be triangularized
    SingularSystem {
        /// Which system failed
        context: String,
    },

    /// A query hit an assignment whose elimination was singular
    DegenerateAssignment {
        /// Rendered assignment
        assignment: String,
    },
}

impl HybridError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            HybridError::CardinalityMismatch { .. }
            | HybridError::DimensionMismatch { .. }
            | HybridError::DuplicateKey { .. }
            | HybridError::InvalidStructure { .. } => ErrorKind::Structural,
            HybridError::Underdetermined { .. } => ErrorKind::Underdetermined,
            HybridError::MissingKey { .. } | HybridError::NotEliminated { .. } => {
                ErrorKind::Lookup
            }
            HybridError::SingularSystem { .. } | HybridError::DegenerateAssignment { .. } => {
                ErrorKind::Numeric
            }
        }
    }

    /// Shorthand for [`HybridError::InvalidStructure`]
    pub fn structure(description: impl Into<String>) -> Self {
        HybridError::InvalidStructure {
            description: description.into(),
        }
    }

    /// Shorthand for [`HybridError::SingularSystem`]
    pub fn singular(context: impl Into<String>) -> Self {
        HybridError::SingularSystem {
            context: context.into(),
        }
    }
}

impl fmt::Display for HybridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HybridError::CardinalityMismatch {
                key,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Cardinality mismatch for {}: expected {}, got {}",
                    key, expected, actual
                )
            }
            HybridError::DimensionMismatch {
                key,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Dimension mismatch for {}: expected {}, got {}",
                    key, expected, actual
                )
            }
            HybridError::DuplicateKey { key } => {
                write!(f, "Key {} appears more than once in the ordering", key)
            }
            HybridError::InvalidStructure { description } => {
                write!(f, "Invalid structure: {}", description)
            }
            HybridError::Underdetermined { key } => {
                write!(f, "Variable {} has no incident factors", key)
            }
            HybridError::MissingKey { key } => write!(f, "Missing value for key {}", key),
            HybridError::NotEliminated { key } => {
                write!(f, "Key {} was never eliminated", key)
            }
            HybridError::SingularSystem { context } => {
                write!(f, "Singular linear system: {}", context)
            }
            HybridError::DegenerateAssignment { assignment } => {
                write!(f, "Assignment {} has zero probability", assignment)
            }
        }
    }
}

impl std::error::Error for HybridError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discrete::symbol;

    #[test]
    fn test_error_display() {
        let err = HybridError::CardinalityMismatch {
            key: symbol('m', 1),
            expected: 2,
            actual: 3,
        };
        let text = err.to_string();
        assert!(text.contains("m1"));
        assert!(text.contains('2'));
        assert!(text.contains('3'));

        let err = HybridError::Underdetermined {
            key: symbol('x', 4),
        };
        assert!(err.to_string().contains("x4"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            HybridError::DuplicateKey {
                key: symbol('x', 1)
            }
            .kind(),
            ErrorKind::Structural
        );
        assert_eq!(
            HybridError::Underdetermined {
                key: symbol('x', 1)
            }
            .kind(),
            ErrorKind::Underdetermined
        );
        assert_eq!(
            HybridError::NotEliminated {
                key: symbol('m', 1)
            }
            .kind(),
            ErrorKind::Lookup
        );
        assert_eq!(HybridError::singular("x1").kind(), ErrorKind::Numeric);
        assert_eq!(HybridError::structure("bad").kind(), ErrorKind::Structural);
    }
}
