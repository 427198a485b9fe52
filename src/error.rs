//! Error types for agritype operations.
//!
//! Provides rich error context for pipeline consumers.

use std::fmt;

/// Main error type for agritype operations.
///
/// Covers dataset schema problems, fitting failures, candidate-selection
/// failures and artifact persistence failures.
#[derive(Debug)]
pub enum AgritypeError {
    /// A required dataset column is missing or unusable.
    MissingColumn {
        /// Column the pipeline expected
        column: String,
        /// Columns actually present in the input
        available: Vec<String>,
    },

    /// A cell could not be parsed as the expected type.
    MalformedValue {
        /// Column name
        column: String,
        /// 1-based record number in the input
        record: usize,
        /// Offending raw value
        value: String,
    },

    /// Matrix/label dimensions don't match for the operation.
    DimensionMismatch {
        /// Expected dimensions description
        expected: String,
        /// Actual dimensions found
        actual: String,
    },

    /// Invalid hyperparameter value provided.
    InvalidHyperparameter {
        /// Parameter name
        param: String,
        /// Provided value
        value: String,
        /// Constraint description
        constraint: String,
    },

    /// A transform/predict was requested on an unfitted component.
    NotFitted {
        /// Component name
        component: String,
    },

    /// Every candidate model failed during grid search.
    NoViableCandidate {
        /// Number of candidate configurations attempted
        attempted: usize,
    },

    /// Artifact reload-and-predict check failed after serialization.
    ArtifactCheck {
        /// Failure description
        message: String,
    },

    /// I/O error (file not found, permission denied, etc.).
    Io(std::io::Error),

    /// CSV parsing error.
    Csv(csv::Error),

    /// Serialization/deserialization error.
    Serialization(String),

    /// Generic error with string message.
    Other(String),
}

impl fmt::Display for AgritypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgritypeError::MissingColumn { column, available } => {
                write!(
                    f,
                    "Missing column '{column}'; available columns: {}",
                    available.join(", ")
                )
            }
            AgritypeError::MalformedValue {
                column,
                record,
                value,
            } => {
                write!(
                    f,
                    "Malformed value '{value}' in column '{column}' at record {record}"
                )
            }
            AgritypeError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {expected}, got {actual}")
            }
            AgritypeError::InvalidHyperparameter {
                param,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid hyperparameter: {param} = {value}, expected {constraint}"
                )
            }
            AgritypeError::NotFitted { component } => {
                write!(f, "{component} not fitted. Call fit() first.")
            }
            AgritypeError::NoViableCandidate { attempted } => {
                write!(
                    f,
                    "All {attempted} candidate configurations failed during grid search"
                )
            }
            AgritypeError::ArtifactCheck { message } => {
                write!(f, "Artifact sanity check failed: {message}")
            }
            AgritypeError::Io(e) => write!(f, "I/O error: {e}"),
            AgritypeError::Csv(e) => write!(f, "CSV error: {e}"),
            AgritypeError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            AgritypeError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for AgritypeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgritypeError::Io(e) => Some(e),
            AgritypeError::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AgritypeError {
    fn from(err: std::io::Error) -> Self {
        AgritypeError::Io(err)
    }
}

impl From<csv::Error> for AgritypeError {
    fn from(err: csv::Error) -> Self {
        AgritypeError::Csv(err)
    }
}

impl From<bincode::Error> for AgritypeError {
    fn from(err: bincode::Error) -> Self {
        AgritypeError::Serialization(err.to_string())
    }
}

impl From<&str> for AgritypeError {
    fn from(msg: &str) -> Self {
        AgritypeError::Other(msg.to_string())
    }
}

impl From<String> for AgritypeError {
    fn from(msg: String) -> Self {
        AgritypeError::Other(msg)
    }
}

impl AgritypeError {
    /// Create a dimension mismatch error with descriptive context
    #[must_use]
    pub fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            expected: format!("{context}={expected}"),
            actual: format!("{actual}"),
        }
    }

    /// Create a not-fitted error for a named component
    #[must_use]
    pub fn not_fitted(component: &str) -> Self {
        Self::NotFitted {
            component: component.to_string(),
        }
    }

    /// Create an empty input error
    #[must_use]
    pub fn empty_input(context: &str) -> Self {
        Self::Other(format!("empty input: {context}"))
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, AgritypeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_display() {
        let err = AgritypeError::MissingColumn {
            column: "ktype".to_string(),
            available: vec!["sau".to_string(), "region".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("ktype"));
        assert!(msg.contains("sau, region"));
    }

    #[test]
    fn test_malformed_value_display() {
        let err = AgritypeError::MalformedValue {
            column: "sau".to_string(),
            record: 12,
            value: "abc".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'abc'"));
        assert!(msg.contains("record 12"));
    }

    #[test]
    fn test_dimension_mismatch_helper() {
        let err = AgritypeError::dimension_mismatch("features", 10, 5);
        let msg = err.to_string();
        assert!(msg.contains("features=10"));
        assert!(msg.contains('5'));
    }

    #[test]
    fn test_not_fitted_display() {
        let err = AgritypeError::not_fitted("StandardScaler");
        assert!(err.to_string().contains("StandardScaler not fitted"));
    }

    #[test]
    fn test_no_viable_candidate_display() {
        let err = AgritypeError::NoViableCandidate { attempted: 6 };
        assert!(err.to_string().contains("All 6 candidate"));
    }

    #[test]
    fn test_from_str_and_string() {
        let err: AgritypeError = "boom".into();
        assert!(matches!(err, AgritypeError::Other(_)));
        let err: AgritypeError = "boom".to_string().into();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_from_io_error_has_source() {
        use std::error::Error;
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing dataset");
        let err: AgritypeError = io_err.into();
        assert!(matches!(err, AgritypeError::Io(_)));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_empty_input_helper() {
        let err = AgritypeError::empty_input("training rows");
        assert!(err.to_string().contains("empty input: training rows"));
    }
}
