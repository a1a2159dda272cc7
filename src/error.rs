//! Error types for the backend

use thiserror::Error;

/// Main error type for the backend
#[derive(Error, Debug)]
pub enum Error {
    /// Filter descriptor error
    #[error("Filter error: {0}")]
    Filter(#[from] FilterError),

    /// Input validation error
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Requested entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General error
    #[error("{0}")]
    General(String),
}

/// Filter descriptor errors
///
/// Raised while parsing or compiling a single filter descriptor. The batch
/// applicator logs these and skips the offending descriptor; the strict
/// applicator propagates them.
#[derive(Error, Debug)]
pub enum FilterError {
    /// Descriptor `type` string is not one of the supported filter types
    #[error("Unsupported filter type: {0}")]
    UnsupportedType(String),

    /// Descriptor `value` shape does not match its `type`
    #[error("Invalid value for '{field}' ({filter_type} filter): {message}")]
    InvalidValue {
        /// Field the descriptor targets
        field: String,
        /// The descriptor's filter type
        filter_type: String,
        /// What was wrong with the value
        message: String,
    },

    /// Comparison operator is not valid for the filter type
    #[error("Unsupported operator '{operator}' for {filter_type} filter")]
    UnsupportedOperator {
        /// The rejected operator string
        operator: String,
        /// The descriptor's filter type
        filter_type: String,
    },

    /// Related model referenced by a custom filter does not exist
    #[error("Unknown relation model: {0}")]
    UnknownRelation(String),
}

/// Validation errors with field-level context
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Required field is missing
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid format
    #[error("Invalid format for {field}: {message}")]
    InvalidFormat {
        /// Field name being validated
        field: String,
        /// Description of the format error
        message: String,
    },

    /// Value is out of allowed range
    #[error("{field} value {value} is out of range")]
    OutOfRange {
        /// Field name being validated
        field: String,
        /// The invalid value
        value: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    Failed(String),
}

impl ValidationError {
    /// Field name this error refers to, for structured 422 responses
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingField(f) => f,
            ValidationError::InvalidFormat { field, .. } => field,
            ValidationError::OutOfRange { field, .. } => field,
            ValidationError::Failed(_) => "_",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_error_display() {
        let err = FilterError::UnsupportedType("bogus".to_string());
        assert_eq!(err.to_string(), "Unsupported filter type: bogus");
    }

    #[test]
    fn test_validation_error_field() {
        let err = ValidationError::MissingField("start".to_string());
        assert_eq!(err.field(), "start");

        let err = ValidationError::InvalidFormat {
            field: "value".to_string(),
            message: "expected array".to_string(),
        };
        assert_eq!(err.field(), "value");
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = ValidationError::MissingField("end".to_string()).into();
        assert!(matches!(err, Error::Validation(_)));
    }
}
