//! Error types for the descriptor model.

use thiserror::Error;

/// Errors raised while building or interpreting descriptors.
#[derive(Error, Debug)]
pub enum XsdError {
    /// Text could not be parsed as a qualified name.
    #[error("invalid qualified name: {0:?}")]
    InvalidQName(String),

    /// A `pattern` facet did not compile.
    #[error("invalid pattern facet {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A value failed one or more restriction facets.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("value {value} violates restriction: {}", .violations.join("; "))]
pub struct RestrictionError {
    /// Rendered offending value.
    pub value: String,
    /// Every facet that rejected the value.
    pub violations: Vec<String>,
}

/// Result type alias for descriptor operations
pub type Result<T> = std::result::Result<T, XsdError>;
