//! Error types for SOAP serialization and deserialization.

use std::fmt;

use serde_json::Value;
use thiserror::Error;

use crate::envelope::SoapVersion;

/// Errors raised by the codec.
#[derive(Error, Debug)]
pub enum SoapError {
    /// Malformed XML reported by the tokenizer. No partial tree is returned.
    #[error("XML parse error: {0}")]
    Tokenizer(String),

    /// Well-formed XML whose body is a SOAP Fault.
    #[error(transparent)]
    Fault(Box<SoapFault>),

    /// A value was rejected by its type's restriction.
    #[error("restriction violated for <{element}>: {source}")]
    Restriction {
        element: String,
        #[source]
        source: helios_xsd::RestrictionError,
    },

    /// Nesting exceeded the configured maximum depth.
    #[error("nesting depth exceeds the configured maximum of {max}")]
    DepthExceeded { max: usize },

    /// The tree builder was driven out of order.
    #[error("tree builder error: {0}")]
    Builder(String),

    /// Configuration rejected by [`HandlerOptions::validate`](crate::HandlerOptions::validate).
    #[error("invalid configuration: {}", .0.join("; "))]
    Config(Vec<String>),

    /// Converting between typed values and value trees failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// XML writing error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Xsd(#[from] helios_xsd::XsdError),
}

impl SoapError {
    /// Returns the fault payload when this error is a SOAP fault.
    pub fn as_fault(&self) -> Option<&SoapFault> {
        match self {
            SoapError::Fault(fault) => Some(fault),
            _ => None,
        }
    }

    pub(crate) fn tokenizer(err: impl fmt::Display) -> Self {
        SoapError::Tokenizer(err.to_string())
    }
}

impl From<SoapFault> for SoapError {
    fn from(fault: SoapFault) -> Self {
        SoapError::Fault(Box::new(fault))
    }
}

/// A SOAP fault found in a parsed response.
#[derive(Debug, Clone, PartialEq)]
pub struct SoapFault {
    /// Human-readable summary composed from the fault fields.
    pub message: String,
    /// Fault shape that was recognized, if any.
    pub version: Option<SoapVersion>,
    /// The whole parsed document.
    pub root: Value,
}

impl SoapFault {
    /// The parsed `Fault` element, located under `Envelope.Body`.
    pub fn fault(&self) -> Option<&Value> {
        self.root.get("Envelope")?.get("Body")?.get("Fault")
    }
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SoapFault {}

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, SoapError>;
