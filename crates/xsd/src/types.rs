//! Declared scalar types of elements and attributes.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::qname::QName;

/// XML Schema namespace URI.
pub const XSD_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// Caller-supplied text-to-value conversion.
pub type Converter = Arc<dyn Fn(&str) -> Value + Send + Sync>;

/// How text content of a declared type maps to a value.
#[derive(Clone, Default)]
pub enum ScalarKind {
    #[default]
    String,
    Boolean,
    Integer,
    Double,
    Date,
    Time,
    DateTime,
    Custom(Converter),
}

impl ScalarKind {
    /// Maps an XML Schema built-in type name to its kind.
    ///
    /// Unknown names (including user-defined simple types) map to `String`.
    pub fn for_xsd_name(name: &str) -> Self {
        match name {
            "boolean" => ScalarKind::Boolean,
            "byte" | "short" | "int" | "long" | "integer" | "unsignedByte" | "unsignedShort"
            | "unsignedInt" | "unsignedLong" | "positiveInteger" | "negativeInteger"
            | "nonNegativeInteger" | "nonPositiveInteger" => ScalarKind::Integer,
            "float" | "double" | "decimal" => ScalarKind::Double,
            "date" => ScalarKind::Date,
            "time" => ScalarKind::Time,
            "dateTime" => ScalarKind::DateTime,
            _ => ScalarKind::String,
        }
    }

    pub fn custom<F>(convert: F) -> Self
    where
        F: Fn(&str) -> Value + Send + Sync + 'static,
    {
        ScalarKind::Custom(Arc::new(convert))
    }
}

impl fmt::Debug for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarKind::String => f.write_str("String"),
            ScalarKind::Boolean => f.write_str("Boolean"),
            ScalarKind::Integer => f.write_str("Integer"),
            ScalarKind::Double => f.write_str("Double"),
            ScalarKind::Date => f.write_str("Date"),
            ScalarKind::Time => f.write_str("Time"),
            ScalarKind::DateTime => f.write_str("DateTime"),
            ScalarKind::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Reference to an element's or attribute's declared type.
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub name: QName,
    pub kind: ScalarKind,
}

impl TypeRef {
    pub fn new(name: QName, kind: ScalarKind) -> Self {
        Self { name, kind }
    }

    /// A built-in XML Schema type such as `xs:int` or `xs:dateTime`.
    pub fn xsd(name: &str) -> Self {
        Self {
            name: QName::new(XSD_NAMESPACE, name),
            kind: ScalarKind::for_xsd_name(name),
        }
    }
}
