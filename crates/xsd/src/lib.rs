//! # Helios XSD Descriptors
//!
//! Schema-derived metadata consumed by the Helios SOAP codec. A schema
//! compiler turns XSD documents into these descriptors once; the codec walks
//! them read-only on every call.
//!
//! - [`QName`]: namespace-qualified names with text parse/format
//! - [`ElementDescriptor`], [`AttributeDescriptor`], [`TypeDescriptor`] and the
//!   [`Descriptor`] variant the codec dispatches on
//! - [`ScalarKind`] / [`TypeRef`]: how text content maps to values
//! - [`Restriction`] and the facet-based [`Facets`] implementation
//!
//! ```
//! use helios_xsd::{ElementDescriptor, QName, TypeRef};
//!
//! let order = ElementDescriptor::new(QName::new("urn:shop", "order"))
//!     .qualified()
//!     .element(ElementDescriptor::new(QName::local("id")).simple(TypeRef::xsd("int")))
//!     .element(ElementDescriptor::new(QName::local("item")).many());
//! assert!(order.find_element("item").unwrap().is_many);
//! ```

pub mod descriptor;
pub mod error;
pub mod qname;
pub mod restriction;
pub mod types;

pub use descriptor::{AttributeDescriptor, Descriptor, ElementDescriptor, Form, TypeDescriptor};
pub use error::{RestrictionError, Result, XsdError};
pub use qname::QName;
pub use restriction::{Facets, Restriction, WhiteSpace};
pub use types::{Converter, ScalarKind, TypeRef, XSD_NAMESPACE};
