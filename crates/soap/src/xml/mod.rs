//! Descriptor-driven XML serialization and deserialization.
//!
//! This module converts between `serde_json::Value` trees and namespace-correct
//! XML. Schema-derived [`Descriptor`](helios_xsd::Descriptor)s decide element
//! names, namespaces, scalar types and repetition; data no descriptor covers is
//! still carried through with best-effort defaults.
//!
//! ## Architecture
//!
//! - **Serialization**: [`XmlHandler::serialize`] walks the value tree alongside
//!   the descriptor and drives a [`TreeBuilder`](tree::TreeBuilder). The bundled
//!   [`XmlTreeBuilder`](tree::XmlTreeBuilder) collects an element tree that is
//!   rendered through quick-xml.
//!
//! - **Deserialization**: [`XmlHandler::deserialize`] consumes open/close/text/
//!   cdata tokens from a [`TokenSource`](tokens::TokenSource) and rebuilds the
//!   value tree with a stack of element frames. Sources exist for complete
//!   strings, buffered readers and (with the `async` feature) Tokio streams.
//!
//! Every call owns its namespace scope, frame stack and multiref registry. The
//! handler itself only holds immutable [`HandlerOptions`], so one handler can
//! serve concurrent calls.
//!
//! ## Value Tree ↔ XML Mapping
//!
//! | Value | XML |
//! |-------|-----|
//! | `{"name": "Rex"}` | `<name>Rex</name>` |
//! | `{"tag": ["a", "b"]}` | `<tag>a</tag><tag>b</tag>` |
//! | `{"price": {"$attributes": {"currency": "EUR"}, "$value": 9.5}}` | `<price currency="EUR">9.5</price>` |
//! | `{"note": "<![CDATA[a < b]]>"}` | `<note><![CDATA[a < b]]></note>` |
//! | `{"any": {"$xml": "<b>bold</b>"}}` | `<any><b>bold</b></any>` |
//! | `{"gone": null}` (nillable) | `<gone xsi:nil="true"/>` |
//! | `{"$attributes": {"$xsiType": {"type": "Dog", "xmlns": "urn:zoo"}}}` | `xsi:type="ns1:Dog"` |
//!
//! Parsing reverses the mapping: repeated names become arrays, attributes are
//! collected under the attributes key, `xsi:nil` yields `null`, SOAP-encoded
//! `href`/`id` pairs are resolved and SOAP envelopes are unwrapped.
//!
//! ## Examples
//!
//! ```
//! use helios_soap::xml::XmlHandler;
//! use helios_xsd::{Descriptor, ElementDescriptor, QName, TypeRef};
//! use serde_json::json;
//!
//! let descriptor = Descriptor::from(
//!     ElementDescriptor::new(QName::new("urn:shop", "order").with_prefix("s"))
//!         .qualified()
//!         .element(ElementDescriptor::new(QName::local("qty")).simple(TypeRef::xsd("int"))),
//! );
//! let handler = XmlHandler::new();
//!
//! let xml = handler
//!     .to_document(&descriptor, &json!({"qty": 2}), None)
//!     .unwrap()
//!     .to_xml_string()
//!     .unwrap();
//! assert_eq!(xml, r#"<s:order xmlns:s="urn:shop"><qty>2</qty></s:order>"#);
//!
//! let value = handler.deserialize_str(&xml, Some(&descriptor)).unwrap();
//! assert_eq!(value, json!({"order": {"qty": 2}}));
//! ```

pub mod coerce;
pub mod de;
pub mod fault;
pub mod namespace;
pub mod ser;
pub mod tokens;
pub mod tree;
mod utils;

pub use utils::{XSI_NAMESPACE, XSI_PREFIX};

// Re-export serialization functions
pub use ser::{to_xml_string, to_xml_vec, to_xml_writer};

// Re-export deserialization functions
pub use de::{from_xml_reader, from_xml_slice, from_xml_str};

use crate::config::HandlerOptions;
use crate::error::{Result, SoapError};

/// Entry point for serialization and deserialization.
///
/// Holds only the static configuration; all per-call state lives in the call.
#[derive(Debug, Clone, Default)]
pub struct XmlHandler {
    pub(crate) options: HandlerOptions,
}

impl XmlHandler {
    /// Handler with default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: HandlerOptions) -> Self {
        Self { options }
    }

    /// As [`with_options`](Self::with_options), rejecting configurations that
    /// fail [`HandlerOptions::validate`].
    pub fn try_with_options(options: HandlerOptions) -> Result<Self> {
        options.validate().map_err(SoapError::Config)?;
        Ok(Self { options })
    }

    /// Handler configured from `SOAP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::try_with_options(HandlerOptions::from_env())
    }

    pub fn options(&self) -> &HandlerOptions {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_with_options_rejects_colliding_keys() {
        let options = HandlerOptions {
            raw_xml_key: "$value".to_string(),
            ..HandlerOptions::default()
        };
        let err = XmlHandler::try_with_options(options).unwrap_err();
        assert!(matches!(err, SoapError::Config(ref problems) if problems.len() == 1));
    }

    #[test]
    fn test_default_options() {
        let handler = XmlHandler::new();
        assert_eq!(handler.options().value_key, "$value");
        assert!(!handler.options().ignore_unknown_properties);
    }
}
