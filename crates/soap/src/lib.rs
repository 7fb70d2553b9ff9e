//! # Helios SOAP Codec
//!
//! This crate converts in-memory value trees into namespace-correct XML guided
//! by schema-derived descriptors, and parses XML (including SOAP envelopes)
//! back into value trees, turning SOAP faults into structured errors.
//!
//! ## Features
//!
//! - **Descriptor-driven serialization**: element names, namespaces, scalar
//!   formatting, repetition, `xsi:nil` and `xsi:type` substitution follow the
//!   [`helios_xsd`] descriptors; undeclared data is emitted unqualified or
//!   dropped, per configuration.
//! - **Token-driven deserialization**: array promotion, attribute typing,
//!   SOAP-encoded multiref resolution and XML-in-CDATA payloads.
//! - **SOAP faults**: 1.1 and 1.2 fault bodies are returned as
//!   [`SoapError::Fault`] with a composed message and the parsed document.
//! - **Streaming**: with the `async` feature, documents can be read from any
//!   Tokio `AsyncBufRead`.
//!
//! ## Value Tree Conventions
//!
//! | Key (default) | Meaning |
//! |---------------|---------|
//! | `$value` | Element text next to attributes |
//! | `$attributes` | Attribute map |
//! | `$xml` | Raw XML injected verbatim |
//! | `$xsiType` | xsi:type marker inside the attribute map |
//!
//! Key names are configurable through [`HandlerOptions`].
//!
//! ## Examples
//!
//! ```
//! use helios_soap::{SoapError, XmlHandler};
//! use serde_json::json;
//!
//! let handler = XmlHandler::new();
//! let response = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
//!   <soap:Body><getPriceResponse><price>9.5</price></getPriceResponse></soap:Body>
//! </soap:Envelope>"#;
//! let body = handler.deserialize_str(response, None).unwrap();
//! assert_eq!(body, json!({"Body": {"getPriceResponse": {"price": "9.5"}}}));
//!
//! let fault = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
//!   <soap:Body><soap:Fault><faultcode>Server</faultcode><faultstring>boom</faultstring></soap:Fault></soap:Body>
//! </soap:Envelope>"#;
//! match handler.deserialize_str(fault, None) {
//!     Err(SoapError::Fault(fault)) => assert_eq!(fault.message, "faultcode: Server faultstring: boom"),
//!     other => panic!("expected a fault, got {:?}", other),
//! }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod json;
pub mod xml;

// Re-export common types
pub use config::HandlerOptions;
pub use envelope::{SoapVersion, envelope_descriptor, envelope_tree};
pub use error::{Result, SoapError, SoapFault};
pub use xml::XmlHandler;
pub use xml::namespace::NamespaceScope;
pub use xml::tree::{DocumentOptions, TreeBuilder, XmlDocument, XmlElement, XmlTreeBuilder};
