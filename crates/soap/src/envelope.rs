//! SOAP envelope skeletons.
//!
//! Outbound requests are assembled by rendering an empty envelope, reopening
//! it at `Body` and serializing the payload into it with the envelope's
//! namespace already in scope.

use helios_xsd::{Descriptor, ElementDescriptor, QName, TypeRef};
use serde_json::Value;

use crate::error::Result;
use crate::xml::XmlHandler;
use crate::xml::namespace::NamespaceScope;
use crate::xml::tree::{DocumentOptions, XmlDocument, XmlElement, XmlTreeBuilder};

/// SOAP 1.1 envelope namespace.
pub const SOAP11_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// SOAP 1.2 envelope namespace.
pub const SOAP12_NAMESPACE: &str = "http://www.w3.org/2003/05/soap-envelope";

/// SOAP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoapVersion {
    V11,
    V12,
}

impl SoapVersion {
    pub fn namespace(self) -> &'static str {
        match self {
            SoapVersion::V11 => SOAP11_NAMESPACE,
            SoapVersion::V12 => SOAP12_NAMESPACE,
        }
    }

    /// Conventional envelope prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            SoapVersion::V11 => "soap",
            SoapVersion::V12 => "soap12",
        }
    }

    pub fn from_namespace(uri: &str) -> Option<Self> {
        match uri {
            SOAP11_NAMESPACE => Some(SoapVersion::V11),
            SOAP12_NAMESPACE => Some(SoapVersion::V12),
            _ => None,
        }
    }
}

/// Renderable `Envelope` with empty `Header` and `Body`, and a
/// `Fault`/`detail` pair inside the body when `with_fault` is set.
pub fn envelope_tree(prefix: &str, uri: &str, with_fault: bool) -> XmlElement {
    let qualify = |local: &str| format!("{}:{}", prefix, local);
    let mut body = XmlElement::new(qualify("Body"));
    if with_fault {
        body = body.with_child(XmlElement::new(qualify("Fault")).with_child(XmlElement::new("detail")));
    }
    XmlElement::new(qualify("Envelope"))
        .with_attribute(format!("xmlns:{}", prefix), uri)
        .with_child(XmlElement::new(qualify("Header")))
        .with_child(body)
}

/// Descriptor matching [`envelope_tree`].
///
/// The fault carries the SOAP 1.1 fields; `detail` is open content.
pub fn envelope_descriptor(prefix: &str, uri: &str, with_fault: bool) -> Descriptor {
    let qualified = |local: &str| {
        ElementDescriptor::new(QName::new(uri, local).with_prefix(prefix)).qualified()
    };
    let text = |local: &str| ElementDescriptor::new(QName::local(local)).simple(TypeRef::xsd("string"));

    let mut body = qualified("Body");
    if with_fault {
        body = body.element(
            qualified("Fault")
                .element(text("faultcode"))
                .element(text("faultstring"))
                .element(text("faultactor"))
                .element(ElementDescriptor::new(QName::local("detail"))),
        );
    }
    Descriptor::from(
        qualified("Envelope")
            .element(qualified("Header"))
            .element(body),
    )
}

impl XmlHandler {
    /// Serializes `value` as the body of a fresh envelope.
    ///
    /// # Examples
    ///
    /// ```
    /// use helios_soap::{SoapVersion, XmlHandler};
    /// use helios_xsd::{Descriptor, ElementDescriptor, QName};
    /// use serde_json::json;
    ///
    /// let ping = Descriptor::from(ElementDescriptor::new(QName::local("ping")));
    /// let xml = XmlHandler::new()
    ///     .to_envelope(SoapVersion::V11, &ping, &json!({"seq": 1}))
    ///     .unwrap()
    ///     .to_xml_string()
    ///     .unwrap();
    /// assert!(xml.contains("<soap:Body><ping><seq>1</seq></ping></soap:Body>"));
    /// ```
    pub fn to_envelope(
        &self,
        version: SoapVersion,
        descriptor: &Descriptor,
        value: &Value,
    ) -> Result<XmlDocument> {
        let prefix = version.prefix();
        let envelope = envelope_tree(prefix, version.namespace(), false);
        let body = format!("{}:Body", prefix);
        let mut builder = XmlTreeBuilder::resume(envelope, &[body.as_str()])?;

        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.bind(prefix, version.namespace());
        self.serialize(&mut builder, Some(&mut scope), descriptor, value)?;

        builder.into_document(DocumentOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SoapError;
    use serde_json::json;

    #[test]
    fn test_version_namespaces() {
        assert_eq!(SoapVersion::from_namespace(SOAP11_NAMESPACE), Some(SoapVersion::V11));
        assert_eq!(SoapVersion::from_namespace(SOAP12_NAMESPACE), Some(SoapVersion::V12));
        assert_eq!(SoapVersion::from_namespace("urn:other"), None);
    }

    #[test]
    fn test_envelope_tree() {
        let tree = envelope_tree("s", SOAP11_NAMESPACE, true);
        assert_eq!(tree.name, "s:Envelope");
        assert_eq!(tree.attribute("xmlns:s"), Some(SOAP11_NAMESPACE));
        let body = tree.children_named("s:Body").next().unwrap();
        let fault = body.children_named("s:Fault").next().unwrap();
        assert_eq!(fault.children_named("detail").count(), 1);
    }

    #[test]
    fn test_envelope_descriptor_serializes_like_tree() {
        let descriptor = envelope_descriptor("s", SOAP11_NAMESPACE, false);
        let xml = XmlHandler::new()
            .to_document(&descriptor, &json!({"Header": {}, "Body": {}}), None)
            .unwrap()
            .to_xml_string()
            .unwrap();
        assert_eq!(
            xml,
            format!(
                r#"<s:Envelope xmlns:s="{}"><s:Header/><s:Body/></s:Envelope>"#,
                SOAP11_NAMESPACE
            )
        );
    }

    #[test]
    fn test_fault_descriptor_round_trip() {
        let descriptor = envelope_descriptor("s", SOAP11_NAMESPACE, true);
        let value = json!({
            "Body": {"Fault": {"faultcode": "s:Server", "faultstring": "boom"}}
        });
        let xml = XmlHandler::new()
            .to_document(&descriptor, &value, None)
            .unwrap()
            .to_xml_string()
            .unwrap();
        let err = XmlHandler::new()
            .deserialize_str(&xml, Some(&descriptor))
            .unwrap_err();
        let SoapError::Fault(fault) = err else {
            panic!("expected a fault, got {:?}", err);
        };
        assert_eq!(fault.version, Some(SoapVersion::V11));
        assert_eq!(fault.message, "faultcode: s:Server faultstring: boom");
    }

    #[test]
    fn test_to_envelope_reuses_envelope_namespace() {
        let ping = Descriptor::from(
            ElementDescriptor::new(QName::new(SOAP12_NAMESPACE, "ping")).qualified(),
        );
        let xml = XmlHandler::new()
            .to_envelope(SoapVersion::V12, &ping, &json!({}))
            .unwrap()
            .to_xml_string()
            .unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<soap12:Body><soap12:ping/></soap12:Body>"));
    }
}
