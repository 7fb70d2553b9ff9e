//! Descriptor-driven serialization of value trees.
//!
//! [`XmlHandler::serialize`] walks a value tree alongside a [`Descriptor`] and
//! drives a [`TreeBuilder`]. Each element value is first classified into one of
//! a handful of content shapes (scalar text, CDATA literal, raw XML, nil or
//! container) and then emitted; containers recurse through their declared
//! children in declaration order.
//!
//! ## Structural keys
//!
//! | Key (default) | Meaning |
//! |---------------|---------|
//! | `$attributes` | Attribute map applied to the element |
//! | `$value` | Element text when attributes are also present |
//! | `$xml` | Pre-rendered XML injected verbatim |
//! | `$xsiType` | Inside the attribute map: emit `xsi:type` and substitute the descriptor |

use std::io::Write;
use std::sync::Arc;

use helios_xsd::{AttributeDescriptor, Descriptor, ElementDescriptor, Form};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::config::HandlerOptions;
use crate::error::{Result, SoapError};
use crate::xml::XmlHandler;
use crate::xml::coerce;
use crate::xml::namespace::{Declaration, NamespaceScope};
use crate::xml::tree::{DocumentOptions, TreeBuilder, XmlDocument, XmlTreeBuilder};
use crate::xml::utils::{self, XSI_NAMESPACE, XSI_PREFIX};

impl XmlHandler {
    /// Serializes `value` as described by `descriptor` into `builder`.
    ///
    /// `scope` carries namespace bindings already visible at the insertion
    /// point (for instance those of an envelope the output is nested in). A
    /// fresh scope is used when none is given.
    pub fn serialize<B: TreeBuilder + ?Sized>(
        &self,
        builder: &mut B,
        scope: Option<&mut NamespaceScope>,
        descriptor: &Descriptor,
        value: &Value,
    ) -> Result<()> {
        let mut own_scope = NamespaceScope::new();
        let scope = match scope {
            Some(scope) => scope,
            None => &mut own_scope,
        };
        let mut ctx = SerializeContext {
            options: &self.options,
            builder,
            scope,
            depth: 0,
        };
        ctx.serialize(descriptor, value)
    }

    /// Serializes into a standalone document, with an XML declaration when
    /// `declaration` is given.
    pub fn to_document(
        &self,
        descriptor: &Descriptor,
        value: &Value,
        declaration: Option<DocumentOptions>,
    ) -> Result<XmlDocument> {
        let mut builder = XmlTreeBuilder::new();
        self.serialize(&mut builder, None, descriptor, value)?;
        match declaration {
            Some(options) => builder.into_document(options),
            None => builder.finish(),
        }
    }
}

/// Serializes a value tree to an XML string with default options.
///
/// # Examples
///
/// ```
/// use helios_soap::xml::to_xml_string;
/// use helios_xsd::{Descriptor, ElementDescriptor, QName};
/// use serde_json::json;
///
/// let descriptor = Descriptor::from(ElementDescriptor::new(QName::local("greeting")));
/// let xml = to_xml_string(&descriptor, &json!({"text": "hello"})).unwrap();
/// assert_eq!(xml, "<greeting><text>hello</text></greeting>");
/// ```
pub fn to_xml_string(descriptor: &Descriptor, value: &Value) -> Result<String> {
    XmlHandler::new()
        .to_document(descriptor, value, None)?
        .to_xml_string()
}

/// Serializes a value tree to UTF-8 bytes with default options.
pub fn to_xml_vec(descriptor: &Descriptor, value: &Value) -> Result<Vec<u8>> {
    XmlHandler::new().to_document(descriptor, value, None)?.to_xml_vec()
}

/// Serializes a value tree to a writer with default options.
pub fn to_xml_writer<W: Write>(descriptor: &Descriptor, value: &Value, writer: W) -> Result<()> {
    XmlHandler::new()
        .to_document(descriptor, value, None)?
        .write_to(writer)
}

/// Per-call serializer state.
struct SerializeContext<'a, B: ?Sized> {
    options: &'a HandlerOptions,
    builder: &'a mut B,
    scope: &'a mut NamespaceScope,
    depth: usize,
}

/// What an element value turns into.
enum Content<'v> {
    /// `null`: `xsi:nil` when nillable, otherwise an empty element.
    Nilled,
    /// Object holding nothing but its attribute map.
    Empty,
    /// `<![CDATA[...]]>` text, emitted as a CDATA section.
    CdataLiteral(&'v str),
    /// Object carrying the raw-XML key.
    RawXml(&'v Value),
    /// Text content.
    Scalar(Value),
    /// Object mapped onto child elements.
    Container(&'v Value),
}

impl<B: TreeBuilder + ?Sized> SerializeContext<'_, B> {
    fn serialize(&mut self, descriptor: &Descriptor, value: &Value) -> Result<()> {
        match descriptor {
            Descriptor::Attribute(attribute) => self.serialize_attribute(attribute, value),
            Descriptor::Element(element) => self.serialize_element(element, value),
            Descriptor::Type(_) => self.map_object(descriptor, value),
        }
    }

    fn serialize_attribute(&mut self, attribute: &AttributeDescriptor, value: &Value) -> Result<()> {
        let kind = attribute.type_ref.as_ref().map(|t| &t.kind);
        let Some(text) = coerce::render_text(&coerce::format(value, kind)) else {
            return Ok(());
        };
        let qname = &attribute.qname;
        let name = match (attribute.form, qname.namespace()) {
            (Form::Qualified, Some(uri)) => {
                let declaration = self.declare(qname.prefix.as_deref(), uri)?;
                declaration.qualify(&qname.name)
            }
            _ => qname.name.clone(),
        };
        self.builder.attribute(&name, &text)
    }

    fn serialize_element(&mut self, element: &Arc<ElementDescriptor>, value: &Value) -> Result<()> {
        // Repeated elements; a collection is expanded into siblings even when
        // the descriptor does not declare it repeatable.
        if let Value::Array(items) = value {
            if !element.is_many {
                trace!(element = %element.qname.name, "expanding array under single-valued element");
            }
            for item in items {
                self.serialize_element(element, item)?;
            }
            return Ok(());
        }

        if self.depth >= self.options.max_depth {
            return Err(SoapError::DepthExceeded {
                max: self.options.max_depth,
            });
        }

        // Scope and depth are restored on every exit so a caller-supplied
        // scope stays balanced after an error.
        self.depth += 1;
        self.scope.push_scope();
        let result = self.write_element(element, value);
        self.scope.pop_scope();
        self.depth -= 1;
        result
    }

    fn write_element(&mut self, element: &Arc<ElementDescriptor>, value: &Value) -> Result<()> {
        let (attributes, working) = self.split_value(value);

        let qname = &element.qname;
        let mut xmlns: Option<Declaration> = None;
        let name = match (element.form, qname.namespace()) {
            (Form::Qualified, Some(uri)) => {
                let declaration = self.scope.declare(qname.prefix.as_deref(), uri);
                let name = declaration.qualify(&qname.name);
                if declaration.fresh {
                    xmlns = Some(declaration);
                }
                name
            }
            _ => qname.name.clone(),
        };

        let content = self.classify(element, working)?;

        self.builder.start_element(&name)?;
        if let Some(declaration) = xmlns {
            self.builder
                .attribute(&declaration.xmlns_attribute(), &declaration.uri)?;
        }

        match content {
            Content::Nilled => {
                if element.is_nillable {
                    let xsi = self.declare(Some(XSI_PREFIX), XSI_NAMESPACE)?;
                    self.builder.attribute(&xsi.qualify("nil"), "true")?;
                }
                self.attach_attributes(&Descriptor::Element(Arc::clone(element)), attributes)?;
            }
            Content::Empty => {
                self.attach_attributes(&Descriptor::Element(Arc::clone(element)), attributes)?;
            }
            Content::CdataLiteral(text) => {
                self.builder.cdata(text)?;
                self.attach_attributes(&Descriptor::Element(Arc::clone(element)), attributes)?;
            }
            Content::RawXml(raw) => {
                if let Some(xml) = coerce::render_text(&coerce::format(raw, element.scalar_kind())) {
                    self.builder.raw(&xml)?;
                }
                self.attach_attributes(&Descriptor::Element(Arc::clone(element)), attributes)?;
            }
            Content::Scalar(formatted) => {
                if let Some(text) = coerce::render_text(&formatted).filter(|t| !t.is_empty()) {
                    self.builder.text(&text)?;
                }
                self.attach_attributes(&Descriptor::Element(Arc::clone(element)), attributes)?;
            }
            Content::Container(object) => {
                // The object still holds its attribute map; `map_object`
                // applies it after the children.
                self.map_object(&Descriptor::Element(Arc::clone(element)), object)?;
            }
        }

        self.builder.end_element()
    }

    /// Separates the attribute map from the element value. An object with a
    /// value key contributes that entry as the element's content.
    fn split_value<'v>(&self, value: &'v Value) -> (Option<&'v Map<String, Value>>, &'v Value) {
        let Value::Object(map) = value else {
            return (None, value);
        };
        let attributes = map.get(&self.options.attributes_key).and_then(Value::as_object);
        let working = map.get(&self.options.value_key).unwrap_or(value);
        (attributes, working)
    }

    fn classify<'v>(&self, element: &ElementDescriptor, value: &'v Value) -> Result<Content<'v>> {
        if value.is_null() {
            return Ok(Content::Nilled);
        }
        if let Some(text) = value.as_str().and_then(utils::cdata_literal) {
            return Ok(Content::CdataLiteral(text));
        }
        if let Some(raw) = value.get(&self.options.raw_xml_key) {
            return Ok(Content::RawXml(raw));
        }
        if let Value::Object(map) = value {
            if map.keys().all(|key| *key == self.options.attributes_key) {
                return Ok(Content::Empty);
            }
        }
        if element.is_simple || !value.is_object() {
            let value = self.restrict(element, value)?;
            return Ok(Content::Scalar(coerce::format(&value, element.scalar_kind())));
        }
        Ok(Content::Container(value))
    }

    fn restrict(&self, element: &ElementDescriptor, value: &Value) -> Result<Value> {
        match element.restriction() {
            Some(restriction) if self.options.enforce_restrictions => restriction
                .enforce(value)
                .map_err(|source| SoapError::Restriction {
                    element: element.qname.name.clone(),
                    source,
                }),
            _ => Ok(value.clone()),
        }
    }

    /// Maps an object's properties onto the descriptor's declared children.
    fn map_object(&mut self, descriptor: &Descriptor, value: &Value) -> Result<()> {
        let Value::Object(map) = value else {
            if let Some(text) = coerce::render_text(value) {
                self.builder.text(&text)?;
            }
            return Ok(());
        };

        let attributes = map.get(&self.options.attributes_key).and_then(Value::as_object);
        let substituted = attributes.and_then(|a| self.substitute(descriptor, a));
        let descriptor = substituted.as_ref().unwrap_or(descriptor);

        for (key, child_value) in self.ordered_properties(descriptor, map) {
            if *key == self.options.value_key {
                if let Some(text) = coerce::render_text(child_value) {
                    self.builder.text(&text)?;
                }
                continue;
            }
            let child = if let Some(element) = descriptor.find_child(key) {
                Descriptor::Element(element)
            } else if let Some(attribute) = descriptor.find_attribute(key) {
                Descriptor::Attribute(attribute)
            } else if self.options.ignore_unknown_properties {
                trace!(property = %key, "skipping undeclared property");
                continue;
            } else {
                Descriptor::from(ElementDescriptor::ad_hoc(key, child_value.is_array()))
            };
            self.serialize(&child, child_value)?;
        }

        self.attach_attributes(descriptor, attributes)
    }

    /// Declared elements first in declaration order, then everything else in
    /// insertion order. The attribute map is never a property.
    fn ordered_properties<'m>(
        &self,
        descriptor: &Descriptor,
        map: &'m Map<String, Value>,
    ) -> Vec<(&'m String, &'m Value)> {
        let mut ordered: Vec<(&String, &Value)> = descriptor
            .elements()
            .iter()
            .filter_map(|e| map.get_key_value(e.qname.name.as_str()))
            .collect();
        for (key, value) in map {
            if *key == self.options.attributes_key || descriptor.find_child(key).is_some() {
                continue;
            }
            ordered.push((key, value));
        }
        ordered
    }

    /// Resolves the descriptor named by an `xsi:type` marker, when the
    /// element's inheritance table knows it.
    fn substitute(&self, descriptor: &Descriptor, attributes: &Map<String, Value>) -> Option<Descriptor> {
        let element = descriptor.as_element()?;
        let (type_name, _) = xsi_type(attributes.get(&self.options.xsi_type_key)?)?;
        let local = utils::split_qname(type_name).1;
        let substituted = element
            .substituted(type_name)
            .or_else(|| element.substituted(local));
        if substituted.is_none() {
            debug!(
                element = %element.qname.name,
                xsi_type = %type_name,
                "xsi:type not found in inheritance table, keeping declared descriptor"
            );
        }
        substituted.map(Descriptor::from)
    }

    /// Emits an attribute map on the current element.
    fn attach_attributes(
        &mut self,
        descriptor: &Descriptor,
        attributes: Option<&Map<String, Value>>,
    ) -> Result<()> {
        let Some(attributes) = attributes else {
            return Ok(());
        };
        for (name, value) in attributes {
            if *name == self.options.xsi_type_key {
                self.emit_xsi_type(value)?;
            } else if let Some(attribute) = descriptor.find_attribute(name) {
                self.serialize_attribute(&attribute, value)?;
            } else if let Some(text) = coerce::render_text(value) {
                self.builder.attribute(name, &text)?;
            }
        }
        Ok(())
    }

    fn emit_xsi_type(&mut self, marker: &Value) -> Result<()> {
        let Some((type_name, xmlns)) = xsi_type(marker) else {
            debug!(marker = %marker, "ignoring malformed xsi:type marker");
            return Ok(());
        };
        let xsi = self.declare(Some(XSI_PREFIX), XSI_NAMESPACE)?;
        let text = match xmlns {
            Some(uri) => {
                let (prefix, local) = utils::split_qname(type_name);
                self.declare(prefix, uri)?.qualify(local)
            }
            None => type_name.to_string(),
        };
        self.builder.attribute(&xsi.qualify("type"), &text)
    }

    /// Declares `uri` and writes its `xmlns` attribute when newly bound.
    fn declare(&mut self, prefix: Option<&str>, uri: &str) -> Result<Declaration> {
        let declaration = self.scope.declare(prefix, uri);
        if declaration.fresh {
            self.builder
                .attribute(&declaration.xmlns_attribute(), &declaration.uri)?;
        }
        Ok(declaration)
    }
}

/// Reads an xsi:type marker: a bare type name or `{type, xmlns}`.
fn xsi_type(marker: &Value) -> Option<(&str, Option<&str>)> {
    match marker {
        Value::String(name) => Some((name.as_str(), None)),
        Value::Object(map) => {
            let name = map.get("type")?.as_str()?;
            let xmlns = map.get("xmlns").and_then(Value::as_str).filter(|u| !u.is_empty());
            Some((name, xmlns))
        }
        _ => None,
    }
}
