//! In-memory XML element trees and the builder the serializer drives.
//!
//! The serializer may add attributes to an element after its children (the
//! attributes map of a value is applied last), so output is collected into an
//! element tree first and rendered through quick-xml once complete.

use std::io::Write;

use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::error::{Result, SoapError};

/// Sink for serializer output.
///
/// Calls are cursor-based: `start_element` opens a child of the current
/// element and makes it current, `end_element` closes it. Attributes and
/// content apply to the current element.
pub trait TreeBuilder {
    fn start_element(&mut self, name: &str) -> Result<()>;

    /// Sets an attribute on the current element, replacing one of the same name.
    fn attribute(&mut self, name: &str, value: &str) -> Result<()>;

    fn text(&mut self, text: &str) -> Result<()>;

    fn cdata(&mut self, text: &str) -> Result<()>;

    /// Appends pre-rendered XML without escaping.
    fn raw(&mut self, xml: &str) -> Result<()>;

    fn end_element(&mut self) -> Result<()>;
}

/// A node of an element tree.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Raw(String),
}

/// An element with its attributes and children, in document order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn set_attribute(&mut self, name: String, value: String) {
        match self.attributes.iter_mut().find(|(n, _)| *n == name) {
            Some(existing) => existing.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter_map(move |node| match node {
            XmlNode::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Concatenated text and CDATA content of this element.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                XmlNode::Text(t) | XmlNode::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (name, value) in &self.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            match child {
                XmlNode::Element(e) => e.write(writer)?,
                XmlNode::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
                XmlNode::CData(t) => writer.write_event(Event::CData(BytesCData::new(t.as_str())))?,
                XmlNode::Raw(xml) => writer.get_mut().write_all(xml.as_bytes())?,
            }
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))?;
        Ok(())
    }
}

/// XML declaration attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentOptions {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
    /// Indent nested elements by this many spaces.
    pub indent: Option<usize>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            encoding: Some("UTF-8".to_string()),
            standalone: None,
            indent: None,
        }
    }
}

/// A rendered-on-demand document: optional declaration plus top-level nodes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct XmlDocument {
    pub declaration: Option<DocumentOptions>,
    pub nodes: Vec<XmlNode>,
}

impl XmlDocument {
    /// The first top-level element.
    pub fn root(&self) -> Option<&XmlElement> {
        self.nodes.iter().find_map(|node| match node {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn write_to<W: Write>(&self, out: W) -> Result<()> {
        let indent = self.declaration.as_ref().and_then(|d| d.indent);
        let mut writer = match indent {
            Some(width) => Writer::new_with_indent(out, b' ', width),
            None => Writer::new(out),
        };

        if let Some(decl) = &self.declaration {
            let standalone = decl.standalone.map(|s| if s { "yes" } else { "no" });
            writer.write_event(Event::Decl(BytesDecl::new(
                &decl.version,
                decl.encoding.as_deref(),
                standalone,
            )))?;
        }

        for node in &self.nodes {
            match node {
                XmlNode::Element(e) => e.write(&mut writer)?,
                XmlNode::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
                XmlNode::CData(t) => writer.write_event(Event::CData(BytesCData::new(t.as_str())))?,
                XmlNode::Raw(xml) => writer.get_mut().write_all(xml.as_bytes())?,
            }
        }
        Ok(())
    }

    pub fn to_xml_vec(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(buffer)
    }

    pub fn to_xml_string(&self) -> Result<String> {
        String::from_utf8(self.to_xml_vec()?).map_err(|e| SoapError::Builder(e.to_string()))
    }
}

/// [`TreeBuilder`] collecting an [`XmlDocument`].
#[derive(Debug, Default)]
pub struct XmlTreeBuilder {
    nodes: Vec<XmlNode>,
    /// Open elements, each with the index it returns to in its parent
    /// (`None` appends).
    open: Vec<(XmlElement, Option<usize>)>,
}

impl XmlTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reopens `root` and descends along `path`, so further output lands
    /// inside the last element named. Each step picks the last child with
    /// that name.
    ///
    /// ```
    /// use helios_soap::xml::tree::{TreeBuilder, XmlElement, XmlTreeBuilder};
    ///
    /// let envelope = XmlElement::new("soap:Envelope").with_child(XmlElement::new("soap:Body"));
    /// let mut builder = XmlTreeBuilder::resume(envelope, &["soap:Body"]).unwrap();
    /// builder.start_element("ping").unwrap();
    /// builder.end_element().unwrap();
    /// let xml = builder.finish().unwrap().to_xml_string().unwrap();
    /// assert_eq!(xml, "<soap:Envelope><soap:Body><ping/></soap:Body></soap:Envelope>");
    /// ```
    pub fn resume(root: XmlElement, path: &[&str]) -> Result<Self> {
        let mut builder = Self::new();
        builder.open.push((root, None));
        for name in path {
            let parent = builder
                .open
                .last_mut()
                .map(|(e, _)| e)
                .ok_or_else(|| SoapError::Builder("no open element".to_string()))?;
            let index = parent
                .children
                .iter()
                .rposition(|node| matches!(node, XmlNode::Element(e) if e.name == *name))
                .ok_or_else(|| {
                    SoapError::Builder(format!("<{}> has no child <{}>", parent.name, name))
                })?;
            let XmlNode::Element(child) = parent.children.remove(index) else {
                return Err(SoapError::Builder(format!("<{}> is not an element", name)));
            };
            builder.open.push((child, Some(index)));
        }
        Ok(builder)
    }

    /// Closes any open elements and returns the document without a declaration.
    pub fn finish(mut self) -> Result<XmlDocument> {
        while !self.open.is_empty() {
            self.end_element()?;
        }
        Ok(XmlDocument {
            declaration: None,
            nodes: self.nodes,
        })
    }

    /// As [`finish`](Self::finish), with an XML declaration.
    pub fn into_document(self, options: DocumentOptions) -> Result<XmlDocument> {
        let mut document = self.finish()?;
        document.declaration = Some(options);
        Ok(document)
    }

    fn current(&mut self) -> Result<&mut XmlElement> {
        self.open
            .last_mut()
            .map(|(e, _)| e)
            .ok_or_else(|| SoapError::Builder("no open element".to_string()))
    }

    fn push_content(&mut self, node: XmlNode) -> Result<()> {
        self.current()?.children.push(node);
        Ok(())
    }
}

impl TreeBuilder for XmlTreeBuilder {
    fn start_element(&mut self, name: &str) -> Result<()> {
        self.open.push((XmlElement::new(name), None));
        Ok(())
    }

    fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.current()?
            .set_attribute(name.to_string(), value.to_string());
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.push_content(XmlNode::Text(text.to_string()))
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        self.push_content(XmlNode::CData(text.to_string()))
    }

    fn raw(&mut self, xml: &str) -> Result<()> {
        self.push_content(XmlNode::Raw(xml.to_string()))
    }

    fn end_element(&mut self) -> Result<()> {
        let (element, index) = self
            .open
            .pop()
            .ok_or_else(|| SoapError::Builder("end_element without open element".to_string()))?;
        let node = XmlNode::Element(element);
        match self.open.last_mut() {
            Some((parent, _)) => match index {
                Some(i) if i <= parent.children.len() => parent.children.insert(i, node),
                _ => parent.children.push(node),
            },
            None => self.nodes.push(node),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_render() {
        let mut b = XmlTreeBuilder::new();
        b.start_element("a").unwrap();
        b.start_element("b").unwrap();
        b.text("x < y").unwrap();
        b.end_element().unwrap();
        b.attribute("id", "1").unwrap();
        b.end_element().unwrap();
        let xml = b.finish().unwrap().to_xml_string().unwrap();
        assert_eq!(xml, "<a id=\"1\"><b>x &lt; y</b></a>");
    }

    #[test]
    fn test_cdata_and_raw() {
        let mut b = XmlTreeBuilder::new();
        b.start_element("a").unwrap();
        b.cdata("<raw>").unwrap();
        b.raw("<c>&amp;</c>").unwrap();
        b.end_element().unwrap();
        let xml = b.finish().unwrap().to_xml_string().unwrap();
        assert_eq!(xml, "<a><![CDATA[<raw>]]><c>&amp;</c></a>");
    }

    #[test]
    fn test_declaration() {
        let mut b = XmlTreeBuilder::new();
        b.start_element("a").unwrap();
        let doc = b
            .into_document(DocumentOptions {
                standalone: Some(true),
                ..Default::default()
            })
            .unwrap();
        let xml = doc.to_xml_string().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(xml.ends_with("<a/>"));
    }

    #[test]
    fn test_attribute_without_element_fails() {
        let mut b = XmlTreeBuilder::new();
        assert!(matches!(b.attribute("a", "b"), Err(SoapError::Builder(_))));
        assert!(b.end_element().is_err());
    }

    #[test]
    fn test_attribute_replaces_same_name() {
        let e = XmlElement::new("a")
            .with_attribute("x", "1")
            .with_attribute("x", "2");
        assert_eq!(e.attributes, vec![("x".to_string(), "2".to_string())]);
    }

    #[test]
    fn test_resume_keeps_child_position() {
        let root = XmlElement::new("env")
            .with_child(XmlElement::new("head"))
            .with_child(XmlElement::new("body"))
            .with_child(XmlElement::new("tail"));
        let mut b = XmlTreeBuilder::resume(root, &["body"]).unwrap();
        b.text("hi").unwrap();
        let doc = b.finish().unwrap();
        let names: Vec<_> = doc
            .root()
            .unwrap()
            .children
            .iter()
            .filter_map(|n| match n {
                XmlNode::Element(e) => Some(e.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, ["head", "body", "tail"]);
        assert!(XmlTreeBuilder::resume(XmlElement::new("env"), &["missing"]).is_err());
    }
}
