//! Token-driven deserialization into value trees.
//!
//! [`XmlHandler::deserialize`] pulls tokens from a [`TokenSource`] and keeps a
//! stack of open element frames. Closing an element merges its value into the
//! parent under the element's local name, promoting repeated names to arrays.
//!
//! SOAP-encoded multirefs (`<a id="r1">` / `<b href="#r1"/>`) are resolved
//! once the whole document has been read: every element is a node with a
//! link to its parent, so a placeholder can be found again by path after its
//! value has been moved into the tree.
//!
//! A document whose `Envelope.Body` holds a `Fault` is returned as
//! [`SoapError::Fault`]; any other envelope is unwrapped.

use std::collections::HashMap;
use std::io::BufRead;

use helios_xsd::{Descriptor, ElementDescriptor, ScalarKind};
use serde_json::{Map, Value, json};
use tracing::{debug, trace, warn};

use crate::error::{Result, SoapError};
use crate::xml::XmlHandler;
use crate::xml::coerce;
use crate::xml::fault;
use crate::xml::namespace::NamespaceScope;
use crate::xml::tokens::{TokenSource, XmlToken, XmlTokenizer};
use crate::xml::utils::{self, XSI_NAMESPACE};

impl XmlHandler {
    /// Deserializes the document supplied by `tokens`.
    ///
    /// `root` describes the document element (or a type whose children
    /// include it). Elements without a descriptor are read as untyped text
    /// and objects.
    pub fn deserialize<S: TokenSource + ?Sized>(
        &self,
        tokens: &mut S,
        scope: Option<&mut NamespaceScope>,
        root: Option<&Descriptor>,
    ) -> Result<Value> {
        let mut own_scope = NamespaceScope::new();
        let scope = match scope {
            Some(scope) => scope,
            None => &mut own_scope,
        };
        let mut ctx = DeserializeContext::new(self, scope, root);
        loop {
            match tokens.next_token()? {
                XmlToken::End => return ctx.finish(),
                token => ctx.feed(token)?,
            }
        }
    }

    /// Deserializes a complete XML string.
    pub fn deserialize_str(&self, xml: &str, root: Option<&Descriptor>) -> Result<Value> {
        self.deserialize(&mut XmlTokenizer::from_str(xml), None, root)
    }

    /// Deserializes from a buffered reader.
    pub fn deserialize_reader<R: BufRead>(&self, reader: R, root: Option<&Descriptor>) -> Result<Value> {
        self.deserialize(&mut XmlTokenizer::from_reader(reader), None, root)
    }

    /// Deserializes from an asynchronous byte stream.
    ///
    /// The call suspends only while the stream has no input ready. The
    /// returned future completes after the last token has been processed.
    #[cfg(feature = "async")]
    pub async fn deserialize_async<R>(&self, reader: R, root: Option<&Descriptor>) -> Result<Value>
    where
        R: tokio::io::AsyncBufRead + Unpin,
    {
        let mut tokens = crate::xml::tokens::AsyncXmlTokenizer::from_reader(reader);
        let mut scope = NamespaceScope::new();
        let mut ctx = DeserializeContext::new(self, &mut scope, root);
        loop {
            match tokens.next_token().await? {
                XmlToken::End => return ctx.finish(),
                token => ctx.feed(token)?,
            }
        }
    }
}

/// Deserializes an XML string with default options.
///
/// # Examples
///
/// ```
/// use helios_soap::xml::from_xml_str;
/// use serde_json::json;
///
/// let value = from_xml_str("<p><x>1</x><x>2</x></p>", None).unwrap();
/// assert_eq!(value, json!({"p": {"x": ["1", "2"]}}));
/// ```
pub fn from_xml_str(xml: &str, root: Option<&Descriptor>) -> Result<Value> {
    XmlHandler::new().deserialize_str(xml, root)
}

/// Deserializes UTF-8 bytes with default options.
pub fn from_xml_slice(xml: &[u8], root: Option<&Descriptor>) -> Result<Value> {
    XmlHandler::new().deserialize_reader(xml, root)
}

/// Deserializes from a buffered reader with default options.
pub fn from_xml_reader<R: BufRead>(reader: R, root: Option<&Descriptor>) -> Result<Value> {
    XmlHandler::new().deserialize_reader(reader, root)
}

/// One open element.
struct Frame {
    /// Local name.
    name: String,
    /// `None` until content or attributes arrive.
    object: Option<Value>,
    descriptor: Option<Descriptor>,
    /// `id` attribute, when the element is a multiref target.
    id: Option<String>,
    nil: bool,
    node: usize,
    /// Node of the most recent child merged under each key.
    children: HashMap<String, usize>,
}

impl Frame {
    fn element(&self) -> Option<&ElementDescriptor> {
        self.descriptor.as_ref()?.as_element().map(|e| e.as_ref())
    }

    fn scalar_kind(&self) -> Option<&ScalarKind> {
        self.element()?.scalar_kind()
    }
}

/// Progress of one `href` site during multiref resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Site {
    Waiting,
    /// On the resolution path; revisiting it means a reference cycle.
    Active,
    Done,
}

/// Where a node's value was stored in its parent.
#[derive(Debug, Clone)]
struct Link {
    parent: usize,
    key: String,
    index: Option<usize>,
}

/// Per-call deserializer state.
pub(crate) struct DeserializeContext<'a> {
    handler: &'a XmlHandler,
    scope: &'a mut NamespaceScope,
    frames: Vec<Frame>,
    /// Indexed by node; the root node has no link.
    links: Vec<Option<Link>>,
    /// `(node, id)` for every element carrying an `href`.
    pending: Vec<(usize, String)>,
    /// Node of the element carrying each `id`.
    targets: HashMap<String, usize>,
}

impl<'a> DeserializeContext<'a> {
    pub(crate) fn new(
        handler: &'a XmlHandler,
        scope: &'a mut NamespaceScope,
        root: Option<&Descriptor>,
    ) -> Self {
        let root = Frame {
            name: String::new(),
            object: Some(Value::Object(Map::new())),
            descriptor: root.cloned(),
            id: None,
            nil: false,
            node: 0,
            children: HashMap::new(),
        };
        Self {
            handler,
            scope,
            frames: vec![root],
            links: vec![None],
            pending: Vec::new(),
            targets: HashMap::new(),
        }
    }

    pub(crate) fn feed(&mut self, token: XmlToken) -> Result<()> {
        match token {
            XmlToken::Open { name, attributes } => self.open(&name, attributes),
            XmlToken::Close { name } => self.close(&name),
            XmlToken::Text(text) => self.text(&text),
            XmlToken::CData(text) => self.cdata(&text),
            XmlToken::End => Ok(()),
        }
    }

    fn open(&mut self, name: &str, attributes: Vec<(String, String)>) -> Result<()> {
        let max = self.handler.options.max_depth;
        if self.frames.len() > max {
            return Err(SoapError::DepthExceeded { max });
        }

        self.scope.push_scope();
        for (attribute, value) in &attributes {
            if let Some(prefix) = utils::namespace_declaration(attribute) {
                self.scope.bind(prefix, value);
            }
        }

        let local = utils::split_qname(name).1.to_string();
        let mut descriptor = self.child_descriptor(&local);

        let mut nil = false;
        let mut xsi_type = None;
        let mut plain = Vec::new();
        for (attribute, value) in attributes {
            if utils::namespace_declaration(&attribute).is_some() {
                continue;
            }
            let (prefix, attribute_local) = utils::split_qname(&attribute);
            let in_xsi = prefix.and_then(|p| self.scope.resolve_uri(p)) == Some(XSI_NAMESPACE);
            if !in_xsi {
                plain.push((attribute_local.to_string(), value));
                continue;
            }
            match attribute_local {
                "nil" => nil = value == "true",
                "type" => {
                    let (type_prefix, type_local) = utils::split_qname(&value);
                    let xmlns = self.scope.resolve_uri(type_prefix.unwrap_or("")).map(str::to_string);
                    xsi_type = Some((type_local.to_string(), xmlns));
                }
                other => trace!(element = %local, attribute = %other, "dropping xsi attribute"),
            }
        }

        let mut map = Map::new();
        if let Some((type_name, xmlns)) = xsi_type {
            if let Some(element) = descriptor.as_ref().and_then(Descriptor::as_element) {
                match element.substituted(&type_name) {
                    Some(extended) => descriptor = Some(Descriptor::from(extended)),
                    None => debug!(
                        element = %local,
                        xsi_type = %type_name,
                        "xsi:type not found in inheritance table, keeping declared descriptor"
                    ),
                }
            }
            map.insert(
                self.handler.options.xsi_type_key.clone(),
                json!({"type": type_name, "xmlns": xmlns}),
            );
        }

        let mut href = None;
        let mut id = None;
        for (attribute, value) in plain {
            let marker = match attribute.as_str() {
                "href" => {
                    href = Some(utils::href_target(&value).to_string());
                    true
                }
                "id" => {
                    id = Some(value.clone());
                    true
                }
                _ => false,
            };
            // Multiref markers are data only when the schema declares them.
            match descriptor.as_ref().and_then(|d| d.find_attribute(&attribute)) {
                Some(declared) => {
                    let kind = declared.type_ref.as_ref().map(|t| &t.kind);
                    map.insert(attribute, coerce::coerce(&value, kind));
                }
                None if marker => {}
                None => {
                    map.insert(attribute, Value::String(value));
                }
            }
        }

        let object = if map.is_empty() {
            None
        } else {
            let mut seeded = Map::new();
            seeded.insert(self.handler.options.attributes_key.clone(), Value::Object(map));
            Some(Value::Object(seeded))
        };

        let node = self.links.len();
        self.links.push(None);
        if let Some(target) = href {
            self.pending.push((node, target));
        }

        self.frames.push(Frame {
            name: local,
            object,
            descriptor,
            id,
            nil,
            node,
            children: HashMap::new(),
        });
        Ok(())
    }

    /// Descriptor for a child of the current frame. A root element descriptor
    /// matches the document element by name.
    fn child_descriptor(&self, local: &str) -> Option<Descriptor> {
        let parent = self.frames.last()?;
        let descriptor = parent.descriptor.as_ref()?;
        if self.frames.len() == 1 {
            if let Some(element) = descriptor.as_element() {
                if element.qname.name == local {
                    return Some(descriptor.clone());
                }
            }
        }
        descriptor.find_child(local).map(Descriptor::Element)
    }

    fn text(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        let handler = self.handler;
        let frame = self.current_frame()?;
        let value = coerce::coerce(text, frame.scalar_kind());
        merge_text(&mut frame.object, value, &handler.options.value_key);
        Ok(())
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        if !utils::is_xml_document(text) {
            return self.text(text);
        }
        let handler = self.handler;
        let nested = handler.deserialize_str(text, None)?;
        let frame = self.current_frame()?;
        match (frame.object.take(), nested) {
            (None, nested) => frame.object = Some(nested),
            (Some(Value::Object(mut target)), Value::Object(source)) => {
                target.extend(source);
                frame.object = Some(Value::Object(target));
            }
            (object, nested) => {
                frame.object = object;
                merge_text(&mut frame.object, nested, &handler.options.value_key);
            }
        }
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        let local = utils::split_qname(name).1;
        if self.frames.len() < 2 {
            return Err(SoapError::Tokenizer(format!("unexpected closing tag </{}>", name)));
        }
        let Some(frame) = self.frames.pop() else {
            return Err(SoapError::Tokenizer(format!("unexpected closing tag </{}>", name)));
        };
        if frame.name != local {
            return Err(SoapError::Tokenizer(format!(
                "closing tag </{}> does not match <{}>",
                name, frame.name
            )));
        }
        self.scope.pop_scope();

        let is_many = frame.element().is_some_and(|e| e.is_many);
        let is_simple = frame.element().is_some_and(|e| e.is_simple);
        // A nilled element still takes its key so it reads back as null.
        let value = match frame.object {
            _ if frame.nil => Value::Null,
            Some(value) => value,
            None if is_simple => Value::String(String::new()),
            None => Value::Object(Map::new()),
        };
        if let Some(id) = frame.id {
            self.targets.insert(id, frame.node);
        }

        let value_key = self.handler.options.value_key.clone();
        let Some(parent) = self.frames.last_mut() else {
            return Err(SoapError::Tokenizer("element stack underflow".to_string()));
        };
        let map = object_slot(&mut parent.object, &value_key);
        let index = match map.get_mut(&frame.name) {
            None if is_many => {
                map.insert(frame.name.clone(), Value::Array(vec![value]));
                Some(0)
            }
            None => {
                map.insert(frame.name.clone(), value);
                None
            }
            Some(Value::Array(items)) => {
                items.push(value);
                Some(items.len() - 1)
            }
            Some(existing) => {
                let previous = existing.take();
                *existing = Value::Array(vec![previous, value]);
                if let Some(&sibling) = parent.children.get(&frame.name) {
                    if let Some(Some(link)) = self.links.get_mut(sibling) {
                        link.index = Some(0);
                    }
                }
                Some(1)
            }
        };
        parent.children.insert(frame.name.clone(), frame.node);
        self.links[frame.node] = Some(Link {
            parent: parent.node,
            key: frame.name,
            index,
        });
        Ok(())
    }

    /// Resolves multirefs and interprets the envelope.
    pub(crate) fn finish(mut self) -> Result<Value> {
        if let Some(open) = self.frames.get(1) {
            return Err(SoapError::Tokenizer(format!(
                "unexpected end of document inside <{}>",
                open.name
            )));
        }
        let mut root = self
            .frames
            .pop()
            .and_then(|frame| frame.object)
            .unwrap_or_else(|| Value::Object(Map::new()));
        self.resolve_multirefs(&mut root);

        let Value::Object(mut map) = root else {
            return Ok(root);
        };
        let fault = map
            .get("Envelope")
            .and_then(|envelope| envelope.get("Body"))
            .and_then(|body| body.get("Fault"))
            .cloned();
        if let Some(fault) = fault {
            let value_key = &self.handler.options.value_key;
            let fault = fault::build_fault(&fault, Value::Object(map), value_key);
            debug!(message = %fault.message, "SOAP fault received");
            return Err(fault.into());
        }
        match map.remove("Envelope") {
            Some(envelope) => Ok(envelope),
            None => Ok(Value::Object(map)),
        }
    }

    /// Fills every `href` placeholder from the tree. A site whose target
    /// contains other sites is filled after them, so nested references are
    /// copied resolved.
    fn resolve_multirefs(&mut self, root: &mut Value) {
        let pending = std::mem::take(&mut self.pending);
        let mut state = vec![Site::Waiting; pending.len()];
        for site in 0..pending.len() {
            self.resolve_site(site, &pending, &mut state, root);
        }
    }

    fn resolve_site(&self, site: usize, pending: &[(usize, String)], state: &mut [Site], root: &mut Value) {
        if state[site] != Site::Waiting {
            return;
        }
        state[site] = Site::Active;
        let (node, id) = &pending[site];

        let Some(&target) = self.targets.get(id) else {
            warn!(id = %id, "unresolved multiref href");
            state[site] = Site::Done;
            return;
        };
        for (inner, (inner_node, _)) in pending.iter().enumerate() {
            if self.is_within(*inner_node, target) {
                self.resolve_site(inner, pending, state, root);
            }
        }

        let resolved = self.path(target).and_then(|path| locate(root, &path).cloned());
        let placeholder = self.path(*node).and_then(|path| locate(root, &path));
        state[site] = Site::Done;
        match (placeholder, resolved) {
            (Some(Value::Object(fields)), Some(Value::Object(source))) => fields.extend(source),
            (Some(placeholder), Some(resolved)) => *placeholder = resolved,
            _ => {
                warn!(id = %id, "multiref placeholder or target no longer in the tree");
                return;
            }
        }
        debug!(id = %id, node, "resolved multiref");
    }

    /// Whether `node` is `ancestor` or lies beneath it.
    fn is_within(&self, node: usize, ancestor: usize) -> bool {
        let mut current = node;
        loop {
            if current == ancestor {
                return true;
            }
            match self.links.get(current) {
                Some(Some(link)) => current = link.parent,
                _ => return false,
            }
        }
    }

    /// Steps from the root to `node`.
    fn path(&self, node: usize) -> Option<Vec<(&str, Option<usize>)>> {
        let mut steps = Vec::new();
        let mut current = node;
        while current != 0 {
            let link = self.links.get(current)?.as_ref()?;
            steps.push((link.key.as_str(), link.index));
            current = link.parent;
        }
        steps.reverse();
        Some(steps)
    }

    fn current_frame(&mut self) -> Result<&mut Frame> {
        self.frames
            .last_mut()
            .ok_or_else(|| SoapError::Tokenizer("content outside the document".to_string()))
    }
}

fn locate<'v>(root: &'v mut Value, path: &[(&str, Option<usize>)]) -> Option<&'v mut Value> {
    let mut current = root;
    for (key, index) in path {
        current = current.get_mut(*key)?;
        if let Some(index) = index {
            current = current.get_mut(*index)?;
        }
    }
    Some(current)
}

/// Merges element text into a frame's object.
fn merge_text(object: &mut Option<Value>, value: Value, value_key: &str) {
    match object {
        None => *object = Some(value),
        Some(Value::Object(map)) => match map.get_mut(value_key) {
            Some(existing) => *existing = Value::String(concat(existing, &value)),
            None => {
                map.insert(value_key.to_string(), value);
            }
        },
        Some(existing) => *existing = Value::String(concat(existing, &value)),
    }
}

fn concat(existing: &Value, value: &Value) -> String {
    let mut text = coerce::render_text(existing).unwrap_or_default();
    text.push_str(&coerce::render_text(value).unwrap_or_default());
    text
}

/// The frame's object as a map. Text that arrived before a child element
/// moves under the value key.
fn object_slot<'o>(object: &'o mut Option<Value>, value_key: &str) -> &'o mut Map<String, Value> {
    let current = object.take();
    let map = match current {
        Some(Value::Object(map)) => map,
        None => Map::new(),
        Some(scalar) => {
            let mut map = Map::new();
            map.insert(value_key.to_string(), scalar);
            map
        }
    };
    match object.insert(Value::Object(map)) {
        Value::Object(map) => map,
        _ => unreachable!("slot was just filled with an object"),
    }
}
