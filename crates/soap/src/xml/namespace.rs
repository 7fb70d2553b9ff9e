//! Scoped prefix-to-URI bindings.
//!
//! One frame is pushed per element. Resolution walks frames from the
//! innermost outwards; a URI that is already visible is never declared again,
//! so a namespace used throughout a document gets a single prefix declared on
//! the outermost element that needed it. Sibling subtrees each carry their own
//! declaration but reuse the prefix first chosen for the URI.

use std::collections::HashMap;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// A prefix bound to a URI within one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceBinding {
    pub prefix: String,
    pub uri: String,
    /// Set when the binding was created by [`NamespaceScope::declare`] and
    /// still needs an `xmlns` attribute in the output.
    pub declared: bool,
}

/// Result of [`NamespaceScope::declare`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub prefix: String,
    pub uri: String,
    /// The binding was created by this call; the caller must emit
    /// `xmlns:{prefix}="{uri}"` on the current element.
    pub fresh: bool,
}

impl Declaration {
    /// The `xmlns:prefix` attribute name for this binding.
    pub fn xmlns_attribute(&self) -> String {
        format!("xmlns:{}", self.prefix)
    }

    /// Qualifies `local` with this binding's prefix.
    pub fn qualify(&self, local: &str) -> String {
        format!("{}:{}", self.prefix, local)
    }
}

/// Stack of namespace frames owned by a single serialize or deserialize call.
#[derive(Debug, Clone, Default)]
pub struct NamespaceScope {
    frames: Vec<Vec<NamespaceBinding>>,
    next_prefix: usize,
    /// URI -> prefix chosen by the first declaration of that URI.
    chosen: HashMap<String, String>,
}

impl NamespaceScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Drops the innermost frame and every binding made in it.
    ///
    /// # Panics
    ///
    /// Panics when no frame is open; pushes and pops must balance around
    /// each element.
    pub fn pop_scope(&mut self) {
        if self.frames.pop().is_none() {
            panic!("pop_scope called on an empty namespace scope stack");
        }
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Records a binding read from the document (an `xmlns` attribute).
    pub fn bind(&mut self, prefix: &str, uri: &str) {
        let frame = self.current_frame();
        frame.retain(|b| b.prefix != prefix);
        frame.push(NamespaceBinding {
            prefix: prefix.to_string(),
            uri: uri.to_string(),
            declared: false,
        });
    }

    /// Resolves a prefix to its URI. The empty prefix is the default namespace.
    pub fn resolve_uri(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .find(|b| b.prefix == prefix)
            .map(|b| b.uri.as_str())
    }

    /// Finds a visible, non-default prefix bound to `uri`.
    ///
    /// A binding shadowed by an inner frame that reuses its prefix is not
    /// visible.
    pub fn resolve_prefix(&self, uri: &str) -> Option<&str> {
        if uri == XML_NAMESPACE {
            return Some("xml");
        }
        self.frames
            .iter()
            .rev()
            .flat_map(|frame| frame.iter())
            .filter(|b| b.uri == uri && !b.prefix.is_empty())
            .find(|b| self.resolve_uri(&b.prefix) == Some(uri))
            .map(|b| b.prefix.as_str())
    }

    /// Returns the visible binding for `uri`, declaring one in the current
    /// frame when there is none.
    ///
    /// `prefix` is honoured when it is free in the current frame; otherwise a
    /// prefix of the form `ns1`, `ns2`, ... is generated.
    pub fn declare(&mut self, prefix: Option<&str>, uri: &str) -> Declaration {
        if let Some(existing) = self.resolve_prefix(uri) {
            return Declaration {
                prefix: existing.to_string(),
                uri: uri.to_string(),
                fresh: false,
            };
        }

        let previous = self
            .chosen
            .get(uri)
            .filter(|p| self.resolve_uri(p).is_none())
            .cloned();
        let requested = prefix
            .filter(|p| !p.is_empty() && *p != "xml" && *p != "xmlns")
            .filter(|p| !self.bound_in_current_frame(p))
            .map(str::to_string);
        let prefix = match previous.or(requested) {
            Some(prefix) => prefix,
            None => self.generate_prefix(),
        };
        self.chosen
            .entry(uri.to_string())
            .or_insert_with(|| prefix.clone());

        self.current_frame().push(NamespaceBinding {
            prefix: prefix.clone(),
            uri: uri.to_string(),
            declared: true,
        });
        Declaration {
            prefix,
            uri: uri.to_string(),
            fresh: true,
        }
    }

    /// Bindings of the innermost frame.
    pub fn current_bindings(&self) -> &[NamespaceBinding] {
        self.frames.last().map(Vec::as_slice).unwrap_or(&[])
    }

    fn bound_in_current_frame(&self, prefix: &str) -> bool {
        self.current_bindings().iter().any(|b| b.prefix == prefix)
    }

    fn generate_prefix(&mut self) -> String {
        loop {
            self.next_prefix += 1;
            let candidate = format!("ns{}", self.next_prefix);
            if self.resolve_uri(&candidate).is_none() {
                return candidate;
            }
        }
    }

    fn current_frame(&mut self) -> &mut Vec<NamespaceBinding> {
        if self.frames.is_empty() {
            self.frames.push(Vec::new());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_once_per_visible_uri() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        let first = scope.declare(Some("tns"), "urn:a");
        assert!(first.fresh);
        assert_eq!(first.prefix, "tns");

        scope.push_scope();
        let second = scope.declare(Some("other"), "urn:a");
        assert!(!second.fresh);
        assert_eq!(second.prefix, "tns");
        scope.pop_scope();
        scope.pop_scope();
    }

    #[test]
    fn test_pop_removes_frame_bindings() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.push_scope();
        scope.declare(Some("a"), "urn:a");
        assert_eq!(scope.resolve_uri("a"), Some("urn:a"));
        scope.pop_scope();
        assert_eq!(scope.resolve_uri("a"), None);
        assert!(scope.declare(Some("a"), "urn:a").fresh);
    }

    #[test]
    fn test_generated_prefixes_skip_visible_ones() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.bind("ns1", "urn:taken");
        let d = scope.declare(None, "urn:b");
        assert_eq!(d.prefix, "ns2");
        assert_eq!(d.qualify("x"), "ns2:x");
        assert_eq!(d.xmlns_attribute(), "xmlns:ns2");
    }

    #[test]
    fn test_requested_prefix_taken_in_current_frame() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.declare(Some("p"), "urn:one");
        let d = scope.declare(Some("p"), "urn:two");
        assert_ne!(d.prefix, "p");
        assert_eq!(scope.resolve_uri(&d.prefix), Some("urn:two"));
    }

    #[test]
    fn test_shadowed_prefix_is_not_visible() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.bind("p", "urn:outer");
        scope.push_scope();
        scope.bind("p", "urn:inner");
        assert_eq!(scope.resolve_prefix("urn:outer"), None);
        assert_eq!(scope.resolve_prefix("urn:inner"), Some("p"));
        assert!(scope.declare(None, "urn:outer").fresh);
    }

    #[test]
    fn test_default_namespace_and_xml_prefix() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.bind("", "urn:default");
        assert_eq!(scope.resolve_uri(""), Some("urn:default"));
        assert_eq!(scope.resolve_prefix("urn:default"), None);
        assert_eq!(scope.resolve_uri("xml"), Some(XML_NAMESPACE));
    }

    #[test]
    fn test_siblings_reuse_chosen_prefix() {
        let mut scope = NamespaceScope::new();
        scope.push_scope();
        scope.push_scope();
        let left = scope.declare(None, "urn:b");
        scope.pop_scope();
        scope.push_scope();
        let right = scope.declare(Some("other"), "urn:b");
        assert!(right.fresh);
        assert_eq!(left.prefix, right.prefix);
    }

    #[test]
    #[should_panic(expected = "empty namespace scope")]
    fn test_pop_empty_panics() {
        NamespaceScope::new().pop_scope();
    }
}
