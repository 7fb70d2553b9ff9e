//! Element, attribute and type descriptors.
//!
//! Descriptors are built once by the schema layer and shared read-only by
//! every serialize/deserialize call. Children are held in `Arc`s so that the
//! codec can hand out cheap clones while walking a document, and so that an
//! xsi:type substitution can produce an extended copy of one element without
//! touching the shared tree.

use std::collections::HashMap;
use std::sync::Arc;

use crate::qname::QName;
use crate::restriction::Restriction;
use crate::types::{ScalarKind, TypeRef};

/// Whether a name is namespace-qualified on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Form {
    Qualified,
    #[default]
    Unqualified,
}

/// Describes one attribute.
#[derive(Debug, Clone, Default)]
pub struct AttributeDescriptor {
    pub qname: QName,
    pub form: Form,
    pub type_ref: Option<TypeRef>,
}

impl AttributeDescriptor {
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            form: Form::Unqualified,
            type_ref: None,
        }
    }

    pub fn qualified(mut self) -> Self {
        self.form = Form::Qualified;
        self
    }

    pub fn typed(mut self, type_ref: TypeRef) -> Self {
        self.type_ref = Some(type_ref);
        self
    }
}

/// Describes a complex or simple type: its content model and restriction.
#[derive(Debug, Clone, Default)]
pub struct TypeDescriptor {
    pub name: Option<QName>,
    pub elements: Vec<Arc<ElementDescriptor>>,
    pub attributes: Vec<Arc<AttributeDescriptor>>,
    pub restriction: Option<Arc<dyn Restriction>>,
}

impl TypeDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: QName) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    pub fn element(mut self, element: ElementDescriptor) -> Self {
        self.elements.push(Arc::new(element));
        self
    }

    pub fn attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(Arc::new(attribute));
        self
    }

    pub fn restriction(mut self, restriction: impl Restriction + 'static) -> Self {
        self.restriction = Some(Arc::new(restriction));
        self
    }
}

/// Describes one element.
#[derive(Debug, Clone, Default)]
pub struct ElementDescriptor {
    pub qname: QName,
    pub type_ref: Option<TypeRef>,
    pub form: Form,
    /// The element may repeat.
    pub is_many: bool,
    pub is_nillable: bool,
    /// Scalar content rather than child elements.
    pub is_simple: bool,
    pub elements: Vec<Arc<ElementDescriptor>>,
    pub attributes: Vec<Arc<AttributeDescriptor>>,
    /// Subtype name -> extension contributed by an xsi:type substitution.
    pub inheritance: HashMap<String, Arc<TypeDescriptor>>,
    /// The type this element was declared with.
    pub type_descriptor: Option<Arc<TypeDescriptor>>,
}

impl ElementDescriptor {
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            ..Self::default()
        }
    }

    /// Descriptor for data no schema describes: unqualified, complex, and
    /// repeatable when the value is a collection.
    pub fn ad_hoc(name: &str, is_many: bool) -> Self {
        Self {
            qname: QName::local(name),
            is_many,
            ..Self::default()
        }
    }

    pub fn qualified(mut self) -> Self {
        self.form = Form::Qualified;
        self
    }

    pub fn many(mut self) -> Self {
        self.is_many = true;
        self
    }

    pub fn nillable(mut self) -> Self {
        self.is_nillable = true;
        self
    }

    /// Marks the element as scalar content of the given type.
    pub fn simple(mut self, type_ref: TypeRef) -> Self {
        self.is_simple = true;
        self.type_ref = Some(type_ref);
        self
    }

    pub fn element(mut self, element: ElementDescriptor) -> Self {
        self.elements.push(Arc::new(element));
        self
    }

    pub fn attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(Arc::new(attribute));
        self
    }

    pub fn extension(mut self, type_name: impl Into<String>, extension: TypeDescriptor) -> Self {
        self.inheritance.insert(type_name.into(), Arc::new(extension));
        self
    }

    /// Attaches the declaring type; its restriction applies to this element.
    pub fn with_type(mut self, type_descriptor: TypeDescriptor) -> Self {
        self.type_descriptor = Some(Arc::new(type_descriptor));
        self
    }

    pub fn find_element(&self, name: &str) -> Option<&Arc<ElementDescriptor>> {
        self.elements.iter().find(|e| e.qname.name == name)
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Arc<AttributeDescriptor>> {
        self.attributes.iter().find(|a| a.qname.name == name)
    }

    pub fn scalar_kind(&self) -> Option<&ScalarKind> {
        self.type_ref.as_ref().map(|t| &t.kind)
    }

    pub fn restriction(&self) -> Option<&Arc<dyn Restriction>> {
        self.type_descriptor
            .as_ref()
            .and_then(|t| t.restriction.as_ref())
    }

    /// Returns a copy extended with the children contributed by `type_name`,
    /// or `None` when the inheritance table has no such subtype.
    ///
    /// Children already declared by this element are not duplicated.
    pub fn substituted(&self, type_name: &str) -> Option<ElementDescriptor> {
        let extension = self.inheritance.get(type_name)?;
        let mut extended = self.clone();
        for element in &extension.elements {
            if extended.find_element(&element.qname.name).is_none() {
                extended.elements.push(Arc::clone(element));
            }
        }
        for attribute in &extension.attributes {
            if extended.find_attribute(&attribute.qname.name).is_none() {
                extended.attributes.push(Arc::clone(attribute));
            }
        }
        Some(extended)
    }
}

/// Any descriptor the codec can be driven by.
#[derive(Debug, Clone)]
pub enum Descriptor {
    Element(Arc<ElementDescriptor>),
    Attribute(Arc<AttributeDescriptor>),
    Type(Arc<TypeDescriptor>),
}

impl Descriptor {
    /// Declared child elements (empty for attributes).
    pub fn elements(&self) -> &[Arc<ElementDescriptor>] {
        match self {
            Descriptor::Element(e) => &e.elements,
            Descriptor::Type(t) => &t.elements,
            Descriptor::Attribute(_) => &[],
        }
    }

    /// Declared attributes (empty for attributes).
    pub fn attributes(&self) -> &[Arc<AttributeDescriptor>] {
        match self {
            Descriptor::Element(e) => &e.attributes,
            Descriptor::Type(t) => &t.attributes,
            Descriptor::Attribute(_) => &[],
        }
    }

    pub fn find_child(&self, name: &str) -> Option<Arc<ElementDescriptor>> {
        self.elements()
            .iter()
            .find(|e| e.qname.name == name)
            .cloned()
    }

    pub fn find_attribute(&self, name: &str) -> Option<Arc<AttributeDescriptor>> {
        self.attributes()
            .iter()
            .find(|a| a.qname.name == name)
            .cloned()
    }

    pub fn as_element(&self) -> Option<&Arc<ElementDescriptor>> {
        match self {
            Descriptor::Element(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ElementDescriptor> for Descriptor {
    fn from(element: ElementDescriptor) -> Self {
        Descriptor::Element(Arc::new(element))
    }
}

impl From<AttributeDescriptor> for Descriptor {
    fn from(attribute: AttributeDescriptor) -> Self {
        Descriptor::Attribute(Arc::new(attribute))
    }
}

impl From<TypeDescriptor> for Descriptor {
    fn from(type_descriptor: TypeDescriptor) -> Self {
        Descriptor::Type(Arc::new(type_descriptor))
    }
}

impl From<Arc<ElementDescriptor>> for Descriptor {
    fn from(element: Arc<ElementDescriptor>) -> Self {
        Descriptor::Element(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restriction::Facets;

    fn animal() -> ElementDescriptor {
        ElementDescriptor::new(QName::new("urn:zoo", "animal"))
            .qualified()
            .element(ElementDescriptor::new(QName::local("name")).simple(TypeRef::xsd("string")))
            .extension(
                "Dog",
                TypeDescriptor::named(QName::new("urn:zoo", "Dog"))
                    .element(
                        ElementDescriptor::new(QName::local("name"))
                            .simple(TypeRef::xsd("string")),
                    )
                    .element(
                        ElementDescriptor::new(QName::local("barks"))
                            .simple(TypeRef::xsd("boolean")),
                    )
                    .attribute(AttributeDescriptor::new(QName::local("breed"))),
            )
    }

    #[test]
    fn test_substituted_appends_extension_children_once() {
        let dog = animal().substituted("Dog").unwrap();
        let names: Vec<_> = dog.elements.iter().map(|e| e.qname.name.as_str()).collect();
        assert_eq!(names, ["name", "barks"]);
        assert!(dog.find_attribute("breed").is_some());
        assert!(animal().substituted("Cat").is_none());
    }

    #[test]
    fn test_substitution_leaves_original_untouched() {
        let original = animal();
        let _ = original.substituted("Dog");
        assert_eq!(original.elements.len(), 1);
    }

    #[test]
    fn test_descriptor_lookup() {
        let d = Descriptor::from(animal());
        assert!(d.find_child("name").is_some());
        assert!(d.find_child("barks").is_none());
        let attr = Descriptor::from(AttributeDescriptor::new(QName::local("a")));
        assert!(attr.elements().is_empty());
    }

    #[test]
    fn test_restriction_comes_from_type() {
        let e = ElementDescriptor::new(QName::local("code"))
            .simple(TypeRef::xsd("string"))
            .with_type(TypeDescriptor::new().restriction(Facets::new().max_length(2)));
        assert!(e.restriction().is_some());
        assert!(ElementDescriptor::ad_hoc("x", false).restriction().is_none());
    }
}
