//! Bridges between typed Rust values and value trees.
//!
//! Any `Serialize` type can be turned into a value tree with
//! [`to_value_tree`] and sent through the codec; parsed trees come back as
//! typed values through [`from_value_tree`]. Scalars are only typed on the
//! way in when the descriptor declares their kind, so typed targets usually
//! need a descriptor for [`from_xml_str`].
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use helios_xsd::Descriptor;

use crate::error::Result;
use crate::xml::XmlHandler;

/// Converts a typed value into a value tree.
///
/// # Examples
///
/// ```
/// use helios_soap::json::to_value_tree;
/// use serde::Serialize;
/// use serde_json::json;
///
/// #[derive(Serialize)]
/// struct Ping {
///     seq: u32,
/// }
///
/// assert_eq!(to_value_tree(&Ping { seq: 1 }).unwrap(), json!({"seq": 1}));
/// ```
pub fn to_value_tree<T>(value: &T) -> Result<Value>
where
    T: Serialize + ?Sized,
{
    Ok(serde_json::to_value(value)?)
}

/// Converts a value tree into a typed value.
pub fn from_value_tree<T>(value: Value) -> Result<T>
where
    T: DeserializeOwned,
{
    Ok(serde_json::from_value(value)?)
}

/// Serializes a typed value to XML under `descriptor`.
pub fn to_xml_string<T>(handler: &XmlHandler, descriptor: &Descriptor, value: &T) -> Result<String>
where
    T: Serialize + ?Sized,
{
    let tree = to_value_tree(value)?;
    handler.to_document(descriptor, &tree, None)?.to_xml_string()
}

/// Deserializes XML into a typed value.
///
/// # Examples
///
/// ```
/// use helios_soap::XmlHandler;
/// use helios_soap::json::from_xml_str;
/// use helios_xsd::{Descriptor, ElementDescriptor, QName, TypeRef};
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Reply {
///     pong: Pong,
/// }
///
/// #[derive(Deserialize)]
/// struct Pong {
///     seq: u32,
/// }
///
/// let descriptor = Descriptor::from(
///     ElementDescriptor::new(QName::local("pong"))
///         .element(ElementDescriptor::new(QName::local("seq")).simple(TypeRef::xsd("int"))),
/// );
/// let reply: Reply = from_xml_str(&XmlHandler::new(), "<pong><seq>7</seq></pong>", Some(&descriptor)).unwrap();
/// assert_eq!(reply.pong.seq, 7);
/// ```
pub fn from_xml_str<T>(handler: &XmlHandler, xml: &str, root: Option<&Descriptor>) -> Result<T>
where
    T: DeserializeOwned,
{
    from_value_tree(handler.deserialize_str(xml, root)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_xsd::{ElementDescriptor, QName, TypeRef};
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Order {
        id: i64,
        paid: bool,
        items: Vec<String>,
    }

    fn order_descriptor() -> Descriptor {
        Descriptor::from(
            ElementDescriptor::new(QName::local("order"))
                .element(ElementDescriptor::new(QName::local("id")).simple(TypeRef::xsd("long")))
                .element(ElementDescriptor::new(QName::local("paid")).simple(TypeRef::xsd("boolean")))
                .element(
                    ElementDescriptor::new(QName::local("items"))
                        .many()
                        .simple(TypeRef::xsd("string")),
                ),
        )
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Document {
        order: Order,
    }

    #[test]
    fn test_typed_round_trip() {
        let handler = XmlHandler::new();
        let descriptor = order_descriptor();
        let order = Order {
            id: 42,
            paid: true,
            items: vec!["tea".to_string(), "cake".to_string()],
        };

        let xml = to_xml_string(&handler, &descriptor, &order).unwrap();
        assert_eq!(
            xml,
            "<order><id>42</id><paid>true</paid><items>tea</items><items>cake</items></order>"
        );

        let parsed: Document = from_xml_str(&handler, &xml, Some(&descriptor)).unwrap();
        assert_eq!(parsed.order, order);
    }

    #[test]
    fn test_from_value_tree_type_mismatch() {
        let result: Result<Order> = from_value_tree(serde_json::json!({"id": "x"}));
        assert!(matches!(result, Err(crate::SoapError::Json(_))));
    }
}
