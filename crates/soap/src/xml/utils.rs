//! Utility functions and constants for XML serialization/deserialization.
//!
//! This module provides helpers for recognizing structural markers in value
//! trees and for splitting qualified names read from the wire.

/// XML Schema instance namespace URI (`xsi:nil`, `xsi:type`).
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Conventional prefix for [`XSI_NAMESPACE`].
pub const XSI_PREFIX: &str = "xsi";

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Returns the inner text when `text` is a complete CDATA literal such as
/// `<![CDATA[raw]]>`.
pub fn cdata_literal(text: &str) -> Option<&str> {
    text.strip_prefix(CDATA_OPEN)?.strip_suffix(CDATA_CLOSE)
}

/// Checks if text starts with an XML declaration.
pub fn is_xml_document(text: &str) -> bool {
    text.starts_with("<?xml")
}

/// Splits `prefix:local` into its parts. Unprefixed names yield `None`.
pub fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Returns the prefix declared by an `xmlns` / `xmlns:p` attribute name.
///
/// The default namespace declaration yields the empty prefix.
pub fn namespace_declaration(attribute: &str) -> Option<&str> {
    if attribute == "xmlns" {
        Some("")
    } else {
        attribute.strip_prefix("xmlns:")
    }
}

/// Strips the `#` fragment marker from an `href` value.
pub fn href_target(href: &str) -> &str {
    href.strip_prefix('#').unwrap_or(href)
}

/// Converts a Rust boolean to its string representation for XML.
pub fn bool_to_string(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cdata_literal() {
        assert_eq!(cdata_literal("<![CDATA[raw]]>"), Some("raw"));
        assert_eq!(cdata_literal("<![CDATA[]]>"), Some(""));
        assert_eq!(cdata_literal("<![CDATA[raw"), None);
        assert_eq!(cdata_literal("raw"), None);
    }

    #[test]
    fn test_is_xml_document() {
        assert!(is_xml_document("<?xml version=\"1.0\"?><a/>"));
        assert!(!is_xml_document("<a/>"));
    }

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("soap:Body"), (Some("soap"), "Body"));
        assert_eq!(split_qname("Body"), (None, "Body"));
    }

    #[test]
    fn test_namespace_declaration() {
        assert_eq!(namespace_declaration("xmlns"), Some(""));
        assert_eq!(namespace_declaration("xmlns:soap"), Some("soap"));
        assert_eq!(namespace_declaration("xmlnsfoo"), None);
        assert_eq!(namespace_declaration("id"), None);
    }

    #[test]
    fn test_href_target() {
        assert_eq!(href_target("#id1"), "id1");
        assert_eq!(href_target("id1"), "id1");
    }

    #[test]
    fn test_bool_to_string() {
        assert_eq!(bool_to_string(true), "true");
        assert_eq!(bool_to_string(false), "false");
    }
}
