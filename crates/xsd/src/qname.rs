//! Namespace-qualified names.

use std::fmt;

use crate::error::{Result, XsdError};

/// An immutable `(namespace URI, local name, prefix)` triple.
///
/// The prefix is only a hint: serialization may pick another one when the
/// namespace is already bound in scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QName {
    pub namespace: Option<String>,
    pub name: String,
    pub prefix: Option<String>,
}

impl QName {
    /// Creates a name in the given namespace.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
            prefix: None,
        }
    }

    /// Creates a name without a namespace.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Parses `local`, `prefix:local` or Clark notation `{uri}local`.
    ///
    /// A prefix is recorded as written; resolving it to a URI is the caller's
    /// job since that depends on the namespace scope in effect.
    ///
    /// # Examples
    ///
    /// ```
    /// use helios_xsd::QName;
    ///
    /// let q = QName::parse("{urn:example}Order").unwrap();
    /// assert_eq!(q.namespace.as_deref(), Some("urn:example"));
    /// assert_eq!(q.name, "Order");
    ///
    /// let q = QName::parse("tns:Order").unwrap();
    /// assert_eq!(q.prefix.as_deref(), Some("tns"));
    /// ```
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if let Some(rest) = text.strip_prefix('{') {
            let (namespace, name) = rest
                .split_once('}')
                .ok_or_else(|| XsdError::InvalidQName(text.to_string()))?;
            if name.is_empty() || name.contains(':') {
                return Err(XsdError::InvalidQName(text.to_string()));
            }
            return Ok(Self {
                namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
                name: name.to_string(),
                prefix: None,
            });
        }

        match text.split_once(':') {
            Some((prefix, name)) => {
                if prefix.is_empty() || name.is_empty() || name.contains(':') {
                    return Err(XsdError::InvalidQName(text.to_string()));
                }
                Ok(Self {
                    namespace: None,
                    name: name.to_string(),
                    prefix: Some(prefix.to_string()),
                })
            }
            None if text.is_empty() => Err(XsdError::InvalidQName(text.to_string())),
            None => Ok(Self::local(text)),
        }
    }

    /// Returns `prefix:name`, or the bare name when no prefix is set.
    pub fn prefixed(&self) -> String {
        match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, self.name),
            _ => self.name.clone(),
        }
    }

    /// Namespace URI, treating an empty string as no namespace.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.prefix, self.namespace()) {
            (Some(prefix), _) if !prefix.is_empty() => write!(f, "{}:{}", prefix, self.name),
            (_, Some(ns)) => write!(f, "{{{}}}{}", ns, self.name),
            _ => f.write_str(&self.name),
        }
    }
}

impl std::str::FromStr for QName {
    type Err = XsdError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        assert_eq!(QName::parse("Order").unwrap(), QName::local("Order"));
        assert_eq!(
            QName::parse("tns:Order").unwrap(),
            QName::local("Order").with_prefix("tns")
        );
        assert_eq!(
            QName::parse("{urn:a}Order").unwrap(),
            QName::new("urn:a", "Order")
        );
        assert_eq!(QName::parse("{}Order").unwrap(), QName::local("Order"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(QName::parse("").is_err());
        assert!(QName::parse("{urn:a").is_err());
        assert!(QName::parse(":Order").is_err());
        assert!(QName::parse("a:b:c").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(QName::new("urn:a", "x").to_string(), "{urn:a}x");
        assert_eq!(QName::new("urn:a", "x").with_prefix("p").to_string(), "p:x");
        assert_eq!(QName::local("x").to_string(), "x");
    }

    #[test]
    fn test_display_parse_roundtrip() {
        let q = QName::new("http://example.com/ns", "Item");
        assert_eq!(QName::parse(&q.to_string()).unwrap(), q);
    }
}
