//! Codec configuration.
//!
//! The options are static for the lifetime of an [`XmlHandler`](crate::XmlHandler)
//! and shared by every call it serves.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SOAP_VALUE_KEY` | `$value` | Key holding element text next to attributes |
//! | `SOAP_RAW_XML_KEY` | `$xml` | Key holding pre-rendered XML to inject verbatim |
//! | `SOAP_ATTRIBUTES_KEY` | `$attributes` | Key holding an element's attribute map |
//! | `SOAP_XSI_TYPE_KEY` | `$xsiType` | Attribute-map key for xsi:type substitution |
//! | `SOAP_ENFORCE_RESTRICTIONS` | false | Apply simple-type restrictions when serializing |
//! | `SOAP_IGNORE_UNKNOWN_PROPERTIES` | false | Drop undeclared properties instead of emitting them |
//! | `SOAP_MAX_DEPTH` | 256 | Maximum element nesting in either direction |

use clap::Parser;

/// Options recognized by the serializer and deserializer.
#[derive(Debug, Clone, Parser)]
#[command(name = "soap-codec")]
#[command(about = "SOAP/XSD codec options")]
pub struct HandlerOptions {
    /// Key holding element text alongside attributes.
    #[arg(long, env = "SOAP_VALUE_KEY", default_value = "$value")]
    pub value_key: String,

    /// Key holding pre-rendered XML injected without escaping.
    #[arg(long, env = "SOAP_RAW_XML_KEY", default_value = "$xml")]
    pub raw_xml_key: String,

    /// Key holding an element's attribute map.
    #[arg(long, env = "SOAP_ATTRIBUTES_KEY", default_value = "$attributes")]
    pub attributes_key: String,

    /// Attribute-map key marking an explicit xsi:type substitution.
    #[arg(long, env = "SOAP_XSI_TYPE_KEY", default_value = "$xsiType")]
    pub xsi_type_key: String,

    /// Apply simple-type restrictions before formatting values.
    #[arg(long, env = "SOAP_ENFORCE_RESTRICTIONS", default_value = "false")]
    pub enforce_restrictions: bool,

    /// Drop properties no descriptor declares instead of emitting them unqualified.
    #[arg(long, env = "SOAP_IGNORE_UNKNOWN_PROPERTIES", default_value = "false")]
    pub ignore_unknown_properties: bool,

    /// Maximum element nesting depth.
    #[arg(long, env = "SOAP_MAX_DEPTH", default_value = "256")]
    pub max_depth: usize,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            value_key: "$value".to_string(),
            raw_xml_key: "$xml".to_string(),
            attributes_key: "$attributes".to_string(),
            xsi_type_key: "$xsiType".to_string(),
            enforce_restrictions: false,
            ignore_unknown_properties: false,
            max_depth: 256,
        }
    }
}

impl HandlerOptions {
    /// Reads options from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        Self::try_parse_from(["soap-codec"]).unwrap_or_default()
    }

    /// Validates the configuration and returns every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let keys = [
            ("value key", &self.value_key),
            ("raw XML key", &self.raw_xml_key),
            ("attributes key", &self.attributes_key),
            ("xsi:type key", &self.xsi_type_key),
        ];
        for (label, key) in &keys {
            if key.is_empty() {
                errors.push(format!("{} cannot be empty", label));
            }
        }
        for (i, (label, key)) in keys.iter().enumerate() {
            for (other_label, other) in &keys[i + 1..] {
                if !key.is_empty() && key == other {
                    errors.push(format!(
                        "{} and {} are both {:?}",
                        label, other_label, key
                    ));
                }
            }
        }

        if self.max_depth == 0 {
            errors.push("Max depth cannot be 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = HandlerOptions::default();
        assert_eq!(options.value_key, "$value");
        assert_eq!(options.raw_xml_key, "$xml");
        assert_eq!(options.attributes_key, "$attributes");
        assert_eq!(options.xsi_type_key, "$xsiType");
        assert!(!options.enforce_restrictions);
        assert!(!options.ignore_unknown_properties);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_parse_matches_default() {
        let parsed = HandlerOptions::try_parse_from(["soap-codec"]).unwrap();
        let default = HandlerOptions::default();
        assert_eq!(parsed.value_key, default.value_key);
        assert_eq!(parsed.max_depth, default.max_depth);
    }

    #[test]
    fn test_parse_flags() {
        let parsed = HandlerOptions::try_parse_from([
            "soap-codec",
            "--value-key",
            "_text",
            "--ignore-unknown-properties",
        ])
        .unwrap();
        assert_eq!(parsed.value_key, "_text");
        assert!(parsed.ignore_unknown_properties);
    }

    #[test]
    fn test_validate_colliding_keys() {
        let options = HandlerOptions {
            raw_xml_key: "$value".to_string(),
            ..Default::default()
        };
        let errors = options.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("value key and raw XML key")));
    }

    #[test]
    fn test_validate_empty_key_and_depth() {
        let options = HandlerOptions {
            attributes_key: String::new(),
            max_depth: 0,
            ..Default::default()
        };
        let errors = options.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
