//! Simple-type restrictions.
//!
//! The codec only calls [`Restriction::enforce`]; what a restriction checks is
//! up to the schema layer. [`Facets`] covers the common XML Schema facets.

use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::error::{RestrictionError, Result, XsdError};

/// A restriction rule attached to a simple type.
///
/// `enforce` may rewrite the value (for example whitespace normalization) and
/// returns the value to serialize.
pub trait Restriction: fmt::Debug + Send + Sync {
    fn enforce(&self, value: &Value) -> std::result::Result<Value, RestrictionError>;
}

/// Whitespace normalization applied before the other facets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WhiteSpace {
    #[default]
    Preserve,
    /// Tabs, line feeds and carriage returns become spaces.
    Replace,
    /// As `Replace`, then runs of spaces collapse and the ends are trimmed.
    Collapse,
}

impl WhiteSpace {
    fn apply(self, text: &str) -> String {
        match self {
            WhiteSpace::Preserve => text.to_string(),
            WhiteSpace::Replace => text.replace(['\t', '\n', '\r'], " "),
            WhiteSpace::Collapse => text.split_whitespace().collect::<Vec<_>>().join(" "),
        }
    }
}

/// Facet-based restriction.
#[derive(Debug, Clone, Default)]
pub struct Facets {
    pub enumeration: Vec<String>,
    pub length: Option<usize>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
    pub min_inclusive: Option<f64>,
    pub max_inclusive: Option<f64>,
    pub white_space: WhiteSpace,
}

impl Facets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enumeration<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enumeration = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Adds a `pattern` facet. XML Schema patterns match the whole value, so
    /// the expression is anchored.
    pub fn pattern(mut self, pattern: &str) -> Result<Self> {
        let anchored = format!("^(?:{})$", pattern);
        let regex = Regex::new(&anchored).map_err(|source| XsdError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        self.pattern = Some(regex);
        Ok(self)
    }

    pub fn min_inclusive(mut self, min: f64) -> Self {
        self.min_inclusive = Some(min);
        self
    }

    pub fn max_inclusive(mut self, max: f64) -> Self {
        self.max_inclusive = Some(max);
        self
    }

    pub fn white_space(mut self, white_space: WhiteSpace) -> Self {
        self.white_space = white_space;
        self
    }
}

impl Restriction for Facets {
    fn enforce(&self, value: &Value) -> std::result::Result<Value, RestrictionError> {
        let (text, normalized) = match value {
            Value::Null => return Ok(Value::Null),
            Value::String(s) => {
                let normalized = self.white_space.apply(s);
                (normalized.clone(), Value::String(normalized))
            }
            Value::Number(n) => (n.to_string(), value.clone()),
            Value::Bool(b) => (b.to_string(), value.clone()),
            // Structured values are not simple content; leave them alone.
            Value::Array(_) | Value::Object(_) => return Ok(value.clone()),
        };

        let mut violations = Vec::new();
        let chars = text.chars().count();

        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|e| *e == text) {
            violations.push(format!("not one of [{}]", self.enumeration.join(", ")));
        }
        if let Some(length) = self.length {
            if chars != length {
                violations.push(format!("length {} is not {}", chars, length));
            }
        }
        if let Some(min) = self.min_length {
            if chars < min {
                violations.push(format!("length {} is below minLength {}", chars, min));
            }
        }
        if let Some(max) = self.max_length {
            if chars > max {
                violations.push(format!("length {} exceeds maxLength {}", chars, max));
            }
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&text) {
                violations.push(format!("does not match pattern {}", pattern.as_str()));
            }
        }
        if self.min_inclusive.is_some() || self.max_inclusive.is_some() {
            match text.trim().parse::<f64>() {
                Ok(number) => {
                    if let Some(min) = self.min_inclusive {
                        if number < min {
                            violations.push(format!("{} is below minInclusive {}", number, min));
                        }
                    }
                    if let Some(max) = self.max_inclusive {
                        if number > max {
                            violations.push(format!("{} exceeds maxInclusive {}", number, max));
                        }
                    }
                }
                Err(_) => violations.push("is not numeric".to_string()),
            }
        }

        if violations.is_empty() {
            Ok(normalized)
        } else {
            Err(RestrictionError {
                value: text,
                violations,
            })
        }
    }
}
