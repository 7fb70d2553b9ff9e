//! Text <-> typed value conversion.
//!
//! Instants are normalized to ISO-8601 UTC with millisecond precision
//! (`2024-05-01T10:00:00.000Z`). Text without a zone designator is read in the
//! local time zone; callers that need stable results should send explicit
//! offsets.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use helios_xsd::ScalarKind;
use serde_json::{Number, Value};

use crate::xml::utils;

/// Converts element or attribute text to a value of the declared kind.
///
/// Without a declared kind the text is returned unchanged.
pub fn coerce(text: &str, kind: Option<&ScalarKind>) -> Value {
    let Some(kind) = kind else {
        return Value::String(text.to_string());
    };
    match kind {
        ScalarKind::String | ScalarKind::Time => Value::String(text.to_string()),
        ScalarKind::Boolean => Value::Bool(text == "true" || text == "1"),
        ScalarKind::Integer => {
            let trimmed = text.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                Value::from(n)
            } else if let Ok(n) = trimmed.parse::<u64>() {
                Value::from(n)
            } else {
                Value::String(text.to_string())
            }
        }
        ScalarKind::Double => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(text.to_string())),
        ScalarKind::Date => {
            if text.len() == 10 {
                return Value::String(text.to_string());
            }
            parse_date_with_zone(text)
                .or_else(|| parse_instant(text))
                .map(|dt| Value::String(iso_instant(&dt)))
                .unwrap_or_else(|| Value::String(text.to_string()))
        }
        ScalarKind::DateTime => parse_instant(text)
            .map(|dt| Value::String(iso_instant(&dt)))
            .unwrap_or_else(|| Value::String(text.to_string())),
        ScalarKind::Custom(convert) => convert(text),
    }
}

/// Formats a value for output according to its declared kind.
///
/// `time` and `dateTime` values that read as instants are rendered in ISO-8601;
/// everything else is returned as-is for [`render_text`] to stringify.
pub fn format(value: &Value, kind: Option<&ScalarKind>) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    match kind {
        Some(ScalarKind::DateTime) => parse_instant(text)
            .map(|dt| Value::String(iso_instant(&dt)))
            .unwrap_or_else(|| value.clone()),
        Some(ScalarKind::Time) => parse_instant(text)
            .map(|dt| Value::String(dt.format("%H:%M:%S%.3fZ").to_string()))
            .unwrap_or_else(|| value.clone()),
        _ => value.clone(),
    }
}

/// Renders a scalar value as XML text. `null` renders as nothing; structured
/// values render as compact JSON.
pub fn render_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(utils::bool_to_string(*b).to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
    }
}

/// Parses an ISO-8601 instant, assuming the local zone when none is given.
pub fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
        .ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Formats an instant the way `xs:dateTime` output expects.
pub fn iso_instant(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `2024-05-01Z` / `2024-05-01+02:00`: midnight in the given zone.
fn parse_date_with_zone(text: &str) -> Option<DateTime<Utc>> {
    let date = text.get(..10)?;
    let zone = text.get(10..)?;
    if zone.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    DateTime::parse_from_rfc3339(&format!("{}T00:00:00{}", date, zone))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_without_kind_passes_through() {
        assert_eq!(coerce("42", None), json!("42"));
    }

    #[test]
    fn test_coerce_boolean() {
        let kind = Some(&ScalarKind::Boolean);
        assert_eq!(coerce("true", kind), json!(true));
        assert_eq!(coerce("1", kind), json!(true));
        assert_eq!(coerce("false", kind), json!(false));
        assert_eq!(coerce("yes", kind), json!(false));
    }

    #[test]
    fn test_coerce_numbers() {
        assert_eq!(coerce("42", Some(&ScalarKind::Integer)), json!(42));
        assert_eq!(coerce("abc", Some(&ScalarKind::Integer)), json!("abc"));
        assert_eq!(coerce("1.5", Some(&ScalarKind::Double)), json!(1.5));
        assert_eq!(coerce("NaN", Some(&ScalarKind::Double)), json!("NaN"));
    }

    #[test]
    fn test_coerce_date() {
        let kind = Some(&ScalarKind::Date);
        assert_eq!(coerce("2024-05-01", kind), json!("2024-05-01"));
        assert_eq!(
            coerce("2024-05-01+02:00", kind),
            json!("2024-04-30T22:00:00.000Z")
        );
        assert_eq!(coerce("2024-05-01Z", kind), json!("2024-05-01T00:00:00.000Z"));
    }

    #[test]
    fn test_coerce_date_time() {
        let kind = Some(&ScalarKind::DateTime);
        assert_eq!(
            coerce("2024-05-01T12:30:00+01:00", kind),
            json!("2024-05-01T11:30:00.000Z")
        );
        assert_eq!(coerce("not a date", kind), json!("not a date"));
    }

    #[test]
    fn test_coerce_custom() {
        let kind = ScalarKind::custom(|text| json!(text.to_uppercase()));
        assert_eq!(coerce("abc", Some(&kind)), json!("ABC"));
    }

    #[test]
    fn test_format_instants() {
        let v = json!("2024-05-01T12:30:00.250Z");
        assert_eq!(
            format(&v, Some(&ScalarKind::DateTime)),
            json!("2024-05-01T12:30:00.250Z")
        );
        assert_eq!(format(&v, Some(&ScalarKind::Time)), json!("12:30:00.250Z"));
        assert_eq!(format(&json!("2024-05-01"), Some(&ScalarKind::Date)), json!("2024-05-01"));
        assert_eq!(format(&json!("12:00:00"), Some(&ScalarKind::Time)), json!("12:00:00"));
        assert_eq!(format(&json!(7), Some(&ScalarKind::DateTime)), json!(7));
    }

    #[test]
    fn test_render_text() {
        assert_eq!(render_text(&json!(true)).as_deref(), Some("true"));
        assert_eq!(render_text(&json!(1.5)).as_deref(), Some("1.5"));
        assert_eq!(render_text(&Value::Null), None);
    }
}
