//! SOAP fault interpretation.
//!
//! SOAP 1.1 faults carry `faultcode`/`faultstring`/`faultactor`/`detail`;
//! SOAP 1.2 faults carry `Code`/`Reason`/`Node`/`Role`/`Detail`. The shapes
//! are tried in that order and composed into a single message.

use serde_json::Value;

use crate::envelope::SoapVersion;
use crate::error::SoapFault;

/// Composes a fault message and wraps it with the parsed document.
pub fn build_fault(fault: &Value, root: Value, value_key: &str) -> SoapFault {
    let (message, version) = compose_message(fault, value_key);
    SoapFault {
        message,
        version,
        root,
    }
}

/// Composes the human-readable message for a parsed `Fault` element.
pub fn compose_message(fault: &Value, value_key: &str) -> (String, Option<SoapVersion>) {
    if let Some(code) = field(fault, "faultcode", value_key) {
        let mut message = format!("faultcode: {}", plain_or_dump(code));
        for name in ["faultstring", "faultactor"] {
            if let Some(text) = field(fault, name, value_key).and_then(Value::as_str) {
                message.push_str(&format!(" {}: {}", name, text));
            }
        }
        if let Some(detail) = field(fault, "detail", value_key) {
            message.push_str(&format!(" detail: {}", plain_or_dump(detail)));
        }
        return (message, Some(SoapVersion::V11));
    }

    if let Some(code) = fault.get("Code") {
        let mut parts = vec![format!("Code: {}", dump(code))];
        if let Some(value) = code.get("Value") {
            parts.push(format!("Value: {}", dump(value)));
        }
        if let Some(subcode) = code.get("Subcode") {
            parts.push(format!("Subcode: {}", dump(subcode)));
        }
        for name in ["Reason", "Node", "Role"] {
            if let Some(value) = fault.get(name) {
                parts.push(format!("{}: {}", name, dump(value)));
            }
        }
        if let Some(detail) = fault.get("Detail") {
            parts.push(format!("Detail: {}", plain_or_dump(detail)));
        }
        return (parts.join(" "), Some(SoapVersion::V12));
    }

    (format!("SOAP fault: {}", dump(fault)), None)
}

/// A fault field, unwrapping `{value_key: ...}` when the element carried
/// attributes.
fn field<'a>(fault: &'a Value, name: &str, value_key: &str) -> Option<&'a Value> {
    let value = fault.get(name)?;
    match value.get(value_key) {
        Some(inner) => Some(inner),
        None => Some(value),
    }
}

fn plain_or_dump(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => dump(other),
    }
}

fn dump(value: &Value) -> String {
    value.to_string()
}
