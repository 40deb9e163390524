use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A plain record: scalars, nested records (to-one) and nested record arrays (to-many)
pub type Record = Map<String, Value>;

/// Ordered top-level records handed to the resolvers
pub type RecordGraph = Vec<Record>;

/// Messages per field for one failing record
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Aligned 1:1 with a `RecordGraph`; `None` marks a record without errors
pub type PerIndexErrors = Vec<Option<FieldErrors>>;

/// Emptiness the way request payloads mean it: null, false, 0, "", "0", [] and {}
/// all count as "nothing given".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

/// Canonical string form of an identity or correlation value, so that `1` and
/// `"1"` address the same resource.
pub fn value_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Append a message to a field's error list
pub fn add_field_error(errors: &mut FieldErrors, field: impl Into<String>, message: impl Into<String>) {
    errors.entry(field.into()).or_default().push(message.into());
}
