//! Declared input fields and raw-payload helpers.

use autosuite_core::types::JsonMap;
use serde::Serialize;
use serde_json::Value;

/// One field of a flow's input schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InputField {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

impl InputField {
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: false,
            description,
        }
    }
}

/// Keep only the keys declared in `fields`; unknown keys are dropped.
pub fn filter_declared(raw: &JsonMap, fields: &[InputField]) -> JsonMap {
    fields
        .iter()
        .filter_map(|field| raw.get(field.name).map(|v| (field.name.to_string(), v.clone())))
        .collect()
}

/// Render a value the way a person would type it: strings bare, lists
/// comma-joined, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items.iter().map(display_value).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Human-readable one-line summary of an item payload, `k=v, k=v`.
///
/// `meta` is excluded; keys follow map order.
pub fn pretty_input_text(raw: &JsonMap) -> String {
    raw.iter()
        .filter(|(key, _)| key.as_str() != "meta")
        .map(|(key, value)| format!("{key}={}", display_value(value)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Lowercased, trimmed string field; missing or non-string values are empty.
pub(crate) fn normalized_str(raw: &JsonMap, key: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_lowercase())
        .unwrap_or_default()
}

/// The `meta` object of a payload, if any.
pub(crate) fn meta(raw: &JsonMap) -> Option<&JsonMap> {
    raw.get("meta").and_then(Value::as_object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> JsonMap {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn filter_drops_undeclared_keys() {
        let fields = [
            InputField::required("url", "Target URL"),
            InputField::optional("meta", "Raw input"),
        ];
        let raw = map(json!({ "url": "https://a.test", "junk": 1 }));
        let filtered = filter_declared(&raw, &fields);
        assert_eq!(filtered.len(), 1);
        assert!(filtered.contains_key("url"));
    }

    #[test]
    fn pretty_text_skips_meta_and_joins_lists() {
        let raw = map(json!({
            "first_name": "Ann",
            "product_names": ["Backpack", "Onesie"],
            "meta": { "idx": 0 }
        }));
        assert_eq!(
            pretty_input_text(&raw),
            "first_name=Ann, product_names=Backpack, Onesie"
        );
    }
}
