//! Layer merging
//!
//! - Objects: deep-merge by key
//! - Arrays: replace (last wins)
//! - Scalars: override (last wins)

use serde_json::Value;

/// Deep merge two JSON values, `overlay` taking precedence
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Merge layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

/// Convert a parsed TOML document into a JSON value for merging
pub fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_deep_merge() {
        let base = json!({"http": {"timeout_seconds": 30, "upload_timeout_seconds": 300}});
        let overlay = json!({"http": {"timeout_seconds": 10}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["http"]["timeout_seconds"], 10);
        assert_eq!(result["http"]["upload_timeout_seconds"], 300);
    }

    #[test]
    fn test_array_replace() {
        let result = deep_merge(json!({"list": [1, 2, 3]}), json!({"list": [9]}));
        assert_eq!(result["list"], json!([9]));
    }

    #[test]
    fn test_merge_layers_precedence() {
        let builtin = json!({"api": {"base_url": "https://a"}, "logging": {"level": "warn"}});
        let user = json!({"logging": {"level": "info"}});
        let project = json!({"api": {"base_url": "https://b"}});
        let cli = json!({"logging": {"level": "debug"}});

        let result = merge_layers(vec![builtin, user, project, cli]);

        assert_eq!(result["api"]["base_url"], "https://b");
        assert_eq!(result["logging"]["level"], "debug");
    }

    #[test]
    fn test_toml_to_json() {
        let doc: toml::Value = toml::from_str(
            r#"
            [upload]
            chunk_size_bytes = 1024
            [logging]
            format = "json"
            "#,
        )
        .unwrap();
        let value = toml_to_json(doc);
        assert_eq!(value["upload"]["chunk_size_bytes"], 1024);
        assert_eq!(value["logging"]["format"], "json");
    }
}
