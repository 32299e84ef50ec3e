//! Sources built from parsed value trees.
//!
//! Flattens nested objects and arrays into the dotted and indexed property
//! names the rest of the pipeline understands: `{"a": {"b": [1, 2]}}` becomes
//! `a.b[0]=1, a.b[1]=2`. Parsing a particular file format stays with the
//! collaborator; YAML is bridged through `serde_json::Value` so both formats
//! flatten identically.

use super::MapSource;
use crate::error::{ConfigError, ConfigResult};
use serde_json::Value;

/// Build a source from a parsed JSON-shaped value tree.
pub fn json_source(name: impl Into<String>, value: &Value) -> MapSource {
    let mut source = MapSource::new(name);
    for (key, entry) in flatten(value) {
        source.insert_entry(key, entry);
    }
    source
}

/// Build a source from a YAML document.
pub fn yaml_source(name: impl Into<String>, document: &str) -> ConfigResult<MapSource> {
    let name = name.into();
    let value: Value = serde_yaml::from_str(document).map_err(|err| ConfigError::Source {
        source_name: name.clone(),
        operation: "parse",
        reason: err.to_string(),
    })?;
    Ok(json_source(name, &value))
}

/// Flatten a value tree into property entries.
///
/// Scalars at the root produce no entries; nulls flatten to present-but-unset
/// entries, matching the "known but unset" source contract.
pub fn flatten(value: &Value) -> Vec<(String, Option<String>)> {
    let mut out = Vec::new();
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                walk(key, child, &mut out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(&format!("[{index}]"), child, &mut out);
            }
        }
        _ => {}
    }
    out
}

fn walk(prefix: &str, value: &Value, out: &mut Vec<(String, Option<String>)>) {
    match value {
        Value::Null => out.push((prefix.to_string(), None)),
        Value::Bool(b) => out.push((prefix.to_string(), Some(b.to_string()))),
        Value::Number(n) => out.push((prefix.to_string(), Some(n.to_string()))),
        Value::String(s) => out.push((prefix.to_string(), Some(s.clone()))),
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                walk(&format!("{prefix}[{index}]"), child, out);
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                walk(&format!("{prefix}.{key}"), child, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ConfigSource;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_objects() {
        let value = json!({
            "server": { "host": "localhost", "port": 8080 },
            "debug": true
        });

        let entries = flatten(&value);
        assert!(entries.contains(&("server.host".into(), Some("localhost".into()))));
        assert!(entries.contains(&("server.port".into(), Some("8080".into()))));
        assert!(entries.contains(&("debug".into(), Some("true".into()))));
    }

    #[test]
    fn test_flatten_arrays_to_indexed_keys() {
        let value = json!({ "hosts": ["a", "b"], "matrix": [[1, 2]] });

        let entries = flatten(&value);
        assert!(entries.contains(&("hosts[0]".into(), Some("a".into()))));
        assert!(entries.contains(&("hosts[1]".into(), Some("b".into()))));
        assert!(entries.contains(&("matrix[0][0]".into(), Some("1".into()))));
        assert!(entries.contains(&("matrix[0][1]".into(), Some("2".into()))));
    }

    #[test]
    fn test_null_flattens_to_unset_entry() {
        let value = json!({ "feature": null });
        let entries = flatten(&value);
        assert_eq!(entries, vec![("feature".into(), None)]);
    }

    #[test]
    fn test_yaml_source_round_trip() {
        let source = yaml_source(
            "app-yaml",
            "server:\n  host: localhost\n  ports:\n    - 80\n    - 443\n",
        )
        .unwrap();

        assert_eq!(
            source.lookup("server.host").unwrap(),
            Some(Some("localhost".into()))
        );
        assert_eq!(
            source.lookup("server.ports[1]").unwrap(),
            Some(Some("443".into()))
        );
    }

    #[test]
    fn test_invalid_yaml_is_a_source_error() {
        let err = yaml_source("bad", ": : :").unwrap_err();
        assert!(matches!(err, ConfigError::Source { operation: "parse", .. }));
    }
}
