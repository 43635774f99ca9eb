//! YAML parsing helpers
//!
//! Everything is parsed into `serde_json::Value` first so typed decoding,
//! merging and diffing all work on one representation.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::{Error, Result};

/// Parse a YAML string into a serde_json::Value.
///
/// For multi-document YAML, returns only the first document.
/// Returns `Value::Null` for empty input.
pub fn parse_yaml(input: &str) -> Result<Value> {
    Ok(parse_yaml_multi(input)?.into_iter().next().unwrap_or(Value::Null))
}

/// Parse a multi-document YAML string into one Value per document.
///
/// Empty documents (e.g. a trailing `---`) are dropped.
pub fn parse_yaml_multi(input: &str) -> Result<Vec<Value>> {
    let mut docs = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(input) {
        let value = Value::deserialize(doc).map_err(|e| Error::serialization(e.to_string()))?;
        if !value.is_null() {
            docs.push(value);
        }
    }
    Ok(docs)
}

/// Decode a YAML document straight into a typed value
pub fn from_yaml<T: DeserializeOwned>(kind: &str, input: &str) -> Result<T> {
    serde_yaml::from_str(input).map_err(|e| Error::serialization_for(kind, e.to_string()))
}

/// Decode an already parsed document into a typed value
pub fn from_value<T: DeserializeOwned>(kind: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::serialization_for(kind, e.to_string()))
}

/// Render a value as YAML
pub fn to_yaml<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| Error::serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_documents() {
        let v = parse_yaml("spec:\n  hub: docker.io/istio\n  tag: 1.8.0\n").unwrap();
        assert_eq!(v, json!({"spec": {"hub": "docker.io/istio", "tag": "1.8.0"}}));
    }

    #[test]
    fn empty_input_is_null() {
        assert_eq!(parse_yaml("").unwrap(), Value::Null);
    }

    #[test]
    fn multi_document_split_on_separator() {
        let docs = parse_yaml_multi("a: 1\n---\nb: 2\n---\n").unwrap();
        assert_eq!(docs, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn malformed_yaml_is_a_serialization_error() {
        let err = parse_yaml("a: [1, 2").unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }

    #[test]
    fn typed_decode_reports_kind() {
        #[derive(Debug, serde::Deserialize)]
        struct Wanted {
            #[allow(dead_code)]
            port: u16,
        }
        let err = from_yaml::<Wanted>("ProxyConfig", "port: nope").unwrap_err();
        match err {
            Error::Serialization { kind, .. } => assert_eq!(kind.as_deref(), Some("ProxyConfig")),
            other => panic!("unexpected error: {other}"),
        }
    }
}
