use crate::models::Metadata;
use regex::Regex;
use serde_json::Value;
use std::path::Path;
use std::sync::OnceLock;

fn uuid_pattern() -> &'static Regex {
    static UUID_RE: OnceLock<Regex> = OnceLock::new();
    UUID_RE.get_or_init(|| {
        Regex::new(
            r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .expect("uuid pattern is valid")
    })
}

fn is_scalar(value: &Value) -> bool {
    matches!(
        value,
        Value::String(_) | Value::Number(_) | Value::Bool(_) | Value::Null
    )
}

/// Flatten arbitrary loader metadata into a scalar-only record.
///
/// Scalar values pass through unchanged; lists, nested mappings, and anything
/// else are stringified rather than dropped. When a string `file_path` is
/// present its basename is added as `file_name`. `doc_type` is always set
/// last, overwriting any pre-existing key. Pure and idempotent.
pub fn sanitize(metadata: &Metadata, doc_type: &str) -> Metadata {
    let mut sanitized = Metadata::new();

    for (key, value) in metadata {
        if is_scalar(value) {
            sanitized.insert(key.clone(), value.clone());
        } else {
            sanitized.insert(key.clone(), Value::String(value.to_string()));
        }
    }

    if let Some(Value::String(file_path)) = sanitized.get("file_path") {
        let file_name = Path::new(file_path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        sanitized.insert("file_name".to_string(), Value::String(file_name));
    }

    sanitized.insert(
        "doc_type".to_string(),
        Value::String(doc_type.to_string()),
    );

    sanitized
}

/// Reshape per-node response metadata (node id -> metadata mapping) into a
/// list of flat records.
///
/// Each record carries a `doc_id`: the key itself when it matches the
/// canonical 8-4-4-4-12 UUID form, null otherwise. Values that are not
/// mappings are skipped. With a `doc_type` the per-node metadata is run
/// through [`sanitize`]; without one it is passed through unmodified.
pub fn transform_metadata(raw_metadata: &Metadata, doc_type: Option<&str>) -> Vec<Metadata> {
    let mut results = Vec::new();

    for (key, value) in raw_metadata {
        let Value::Object(node_metadata) = value else {
            continue;
        };

        let mut entry = Metadata::new();
        if uuid_pattern().is_match(key) {
            entry.insert("doc_id".to_string(), Value::String(key.clone()));
        } else {
            entry.insert("doc_id".to_string(), Value::Null);
        }

        match doc_type {
            Some(tag) => entry.extend(sanitize(node_metadata, tag)),
            None => entry.extend(node_metadata.clone()),
        }

        results.push(entry);
    }

    results
}
