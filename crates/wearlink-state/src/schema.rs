use serde_json::Value;

use crate::error::Result;

/// JSON Schema for the snapshot document, shared with external tools.
pub const SNAPSHOT_SCHEMA: &str = include_str!("../schemas/board-snapshot.schema.json");

/// Whether [`validate_document`] checks anything in this build.
pub const fn schema_validation_enabled() -> bool {
    cfg!(feature = "schema")
}

/// Validate a parsed snapshot document against [`SNAPSHOT_SCHEMA`].
#[cfg(feature = "schema")]
pub fn validate_document(document: &Value) -> Result<()> {
    use crate::error::StateError;

    let validator = compiled()?;
    let mut errors = validator.iter_errors(document);
    if let Some(first) = errors.next() {
        let mut message = first.to_string();
        for err in errors.take(3) {
            message.push_str("; ");
            message.push_str(&err.to_string());
        }
        return Err(StateError::SchemaViolation(message));
    }
    Ok(())
}

#[cfg(not(feature = "schema"))]
pub fn validate_document(_document: &Value) -> Result<()> {
    tracing::debug!("schema feature disabled, skipping snapshot validation");
    Ok(())
}

#[cfg(feature = "schema")]
fn compiled() -> Result<&'static jsonschema::Validator> {
    use std::sync::OnceLock;

    static VALIDATOR: OnceLock<std::result::Result<jsonschema::Validator, String>> =
        OnceLock::new();

    VALIDATOR
        .get_or_init(|| {
            let schema: Value = serde_json::from_str(SNAPSHOT_SCHEMA).map_err(|e| e.to_string())?;
            jsonschema::validator_for(&schema).map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|msg| {
            crate::error::StateError::SchemaViolation(format!("embedded schema is invalid: {msg}"))
        })
}

#[cfg(all(test, feature = "schema"))]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::StateError;

    #[test]
    fn embedded_schema_compiles() {
        assert!(compiled().is_ok());
    }

    #[test]
    fn accepts_minimal_document() {
        let doc = json!({"version": 2, "descriptors": [], "nodes": [], "routes": []});
        assert!(validate_document(&doc).is_ok());
    }

    #[test]
    fn rejects_bad_descriptor_width() {
        let doc = json!({
            "version": 2,
            "descriptors": [{"module": 5, "register": 14, "size": 3, "signed": false}],
            "nodes": [],
            "routes": []
        });
        let err = validate_document(&doc).unwrap_err();
        assert!(matches!(err, StateError::SchemaViolation(_)));
    }

    #[test]
    fn transform_node_requires_transform() {
        let doc = json!({
            "version": 2,
            "descriptors": [],
            "nodes": [{"kind": "transform", "children": [], "environment_slot_count": 0}],
            "routes": []
        });
        assert!(validate_document(&doc).is_err());
    }
}
