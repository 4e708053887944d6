//! JSON Schema validation for descriptive records
//!
//! Records are checked against a built-in structural schema by default. An
//! organization may point the validator at its own schema document instead.

use crate::error::{Error, Result};
use jsonschema::{ValidationError, Validator};
use serde_json::{json, Value};
use std::path::Path;

/// Compiled record schema
pub struct RecordSchema {
    validator: Validator,
}

impl RecordSchema {
    /// The built-in structural schema for descriptive records
    pub fn builtin() -> Result<Self> {
        Self::from_value(&builtin_record_schema())
    }

    /// Load and compile a schema document from disk
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let schema: Value = serde_json::from_str(&text)?;
        Self::from_value(&schema).map_err(|e| Error::InvalidSchema {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn from_value(schema: &Value) -> Result<Self> {
        let validator = Validator::new(schema)
            .map_err(|e| Error::validation(format!("Failed to compile schema: {}", e)))?;
        Ok(Self { validator })
    }

    /// Validate one record, returning every schema violation as text
    pub fn violations(&self, record: &Value) -> Vec<String> {
        match self.validator.validate(record) {
            Ok(()) => Vec::new(),
            Err(errors) => errors.map(|e| format_validation_error(&e)).collect(),
        }
    }

    /// Validate one record, failing with all violations joined
    pub fn validate(&self, record: &Value) -> Result<()> {
        let violations = self.violations(record);
        if violations.is_empty() {
            return Ok(());
        }
        Err(Error::validation(format!(
            "Record validation failed:\n  - {}",
            violations.join("\n  - ")
        )))
    }
}

/// Format a validation error into a readable string
fn format_validation_error(error: &ValidationError) -> String {
    format!("{}: {}", error.instance_path, error)
}

/// Structural schema every descriptive record must satisfy
fn builtin_record_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "type": "object",
        "required": ["@id", "kind"],
        "properties": {
            "@id": { "type": "string", "minLength": 1 },
            "kind": {
                "type": "string",
                "enum": ["Resource", "Subcollection", "DataFile"]
            },
            "filepath": { "type": "string", "minLength": 1 },
            "size": { "type": "integer", "minimum": 0 },
            "checksum": {
                "type": "object",
                "required": ["algorithm", "hash"],
                "properties": {
                    "algorithm": { "type": "string" },
                    "hash": { "type": "string", "pattern": "^[0-9a-f]+$" }
                }
            },
            "mediaType": { "type": "string" },
            "downloadURL": { "type": "string" },
            "hasMember": {
                "type": "array",
                "items": { "type": "string" }
            }
        },
        "allOf": [
            {
                "if": { "properties": { "kind": { "const": "DataFile" } } },
                "then": { "required": ["filepath", "size", "checksum"] }
            },
            {
                "if": { "properties": { "kind": { "const": "Subcollection" } } },
                "then": { "required": ["filepath"] }
            }
        ]
    })
}
