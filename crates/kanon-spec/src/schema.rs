//! Schema resolution and compilation.
//!
//! OpenAPI schemas are a dialect of JSON Schema. Before compiling them with
//! `jsonschema` the resolver inlines `$ref`s into `#/components/schemas`,
//! rewrites `nullable: true` into an `anyOf` with `null`, and converts the
//! boolean `exclusiveMinimum`/`exclusiveMaximum` form to the numeric one.

use std::fmt;

use serde_json::{json, Map, Value};

use crate::model::Components;

const MAX_DEPTH: usize = 50;
const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

/// Inlines references against a document's components.
#[derive(Debug, Clone, Copy)]
pub struct SchemaResolver<'a> {
    components: &'a Components,
}

impl<'a> SchemaResolver<'a> {
    /// Create a resolver over `components`.
    pub fn new(components: &'a Components) -> Self {
        Self { components }
    }

    /// Resolve a schema into a self-contained JSON Schema document.
    pub fn resolve(&self, schema: &Value) -> Result<Value, String> {
        self.resolve_refs(schema.clone(), 0)
    }

    fn resolve_refs(&self, mut schema: Value, depth: usize) -> Result<Value, String> {
        if depth > MAX_DEPTH {
            // Circular or pathologically deep: accept anything below this point.
            return Ok(json!({}));
        }

        match &mut schema {
            Value::Object(map) => {
                if let Some(Value::String(reference)) = map.get("$ref") {
                    return self.resolve_ref(reference, depth + 1);
                }

                let nullable = map
                    .get("nullable")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                map.remove("nullable");

                if nullable {
                    let inner = self.resolve_refs(schema, depth + 1)?;
                    return Ok(json!({ "anyOf": [inner, { "type": "null" }] }));
                }

                normalize_exclusive_bound(map, "exclusiveMinimum", "minimum");
                normalize_exclusive_bound(map, "exclusiveMaximum", "maximum");

                for key in ["allOf", "anyOf", "oneOf"] {
                    if let Some(Value::Array(items)) = map.get_mut(key) {
                        let resolved: Result<Vec<Value>, String> = items
                            .iter()
                            .map(|item| self.resolve_refs(item.clone(), depth + 1))
                            .collect();
                        *items = resolved?;
                    }
                }

                for key in ["not", "items", "additionalProperties"] {
                    if matches!(map.get(key), Some(Value::Object(_))) {
                        if let Some(inner) = map.remove(key) {
                            let resolved = self.resolve_refs(inner, depth + 1)?;
                            map.insert(key.to_string(), resolved);
                        }
                    }
                }

                if let Some(Value::Object(props)) = map.get_mut("properties") {
                    let keys: Vec<String> = props.keys().cloned().collect();
                    for key in keys {
                        if let Some(prop) = props.remove(&key) {
                            let resolved = self.resolve_refs(prop, depth + 1)?;
                            props.insert(key, resolved);
                        }
                    }
                }

                Ok(schema)
            }
            Value::Array(items) => {
                let resolved: Result<Vec<Value>, String> = items
                    .iter()
                    .map(|item| self.resolve_refs(item.clone(), depth + 1))
                    .collect();
                Ok(Value::Array(resolved?))
            }
            _ => Ok(schema),
        }
    }

    fn resolve_ref(&self, reference: &str, depth: usize) -> Result<Value, String> {
        let name = reference
            .strip_prefix(SCHEMA_REF_PREFIX)
            .ok_or_else(|| format!("unsupported schema reference '{}'", reference))?;

        let raw = self
            .components
            .schemas
            .get(name)
            .ok_or_else(|| format!("referenced schema '{}' not found", name))?;

        self.resolve_refs(raw.clone(), depth)
    }
}

/// OpenAPI 3.0 spells `exclusiveMinimum: true` next to `minimum`; JSON Schema
/// 2020-12 wants the bound itself.
fn normalize_exclusive_bound(map: &mut Map<String, Value>, exclusive: &str, inclusive: &str) {
    match map.get(exclusive) {
        Some(Value::Bool(true)) => {
            map.remove(exclusive);
            if let Some(bound) = map.remove(inclusive) {
                map.insert(exclusive.to_string(), bound);
            }
        }
        Some(Value::Bool(false)) => {
            map.remove(exclusive);
        }
        _ => {}
    }
}

/// The first failure reported by a compiled schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// JSON pointer to the failing part of the instance.
    pub instance_path: String,
    /// Validator message.
    pub message: String,
    /// Pretty-printed schema and value, for multi-line error text.
    pub detail: String,
}

/// A resolved schema compiled once and reused for every request.
pub struct CompiledSchema {
    schema: Value,
    validator: jsonschema::Validator,
}

impl CompiledSchema {
    /// Resolve and compile `schema`.
    pub fn compile(resolver: &SchemaResolver<'_>, schema: &Value) -> Result<Self, String> {
        let schema = resolver.resolve(schema)?;
        let validator = jsonschema::draft202012::new(&schema)
            .map_err(|e| format!("failed to compile schema: {}", e))?;
        Ok(Self { schema, validator })
    }

    /// The resolved schema document.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Whether `value` conforms.
    pub fn is_valid(&self, value: &Value) -> bool {
        self.validator.is_valid(value)
    }

    /// Validate `value`, reporting the first violation.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaViolation> {
        let Some(error) = self.validator.iter_errors(value).next() else {
            return Ok(());
        };

        let instance_path = error.instance_path.to_string();
        let message = if instance_path.is_empty() {
            error.to_string()
        } else {
            format!("Error at \"{}\": {}", instance_path, error)
        };

        Err(SchemaViolation {
            instance_path,
            message,
            detail: format!(
                "Schema:\n  {}\n\nValue:\n  {}",
                self.schema,
                value
            ),
        })
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn components() -> Components {
        let mut components = Components::default();
        components.schemas.insert(
            "Pet".to_string(),
            json!({
                "type": "object",
                "required": ["id", "name"],
                "properties": {
                    "id": {"type": "integer"},
                    "name": {"type": "string"},
                    "tag": {"type": "string", "nullable": true},
                    "owner": {"$ref": "#/components/schemas/Owner"}
                }
            }),
        );
        components.schemas.insert(
            "Owner".to_string(),
            json!({"type": "object", "properties": {"name": {"type": "string"}}}),
        );
        components.schemas.insert(
            "Node".to_string(),
            json!({"type": "object", "properties": {"next": {"$ref": "#/components/schemas/Node"}}}),
        );
        components
    }

    #[test]
    fn test_resolves_nested_refs() {
        let components = components();
        let resolver = SchemaResolver::new(&components);
        let resolved = resolver
            .resolve(&json!({"type": "array", "items": {"$ref": "#/components/schemas/Pet"}}))
            .unwrap();

        assert_eq!(resolved["items"]["properties"]["owner"]["type"], "object");
        assert!(resolved["items"]["properties"]["tag"]["anyOf"].is_array());
    }

    #[test]
    fn test_missing_ref() {
        let components = components();
        let resolver = SchemaResolver::new(&components);
        let err = resolver
            .resolve(&json!({"$ref": "#/components/schemas/Missing"}))
            .unwrap_err();
        assert!(err.contains("Missing"));
    }

    #[test]
    fn test_recursive_ref_terminates() {
        let components = components();
        let resolver = SchemaResolver::new(&components);
        assert!(resolver.resolve(&json!({"$ref": "#/components/schemas/Node"})).is_ok());
    }

    #[test]
    fn test_exclusive_minimum_boolean_form() {
        let components = Components::default();
        let resolver = SchemaResolver::new(&components);
        let schema = CompiledSchema::compile(
            &resolver,
            &json!({"type": "integer", "minimum": 0, "exclusiveMinimum": true}),
        )
        .unwrap();

        assert!(!schema.is_valid(&json!(0)));
        assert!(schema.is_valid(&json!(1)));
    }

    #[test]
    fn test_violation_reports_instance_path() {
        let components = components();
        let resolver = SchemaResolver::new(&components);
        let schema =
            CompiledSchema::compile(&resolver, &json!({"$ref": "#/components/schemas/Pet"}))
                .unwrap();

        assert!(schema.validate(&json!({"id": 1, "name": "rex", "tag": null})).is_ok());

        let violation = schema.validate(&json!({"id": "one", "name": "rex"})).unwrap_err();
        assert_eq!(violation.instance_path, "/id");
        assert!(violation.detail.starts_with("Schema:"));
    }
}
