//! Stateful objects: the serializable data held by components.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{StateError, Value};

/// Kind of a single serializable field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// A nested stateful object.
    Object { name: String },
    DiceSpecification,
    DiceResult,
    /// Symbolic enum; `values` maps variant name to its serialized form.
    Enum {
        name: String,
        values: BTreeMap<String, String>,
    },
    Array { value_type: Box<FieldType> },
    Nullable { value_type: Box<FieldType> },
}

impl FieldType {
    pub fn array(value_type: FieldType) -> Self {
        FieldType::Array {
            value_type: Box::new(value_type),
        }
    }

    pub fn nullable(value_type: FieldType) -> Self {
        FieldType::Nullable {
            value_type: Box::new(value_type),
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub field_type: FieldType,
}

/// Explicit description of a stateful object's public fields.
///
/// An empty schema declares nothing and disables field validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field declaration.
    pub fn field(mut self, name: &'static str, field_type: FieldType) -> Self {
        self.fields.push(FieldDescriptor { name, field_type });
        self
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reject object keys the schema does not declare.
    pub fn validate(&self, object: &str, value: &Value) -> Result<(), StateError> {
        if self.is_empty() {
            return Ok(());
        }

        if let Value::Object(map) = value {
            if let Some(field) = map.keys().find(|key| self.get(key).is_none()) {
                return Err(StateError::UnknownField {
                    object: object.to_string(),
                    field: field.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Marker trait for every type that can live inside a component.
///
/// Implementors are plain serde types; missing fields in a saved blob fall
/// back to `Default`, so objects should use `#[serde(default)]`.
pub trait StatefulObject: Serialize + DeserializeOwned + Default + 'static {
    /// Stable name used in save bundles and diagnostics.
    const NAME: &'static str;

    /// Declared public fields. Defaults to an empty schema.
    fn schema() -> Schema {
        Schema::default()
    }

    /// Encode into a JSON blob.
    fn save(&self) -> Result<Value, StateError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode from a JSON blob after validating it against [`Self::schema`].
    fn load(value: &Value) -> Result<Self, StateError> {
        Self::schema().validate(Self::NAME, value)?;
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// State for components that carry no data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoState;

impl StatefulObject for NoState {
    const NAME: &'static str = "NoState";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(default)]
    struct Tracker {
        name: String,
        count: i64,
    }

    impl Default for Tracker {
        fn default() -> Self {
            Self {
                name: "Hello, World".into(),
                count: 10,
            }
        }
    }

    impl StatefulObject for Tracker {
        const NAME: &'static str = "Tracker";

        fn schema() -> Schema {
            Schema::new()
                .field("name", FieldType::String)
                .field("count", FieldType::Number)
        }
    }

    #[test]
    fn test_save_and_load() {
        let tracker = Tracker {
            name: "Testing".into(),
            count: 100,
        };

        let blob = tracker.save().unwrap();
        let loaded = Tracker::load(&blob).unwrap();

        assert_eq!(loaded, tracker);
    }

    #[test]
    fn test_partial_blob_uses_defaults() {
        let loaded = Tracker::load(&json!({ "count": 3 })).unwrap();
        assert_eq!(loaded.name, "Hello, World");
        assert_eq!(loaded.count, 3);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = Tracker::load(&json!({ "count": 3, "mana": 9 })).unwrap_err();
        match err {
            StateError::UnknownField { object, field } => {
                assert_eq!(object, "Tracker");
                assert_eq!(field, "mana");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_schema_skips_validation() {
        assert!(Schema::new().validate("Any", &json!({ "x": 1 })).is_ok());
        assert!(NoState::load(&json!(null)).is_ok());
    }

    #[test]
    fn test_schema_lookup() {
        let schema = Tracker::schema();
        assert_eq!(schema.fields().len(), 2);
        assert_eq!(schema.get("count").unwrap().field_type, FieldType::Number);
        assert!(schema.get("missing").is_none());
    }

    #[test]
    fn test_nested_field_types() {
        let field = FieldType::nullable(FieldType::array(FieldType::DiceResult));
        let encoded = serde_json::to_value(&field).unwrap();
        assert_eq!(encoded["type"], "nullable");
        assert_eq!(encoded["value_type"]["type"], "array");
    }
}
