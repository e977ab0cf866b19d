//! Document representation
//!
//! A document is an insertion-ordered mapping of field name to JSON value.
//! Nested fields are addressed with `.`-separated paths; a numeric path
//! segment indexes into a list.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{StoreError, StoreResult};

/// Identifier of a document within a single partition
pub type DocId = u64;

/// Separator for embedded field paths
pub const FIELD_SEPARATOR: char = '.';

/// An ordered mapping of field name to value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(Map<String, Value>);

impl Document {
    /// Creates an empty document
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Creates a document from a JSON value.
    ///
    /// Only JSON objects are documents.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(StoreError::invalid_argument(format!(
                "document must be a JSON object, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Builder-style field insertion
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(field, value);
        self
    }

    /// Sets a top-level field, returning the previous value
    pub fn put(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    /// Removes a top-level field
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    /// Returns a top-level field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Resolves a possibly embedded field path such as `cast.0.name`.
    pub fn field(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.0.get(path) {
            return Some(value);
        }

        let mut segments = path.split(FIELD_SEPARATOR);
        let first = segments.next()?;
        let mut current = self.0.get(first)?;

        for segment in segments {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Returns true if the document has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of top-level fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates fields in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Borrows the underlying map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Converts into a JSON value
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

/// Short JSON type name for error messages
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_requires_object() {
        assert!(Document::from_value(json!({"a": 1})).is_ok());

        let err = Document::from_value(json!([1, 2])).unwrap_err();
        assert_eq!(err.code(), "DOCSHARD_INVALID_ARGUMENT");
    }

    #[test]
    fn test_embedded_field_path() {
        let doc = Document::from_value(json!({
            "title": "Speed",
            "director": {"name": "Jan de Bont"},
            "cast": [{"name": "Keanu"}, {"name": "Sandra"}]
        }))
        .unwrap();

        assert_eq!(doc.field("title"), Some(&json!("Speed")));
        assert_eq!(doc.field("director.name"), Some(&json!("Jan de Bont")));
        assert_eq!(doc.field("cast.1.name"), Some(&json!("Sandra")));
        assert_eq!(doc.field("cast.7.name"), None);
        assert_eq!(doc.field("director.age"), None);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let doc = Document::new().with("z", 1).with("a", 2).with("m", 3);
        let keys: Vec<&str> = doc.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_dotted_top_level_key_wins() {
        let doc = Document::new().with("a.b", 1);
        assert_eq!(doc.field("a.b"), Some(&json!(1)));
    }
}
