//! Field paths locating values inside structured records
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// One step of a field path: an object key or an array index
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

/// Ordered list of segments, e.g. `["customer", "emails", 0]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(pub Vec<PathSegment>);

impl FieldPath {
    /// Build a path from dotted keys; purely numeric parts become indices
    pub fn parse(dotted: &str) -> Self {
        let segments = dotted
            .split('.')
            .filter(|part| !part.is_empty())
            .map(|part| match part.parse::<usize>() {
                Ok(index) => PathSegment::Index(index),
                Err(_) => PathSegment::Key(part.to_string()),
            })
            .collect();
        FieldPath(segments)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve against a record; `None` when any step is missing
    pub fn resolve<'a>(&self, record: &'a Map<String, Value>) -> Option<&'a Value> {
        let mut segments = self.0.iter();
        let mut current = match segments.next()? {
            PathSegment::Key(key) => record.get(key)?,
            PathSegment::Index(index) => record.get(&index.to_string())?,
        };

        for segment in segments {
            current = match (segment, current) {
                (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
                (PathSegment::Index(index), Value::Array(items)) => items.get(*index)?,
                (PathSegment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
                _ => return None,
            };
        }

        Some(current)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => write!(f, "{}", key)?,
                PathSegment::Key(key) => write!(f, ".{}", key)?,
                PathSegment::Index(index) => write!(f, "[{}]", index)?,
            }
        }
        Ok(())
    }
}

/// Render a scalar JSON value as text. Null yields `None`; containers are
/// rendered as compact JSON.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> Map<String, Value> {
        json!({
            "customer": { "name": "Ana", "emails": ["a@x.io", "b@x.io"] },
            "total": 12.5
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn test_resolve_nested() {
        let path: FieldPath = serde_json::from_value(json!(["customer", "emails", 1])).unwrap();
        assert_eq!(path.resolve(&record()), Some(&json!("b@x.io")));
        assert_eq!(path.to_string(), "customer.emails[1]");
    }

    #[test]
    fn test_resolve_missing() {
        let path = FieldPath::parse("customer.phone");
        assert!(path.resolve(&record()).is_none());

        let through_scalar = FieldPath::parse("total.value");
        assert!(through_scalar.resolve(&record()).is_none());
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!(10)), Some("10".to_string()));
        assert_eq!(value_to_text(&json!(null)), None);
        assert_eq!(value_to_text(&json!("x")), Some("x".to_string()));
    }
}
