use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt};

/// Attribute name to value map used for both source rows and target items.
pub type AttributeMap = BTreeMap<String, Value>;

/// A schema-less attribute value.
///
/// Serialized untagged so that stored items and configuration read as plain JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(AttributeMap),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 => Some(*v as i64),
            Value::String(v) => v.parse().ok(),
            Value::Boolean(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Renders the value as a key fragment.
    ///
    /// Scalars render to their plain text form so that `Int(1)` and `String("1")`
    /// address the same key. Null renders to `None`; containers render as JSON.
    pub fn key_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Boolean(v) => Some(v.to_string()),
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) => Some(v.to_string()),
            Value::String(v) => Some(v.clone()),
            Value::List(_) | Value::Map(_) => serde_json::to_string(self).ok(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key_string() {
            Some(s) => f.write_str(&s),
            None => f.write_str("NULL"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_share_key_form() {
        assert_eq!(Value::Int(7).key_string(), Value::from("7").key_string());
        assert_eq!(Value::Null.key_string(), None);
    }

    #[test]
    fn untagged_json_shape() {
        let mut map = AttributeMap::new();
        map.insert("n".into(), Value::Int(3));
        map.insert("f".into(), Value::Float(1.5));
        map.insert("s".into(), Value::from("x"));
        map.insert("z".into(), Value::Null);
        map.insert("l".into(), Value::List(vec![Value::Boolean(true)]));

        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"f":1.5,"l":[true],"n":3,"s":"x","z":null}"#);

        let back: AttributeMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
