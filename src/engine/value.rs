//! Argument values passed to tasks.
use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use super::handlers::Handler;

/// Variable bindings for one scope, keyed by name.
pub type Vars = BTreeMap<String, Value>;

/// A value bound to a task parameter.
///
/// Only [`Text`](Self::Text) (directly or inside a [`List`](Self::List)) is
/// rendered as a template, and only for template-eligible parameters.
#[derive(Debug, Clone)]
pub enum ArgValue {
    /// Text that may contain template markers.
    Text(String),
    /// Text that is passed through verbatim, never rendered.
    Raw(String),
    /// A list of values; text elements are rendered individually.
    List(Vec<ArgValue>),
    /// Structured data (numbers, booleans, tables).
    Data(Value),
    /// A handler to notify.
    Handler(Handler),
    /// No value.
    Unset,
}

impl ArgValue {
    /// Build a template-eligible text value.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Build a raw text value that bypasses rendering.
    pub fn raw(s: impl Into<String>) -> Self {
        Self::Raw(s.into())
    }

    /// Whether this value counts as absent.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset | Self::Data(Value::Null))
    }

    /// Borrow the text of a [`Text`](Self::Text), [`Raw`](Self::Raw) or
    /// string [`Data`](Self::Data) value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Raw(s) => Some(s),
            Self::Data(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Convert to a plain data value for template scopes.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) | Self::Raw(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Data(v) => v.clone(),
            Self::Handler(h) => Value::String(h.name().to_string()),
            Self::Unset => Value::Null,
        }
    }

    /// Convert plain data into an argument, treating strings as templates.
    #[must_use]
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => Self::Unset,
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from_json).collect()),
            other => Self::Data(other),
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Raw(s) => f.write_str(s),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Data(Value::String(s)) => f.write_str(s),
            Self::Data(v) => write!(f, "{v}"),
            Self::Handler(h) => f.write_str(h.name()),
            Self::Unset => f.write_str("None"),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for ArgValue {
    fn from(b: bool) -> Self {
        Self::Data(Value::Bool(b))
    }
}

impl From<i64> for ArgValue {
    fn from(n: i64) -> Self {
        Self::Data(Value::from(n))
    }
}

impl From<u32> for ArgValue {
    fn from(n: u32) -> Self {
        Self::Data(Value::from(n))
    }
}

impl From<Value> for ArgValue {
    fn from(v: Value) -> Self {
        Self::from_json(v)
    }
}

impl From<Handler> for ArgValue {
    fn from(h: Handler) -> Self {
        Self::Handler(h)
    }
}

impl<T: Into<Self>> From<Vec<T>> for ArgValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_matches_status_line_format() {
        assert_eq!(ArgValue::text("/tmp/x").to_string(), "/tmp/x");
        assert_eq!(ArgValue::from(true).to_string(), "true");
        assert_eq!(ArgValue::from(493_i64).to_string(), "493");
        assert_eq!(ArgValue::from(vec!["a", "b"]).to_string(), "[a, b]");
        assert_eq!(ArgValue::Unset.to_string(), "None");
    }

    #[test]
    fn null_data_counts_as_unset() {
        assert!(ArgValue::Unset.is_unset());
        assert!(ArgValue::Data(Value::Null).is_unset());
        assert!(!ArgValue::text("").is_unset());
    }

    #[test]
    fn from_json_makes_strings_templates() {
        let value = ArgValue::from_json(json!(["{{ a }}", 1, null]));
        let ArgValue::List(items) = value else {
            panic!("expected list");
        };
        assert!(matches!(&items[0], ArgValue::Text(s) if s == "{{ a }}"));
        assert!(matches!(&items[1], ArgValue::Data(v) if v == &json!(1)));
        assert!(matches!(items[2], ArgValue::Unset));
    }

    #[test]
    fn to_json_flattens_markers() {
        let value = ArgValue::List(vec![ArgValue::raw("r"), ArgValue::text("t")]);
        assert_eq!(value.to_json(), json!(["r", "t"]));
    }

    #[test]
    fn as_str_accepts_text_raw_and_string_data() {
        assert_eq!(ArgValue::text("a").as_str(), Some("a"));
        assert_eq!(ArgValue::raw("b").as_str(), Some("b"));
        assert_eq!(ArgValue::Data(json!("c")).as_str(), Some("c"));
        assert_eq!(ArgValue::from(1_i64).as_str(), None);
    }
}
