//! Store-agnostic value representation for filters and query results

/// A single value in a filter expression or a returned document
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    /// Null/absent value
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<QueryValue>),
    /// Nested document; keys parsed from JSON come back sorted by name
    Document(Vec<(String, QueryValue)>),
}

impl QueryValue {
    pub fn is_null(&self) -> bool {
        matches!(self, QueryValue::Null)
    }

    /// Scalars are everything a column can hold directly
    pub fn is_scalar(&self) -> bool {
        !matches!(self, QueryValue::Array(_) | QueryValue::Document(_))
    }

    /// Short name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            QueryValue::Null => "null",
            QueryValue::Bool(_) => "boolean",
            QueryValue::Int(_) | QueryValue::Float(_) => "number",
            QueryValue::String(_) => "string",
            QueryValue::Array(_) => "array",
            QueryValue::Document(_) => "document",
        }
    }

    /// Convert to a JSON value for display
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            QueryValue::Null => serde_json::Value::Null,
            QueryValue::Bool(b) => serde_json::Value::Bool(*b),
            QueryValue::Int(i) => serde_json::json!(*i),
            QueryValue::Float(f) => serde_json::json!(*f),
            QueryValue::String(s) => serde_json::Value::String(s.clone()),
            QueryValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(QueryValue::to_json).collect())
            }
            QueryValue::Document(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Convert a parsed JSON value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => QueryValue::Null,
            serde_json::Value::Bool(b) => QueryValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    QueryValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    QueryValue::Float(f)
                } else {
                    QueryValue::Null
                }
            }
            serde_json::Value::String(s) => QueryValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                QueryValue::Array(items.iter().map(QueryValue::from_json).collect())
            }
            serde_json::Value::Object(map) => QueryValue::Document(
                map.iter()
                    .map(|(k, v)| (k.clone(), QueryValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl std::fmt::Display for QueryValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryValue::Null => write!(f, "NULL"),
            QueryValue::Bool(b) => write!(f, "{}", b),
            QueryValue::Int(i) => write!(f, "{}", i),
            QueryValue::Float(fl) => write!(f, "{}", fl),
            QueryValue::String(s) => write!(f, "{}", s),
            QueryValue::Array(_) | QueryValue::Document(_) => write!(f, "{}", self.to_json()),
        }
    }
}

impl Default for QueryValue {
    fn default() -> Self {
        QueryValue::Null
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::String(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        QueryValue::String(value)
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

impl<T: Into<QueryValue>> From<Option<T>> for QueryValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(QueryValue::Null)
    }
}

/// One row/document returned by a query, columns in collection order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub fields: Vec<(String, QueryValue)>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<QueryValue>) {
        self.fields.push((key.into(), value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }
}
