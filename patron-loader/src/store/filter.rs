//! Filter expressions for the query shell
//!
//! A filter is written as a JSON document:
//!
//! ```text
//! {"within_sf_county": true}
//! {"age_range": "25 to 34 years", "active_year": {"$gte": "2020"}}
//! {"email": {"$regex": "gmail\\.com$"}}
//! {"$or": [{"home_library_code": "X"}, {"home_library_code": "B2"}]}
//! ```
//!
//! Parsing checks field names against the target collection and compiles
//! regex patterns up front, so everything that reaches a store is well formed.

use regex::Regex;

use super::value::QueryValue;
use crate::model::Collection;

/// A parsed filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Every sub-filter must match (an empty list matches everything)
    All(Vec<Filter>),
    /// At least one sub-filter must match (an empty list matches nothing)
    Any(Vec<Filter>),
    /// A condition on one field
    Field { field: String, condition: Condition },
}

/// A comparison applied to a single field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(QueryValue),
    Ne(QueryValue),
    Gt(QueryValue),
    Gte(QueryValue),
    Lt(QueryValue),
    Lte(QueryValue),
    In(Vec<QueryValue>),
    Nin(Vec<QueryValue>),
    Regex(String),
    Exists(bool),
}

impl Filter {
    /// The empty filter
    pub fn match_all() -> Self {
        Filter::All(Vec::new())
    }

    /// Equality on one field
    pub fn eq(field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        Filter::Field {
            field: field.into(),
            condition: Condition::Eq(value.into()),
        }
    }
}

/// Errors raised while turning shell input into a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryError {
    /// Input lacked the `selector | expression` shape
    MissingSeparator,
    UnknownCollection(String),
    /// The expression is not valid JSON
    Syntax(String),
    /// The expression is valid JSON but not an object
    NotADocument(&'static str),
    UnknownField { collection: String, field: String },
    UnknownOperator(String),
    InvalidOperand { operator: String, reason: String },
    InvalidRegex { pattern: String, reason: String },
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryError::MissingSeparator => {
                write!(f, "format error: use collection_name|{{filter}}")
            }
            QueryError::UnknownCollection(name) => write!(f, "unknown collection '{}'", name),
            QueryError::Syntax(message) => write!(f, "filter parse error: {}", message),
            QueryError::NotADocument(kind) => {
                write!(f, "filter must be a JSON object, got {}", kind)
            }
            QueryError::UnknownField { collection, field } => {
                write!(f, "collection '{}' has no field '{}'", collection, field)
            }
            QueryError::UnknownOperator(op) => write!(f, "unknown operator '{}'", op),
            QueryError::InvalidOperand { operator, reason } => {
                write!(f, "invalid operand for '{}': {}", operator, reason)
            }
            QueryError::InvalidRegex { pattern, reason } => {
                write!(f, "invalid regex '{}': {}", pattern, reason)
            }
        }
    }
}

impl std::error::Error for QueryError {}

/// Parse a filter expression for `collection`
///
/// Blank input and `{}` both mean "match everything".
pub fn parse_filter(collection: Collection, input: &str) -> Result<Filter, QueryError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Filter::match_all());
    }

    let json: serde_json::Value =
        serde_json::from_str(input).map_err(|e| QueryError::Syntax(e.to_string()))?;

    match QueryValue::from_json(&json) {
        QueryValue::Document(fields) => parse_document(collection, fields),
        other => Err(QueryError::NotADocument(other.kind())),
    }
}

fn parse_document(
    collection: Collection,
    fields: Vec<(String, QueryValue)>,
) -> Result<Filter, QueryError> {
    let mut filters = Vec::with_capacity(fields.len());

    for (key, value) in fields {
        let filter = if key == "$and" {
            Filter::All(parse_filter_list(collection, &key, value)?)
        } else if key == "$or" {
            Filter::Any(parse_filter_list(collection, &key, value)?)
        } else if key.starts_with('$') {
            return Err(QueryError::UnknownOperator(key));
        } else {
            parse_field(collection, key, value)?
        };
        filters.push(filter);
    }

    // A single condition doesn't need the wrapper
    if filters.len() == 1 {
        return Ok(filters.remove(0));
    }
    Ok(Filter::All(filters))
}

fn parse_filter_list(
    collection: Collection,
    operator: &str,
    value: QueryValue,
) -> Result<Vec<Filter>, QueryError> {
    let items = match value {
        QueryValue::Array(items) => items,
        other => {
            return Err(invalid(operator, format!("expected array, got {}", other.kind())));
        }
    };

    items
        .into_iter()
        .map(|item| match item {
            QueryValue::Document(fields) => parse_document(collection, fields),
            other => Err(invalid(
                operator,
                format!("expected array of documents, found {}", other.kind()),
            )),
        })
        .collect()
}

fn parse_field(
    collection: Collection,
    field: String,
    value: QueryValue,
) -> Result<Filter, QueryError> {
    if collection.column(&field).is_none() {
        return Err(QueryError::UnknownField {
            collection: collection.name().to_string(),
            field,
        });
    }

    let operators = match value {
        QueryValue::Document(ops) if ops.iter().all(|(k, _)| k.starts_with('$')) => ops,
        QueryValue::Document(_) => {
            return Err(invalid(
                &field,
                "nested documents can't be compared, use $-operators".to_string(),
            ));
        }
        QueryValue::Array(_) => {
            return Err(invalid(&field, "arrays need $in or $nin".to_string()));
        }
        scalar => {
            return Ok(Filter::Field {
                field,
                condition: Condition::Eq(scalar),
            });
        }
    };

    if operators.is_empty() {
        return Err(invalid(&field, "empty operator document".to_string()));
    }

    let mut conditions = operators
        .into_iter()
        .map(|(op, operand)| {
            parse_condition(&op, operand).map(|condition| Filter::Field {
                field: field.clone(),
                condition,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if conditions.len() == 1 {
        return Ok(conditions.remove(0));
    }
    Ok(Filter::All(conditions))
}

fn parse_condition(operator: &str, operand: QueryValue) -> Result<Condition, QueryError> {
    let condition = match operator {
        "$eq" => Condition::Eq(scalar(operator, operand)?),
        "$ne" => Condition::Ne(scalar(operator, operand)?),
        "$gt" => Condition::Gt(comparable(operator, operand)?),
        "$gte" => Condition::Gte(comparable(operator, operand)?),
        "$lt" => Condition::Lt(comparable(operator, operand)?),
        "$lte" => Condition::Lte(comparable(operator, operand)?),
        "$in" => Condition::In(scalar_list(operator, operand)?),
        "$nin" => Condition::Nin(scalar_list(operator, operand)?),
        "$regex" => {
            let pattern = match operand {
                QueryValue::String(pattern) => pattern,
                other => {
                    return Err(invalid(operator, format!("expected string, got {}", other.kind())));
                }
            };
            if let Err(e) = Regex::new(&pattern) {
                return Err(QueryError::InvalidRegex {
                    pattern,
                    reason: e.to_string(),
                });
            }
            Condition::Regex(pattern)
        }
        "$exists" => match operand {
            QueryValue::Bool(b) => Condition::Exists(b),
            other => {
                return Err(invalid(operator, format!("expected boolean, got {}", other.kind())));
            }
        },
        _ => return Err(QueryError::UnknownOperator(operator.to_string())),
    };
    Ok(condition)
}

fn scalar(operator: &str, operand: QueryValue) -> Result<QueryValue, QueryError> {
    if operand.is_scalar() {
        Ok(operand)
    } else {
        Err(invalid(operator, format!("expected scalar, got {}", operand.kind())))
    }
}

fn comparable(operator: &str, operand: QueryValue) -> Result<QueryValue, QueryError> {
    if operand.is_null() {
        return Err(invalid(operator, "null can't be ordered".to_string()));
    }
    scalar(operator, operand)
}

fn scalar_list(operator: &str, operand: QueryValue) -> Result<Vec<QueryValue>, QueryError> {
    match operand {
        QueryValue::Array(items) => items.into_iter().map(|item| scalar(operator, item)).collect(),
        other => Err(invalid(operator, format!("expected array, got {}", other.kind()))),
    }
}

fn invalid(operator: &str, reason: String) -> QueryError {
    QueryError::InvalidOperand {
        operator: operator.to_string(),
        reason,
    }
}
