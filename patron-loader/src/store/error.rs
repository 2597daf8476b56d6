//! Errors surfaced by store implementations

use super::filter::QueryError;

/// A failed store call
///
/// `NotFound` is kept apart from every other backend failure because the
/// reload protocol tolerates it when dropping collections.
#[derive(Debug)]
pub enum StoreError {
    /// The target collection or index does not exist
    NotFound(String),
    /// The query was rejected before reaching the backend
    Query(QueryError),
    /// Anything the backend reported
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        StoreError::Backend(Box::new(error))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(target) => write!(f, "{} does not exist", target),
            StoreError::Query(e) => write!(f, "{}", e),
            StoreError::Backend(e) => write!(f, "store error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::NotFound(_) => None,
            StoreError::Query(e) => Some(e),
            StoreError::Backend(e) => Some(e.as_ref()),
        }
    }
}

impl From<QueryError> for StoreError {
    fn from(error: QueryError) -> Self {
        StoreError::Query(error)
    }
}
