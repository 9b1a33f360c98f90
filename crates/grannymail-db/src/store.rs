//! Capabilities required from the remote table store and blob bucket

use crate::DbResult;
use grannymail_core::Row;
use serde_json::Value;

/// Single-column predicate
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Neq(column.into(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _) | Filter::Neq(column, _) => column,
        }
    }

    /// Whether `row` satisfies the predicate with SQL null semantics: a null
    /// filter value means `IS NULL` / `IS NOT NULL`, and a null cell never
    /// satisfies a comparison against a non-null value.
    pub fn matches(&self, row: &Row) -> bool {
        let cell = |column: &str| row.get(column).filter(|v| !v.is_null());
        match self {
            Filter::Eq(column, Value::Null) => cell(column).is_none(),
            Filter::Neq(column, Value::Null) => cell(column).is_some(),
            Filter::Eq(column, value) => cell(column) == Some(value),
            Filter::Neq(column, value) => cell(column).map_or(false, |v| v != value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Select parameters: optional filter, ordering and row limit
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Filter>,
    pub order: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            ..Self::default()
        }
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Direction) -> Self {
        self.order = Some((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Table-oriented remote store
#[async_trait::async_trait]
pub trait TableStore: Send + Sync {
    /// Rows of `table` matching `query`
    async fn select(&self, table: &str, query: &Query) -> DbResult<Vec<Row>>;

    /// Insert `rows` and return them as materialized by the server
    async fn insert(&self, table: &str, rows: Vec<Row>) -> DbResult<Vec<Row>>;

    /// Apply `values` to every row matching `filter`; returns the updated rows
    async fn update(&self, table: &str, filter: &Filter, values: Row) -> DbResult<Vec<Row>>;

    /// Delete every row matching `filter`; returns the deleted rows
    async fn delete(&self, table: &str, filter: &Filter) -> DbResult<Vec<Row>>;
}

/// Path-addressed binary storage in a single bucket
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> DbResult<()>;

    async fn download(&self, path: &str) -> DbResult<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_matches() {
        let mut row = Row::new();
        row.insert("email".into(), json!("a@example.com"));

        assert!(Filter::eq("email", "a@example.com").matches(&row));
        assert!(!Filter::neq("email", "a@example.com").matches(&row));
        assert!(Filter::eq("phone_number", Value::Null).matches(&row));
        assert!(!Filter::neq("phone_number", "").matches(&row));
        assert!(Filter::neq("email", "").matches(&row));
        assert!(Filter::neq("email", Value::Null).matches(&row));
    }

    #[test]
    fn test_query_builder() {
        let query = Query::filtered(Filter::eq("user_id", "u-1"))
            .order_by("created_at", Direction::Desc)
            .limit(1);

        assert_eq!(query.filter.as_ref().map(Filter::column), Some("user_id"));
        assert_eq!(query.order, Some(("created_at".to_string(), Direction::Desc)));
        assert_eq!(query.limit, Some(1));
    }
}
