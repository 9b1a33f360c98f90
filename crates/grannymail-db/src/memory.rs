//! In-process table and blob store for tests and local runs
//!
//! Behaves like the hosted backend where callers can observe it: ids and
//! creation timestamps are generated on insert, unknown columns are rejected
//! on tables registered with a column list, nulls sort last in ascending
//! order. Every call is appended to a journal so call order can be checked.

use crate::{BlobStore, DbError, DbResult, Direction, Filter, Query, TableStore};
use chrono::{SecondsFormat, Utc};
use grannymail_core::{
    tables, Address, Attachment, Changelog, Draft, File, Message, Order, Record, Row, User,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Server-side behaviour of one table
#[derive(Debug, Clone, Default)]
pub struct TableSchema {
    /// Filled with a fresh UUID when an insert leaves it unset
    pub id_column: Option<String>,
    /// Filled with the current time when an insert leaves it unset
    pub created_column: Option<String>,
    /// Full column list; when set, other columns are rejected and missing
    /// ones are materialized as null
    pub columns: Option<Vec<String>>,
}

impl TableSchema {
    pub fn for_record<R: Record>() -> Self {
        Self {
            id_column: Some(R::ID_FIELD.to_string()),
            created_column: R::CREATED_FIELD.map(str::to_string),
            columns: None,
        }
    }

    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: Some(columns.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Upload,
    Download,
}

/// One recorded store call: operation and table name or blob path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalEntry {
    pub operation: Operation,
    pub target: String,
}

#[derive(Debug, Clone)]
struct StoredBlob {
    content_type: String,
    bytes: Vec<u8>,
}

pub struct MemoryStore {
    schemas: HashMap<String, TableSchema>,
    tables: Mutex<HashMap<String, Vec<Row>>>,
    blobs: Mutex<HashMap<String, StoredBlob>>,
    journal: Mutex<Vec<JournalEntry>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Store with every GrannyMail record table registered
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
            tables: Mutex::new(HashMap::new()),
            blobs: Mutex::new(HashMap::new()),
            journal: Mutex::new(Vec::new()),
        }
        .register::<User>()
        .register::<Message>()
        .register::<File>()
        .register::<Address>()
        .register::<Draft>()
        .register::<Order>()
        .register::<Attachment>()
        .register::<Changelog>()
        .with_table(
            tables::SYSTEM_MESSAGES,
            TableSchema::with_columns(["full_message_name"]),
        )
    }

    pub fn register<R: Record>(self) -> Self {
        self.with_table(R::TABLE, TableSchema::for_record::<R>())
    }

    pub fn with_table(mut self, table: impl Into<String>, schema: TableSchema) -> Self {
        self.schemas.insert(table.into(), schema);
        self
    }

    /// Calls made so far, oldest first
    pub async fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().await.clone()
    }

    pub async fn clear_journal(&self) {
        self.journal.lock().await.clear();
    }

    /// Current contents of `table` in insertion order
    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Content type of a stored blob
    pub async fn blob_content_type(&self, path: &str) -> Option<String> {
        self.blobs
            .lock()
            .await
            .get(path)
            .map(|blob| blob.content_type.clone())
    }

    async fn record(&self, operation: Operation, target: &str) {
        self.journal.lock().await.push(JournalEntry {
            operation,
            target: target.to_string(),
        });
    }

    fn check_columns(&self, table: &str, row: &Row) -> DbResult<()> {
        let Some(columns) = self.schemas.get(table).and_then(|s| s.columns.as_ref()) else {
            return Ok(());
        };
        match row.keys().find(|key| !columns.contains(*key)) {
            Some(unknown) => Err(DbError::Remote {
                status: 400,
                message: format!("Could not find the '{}' column of '{}'", unknown, table),
            }),
            None => Ok(()),
        }
    }

    fn materialize(&self, table: &str, mut row: Row) -> Row {
        let Some(schema) = self.schemas.get(table) else {
            return row;
        };
        if let Some(id) = &schema.id_column {
            if row.get(id).map_or(true, Value::is_null) {
                row.insert(id.clone(), Value::String(Uuid::new_v4().to_string()));
            }
        }
        if let Some(created) = &schema.created_column {
            if row.get(created).map_or(true, Value::is_null) {
                let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
                row.insert(created.clone(), Value::String(now));
            }
        }
        if let Some(columns) = &schema.columns {
            for column in columns {
                row.entry(column.clone()).or_insert(Value::Null);
            }
        }
        row
    }
}

/// Postgres default ordering: nulls after every value
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[async_trait::async_trait]
impl TableStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> DbResult<Vec<Row>> {
        self.record(Operation::Select, table).await;
        let mut rows: Vec<Row> = self
            .rows(table)
            .await
            .into_iter()
            .filter(|row| query.filter.as_ref().map_or(true, |f| f.matches(row)))
            .collect();

        if let Some((column, order)) = &query.order {
            rows.sort_by(|a, b| compare_cells(a.get(column), b.get(column)));
            // Reversing a stable ascending sort puts the latest insert first on ties
            if *order == Direction::Desc {
                rows.reverse();
            }
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, rows: Vec<Row>) -> DbResult<Vec<Row>> {
        self.record(Operation::Insert, table).await;
        for row in &rows {
            self.check_columns(table, row)?;
        }
        let rows: Vec<Row> = rows
            .into_iter()
            .map(|row| self.materialize(table, row))
            .collect();

        let mut tables = self.tables.lock().await;
        let stored = tables.entry(table.to_string()).or_default();
        if let Some(id) = self.schemas.get(table).and_then(|s| s.id_column.as_ref()) {
            for row in &rows {
                let clash = stored
                    .iter()
                    .any(|existing| existing.get(id).is_some() && existing.get(id) == row.get(id));
                if clash {
                    return Err(DbError::Remote {
                        status: 409,
                        message: format!("duplicate key value violates unique constraint on {}", id),
                    });
                }
            }
        }
        stored.extend(rows.iter().cloned());
        debug!("Inserted {} rows into memory table {}", rows.len(), table);
        Ok(rows)
    }

    async fn update(&self, table: &str, filter: &Filter, values: Row) -> DbResult<Vec<Row>> {
        self.record(Operation::Update, table).await;
        self.check_columns(table, &values)?;
        let mut tables = self.tables.lock().await;
        let mut updated = Vec::new();
        if let Some(stored) = tables.get_mut(table) {
            for row in stored.iter_mut().filter(|row| filter.matches(row)) {
                for (column, value) in &values {
                    row.insert(column.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filter: &Filter) -> DbResult<Vec<Row>> {
        self.record(Operation::Delete, table).await;
        let mut tables = self.tables.lock().await;
        let Some(stored) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };
        let (deleted, kept): (Vec<Row>, Vec<Row>) =
            stored.drain(..).partition(|row| filter.matches(row));
        *stored = kept;
        Ok(deleted)
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> DbResult<()> {
        self.record(Operation::Upload, path).await;
        self.blobs.lock().await.insert(
            path.to_string(),
            StoredBlob {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(())
    }

    async fn download(&self, path: &str) -> DbResult<Vec<u8>> {
        self.record(Operation::Download, path).await;
        self.blobs
            .lock()
            .await
            .get(path)
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| DbError::Remote {
                status: 404,
                message: format!("Object not found: {}", path),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_timestamp() {
        let store = MemoryStore::new();
        let inserted = store
            .insert("users", vec![row(&[("email", json!("a@example.com"))])])
            .await
            .unwrap();

        assert!(inserted[0].get("user_id").and_then(Value::as_str).is_some());
        assert!(inserted[0].get("created_at").and_then(Value::as_str).is_some());
        assert_eq!(store.rows("users").await.len(), 1);
    }

    #[tokio::test]
    async fn test_insert_rejects_unknown_column() {
        let store = MemoryStore::new();
        let err = store
            .insert("system_messages", vec![row(&[("bogus", json!("x"))])])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Remote { status: 400, .. }));
        assert!(store.rows("system_messages").await.is_empty());
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_primary_key() {
        let store = MemoryStore::new();
        let user = row(&[("user_id", json!("u-1"))]);
        store.insert("users", vec![user.clone()]).await.unwrap();
        let err = store.insert("users", vec![user]).await.unwrap_err();
        assert!(matches!(err, DbError::Remote { status: 409, .. }));
    }

    #[tokio::test]
    async fn test_select_orders_and_limits() {
        let store = MemoryStore::new();
        for (id, n) in [("a", 2), ("b", 1), ("c", 3)] {
            store
                .insert("scores", vec![row(&[("id", json!(id)), ("n", json!(n))])])
                .await
                .unwrap();
        }

        let asc = store
            .select("scores", &Query::all().order_by("n", Direction::Asc))
            .await
            .unwrap();
        let ids: Vec<_> = asc.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("b"), json!("a"), json!("c")]);

        let top = store
            .select("scores", &Query::all().order_by("n", Direction::Desc).limit(1))
            .await
            .unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0]["id"], json!("c"));
    }

    #[tokio::test]
    async fn test_update_and_delete_return_rows() {
        let store = MemoryStore::new();
        store
            .insert("users", vec![row(&[("user_id", json!("u-1"))])])
            .await
            .unwrap();

        let updated = store
            .update(
                "users",
                &Filter::eq("user_id", "u-1"),
                row(&[("first_name", json!("Ada"))]),
            )
            .await
            .unwrap();
        assert_eq!(updated[0]["first_name"], json!("Ada"));

        let deleted = store
            .delete("users", &Filter::eq("user_id", "u-1"))
            .await
            .unwrap();
        assert_eq!(deleted.len(), 1);
        assert!(store.rows("users").await.is_empty());

        let ops: Vec<Operation> = store.journal().await.iter().map(|e| e.operation).collect();
        assert_eq!(ops, vec![Operation::Insert, Operation::Update, Operation::Delete]);
    }

    #[tokio::test]
    async fn test_blob_round_trip_and_missing_object() {
        let store = MemoryStore::new();
        store
            .upload("memos/u/a.ogg", vec![1, 2, 3], "audio/ogg")
            .await
            .unwrap();

        assert_eq!(store.download("memos/u/a.ogg").await.unwrap(), vec![1, 2, 3]);
        assert_eq!(
            store.blob_content_type("memos/u/a.ogg").await.as_deref(),
            Some("audio/ogg")
        );
        let err = store.download("memos/u/b.ogg").await.unwrap_err();
        assert!(matches!(err, DbError::Remote { status: 404, .. }));
    }
}
