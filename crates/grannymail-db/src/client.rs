//! Data access client and the generic record contracts

use crate::{BlobStore, DbError, DbResult, Filter, Query, RemoteStore, TableStore};
use chrono::Utc;
use grannymail_core::{
    changed_fields, display_value, Changelog, KeyValue, Record, Row, DEFAULT_MESSAGE_COLUMN,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Result of an update call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The stored row already matched; nothing was written
    Unchanged,
    /// These columns were changelogged and written
    Updated { fields: Vec<String> },
}

impl UpdateOutcome {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, UpdateOutcome::Unchanged)
    }
}

/// Typed access to the GrannyMail tables and storage bucket.
///
/// Every call goes to the remote store; nothing is cached between calls.
#[derive(Clone)]
pub struct DataAccessClient {
    tables: Arc<dyn TableStore>,
    blobs: Arc<dyn BlobStore>,
    message_column: String,
}

impl DataAccessClient {
    pub fn new(tables: Arc<dyn TableStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            tables,
            blobs,
            message_column: DEFAULT_MESSAGE_COLUMN.to_string(),
        }
    }

    /// Client backed by a hosted project
    pub fn remote(store: RemoteStore) -> Self {
        let store = Arc::new(store);
        Self::new(store.clone(), store)
    }

    /// Column of `system_messages` returned by `get_system_message`
    pub fn with_message_column(mut self, column: impl Into<String>) -> Self {
        self.message_column = column.into();
        self
    }

    pub fn message_column(&self) -> &str {
        &self.message_column
    }

    pub(crate) fn tables(&self) -> &dyn TableStore {
        self.tables.as_ref()
    }

    pub(crate) fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    /// Fetch the single row of `R::TABLE` matching the probe's first
    /// populated unique field
    #[instrument(skip(self, probe), fields(table = R::TABLE))]
    pub async fn get<R: Record>(&self, probe: &R) -> DbResult<R> {
        let key = probe.lookup_key()?.ok_or_else(|| {
            DbError::InvalidInput(format!(
                "{} record has none of the unique fields {:?} set",
                R::TABLE,
                R::UNIQUE_FIELDS
            ))
        })?;
        let row = self.fetch_one(R::TABLE, &key).await?;
        Ok(R::from_row(row)?)
    }

    pub(crate) async fn fetch_one(&self, table: &str, key: &KeyValue) -> DbResult<Row> {
        let mut rows = self
            .tables
            .select(table, &Query::filtered(Filter::eq(key.column, key.value.clone())))
            .await?;
        expect_one(&mut rows, table, key.column, &display_value(&key.value))
    }

    /// Insert `record` unless one of its populated unique fields is taken
    #[instrument(skip(self, record), fields(table = R::TABLE))]
    pub async fn add<R: Record>(&self, record: &R) -> DbResult<R> {
        let mut duplicated = Vec::new();
        for key in record.unique_values()? {
            let existing = self
                .tables
                .select(R::TABLE, &Query::filtered(Filter::eq(key.column, key.value)).limit(1))
                .await?;
            if !existing.is_empty() {
                duplicated.push(key.column.to_string());
            }
        }
        if !duplicated.is_empty() {
            return Err(DbError::Duplicate {
                table: R::TABLE.to_string(),
                fields: duplicated,
            });
        }

        let mut inserted = self.tables.insert(R::TABLE, vec![record.to_row()?]).await?;
        if inserted.len() != 1 {
            return Err(DbError::UnexpectedResponse(format!(
                "insert into {} returned {} rows",
                R::TABLE,
                inserted.len()
            )));
        }
        let row = inserted.remove(0);
        debug!("Inserted row into {}", R::TABLE);
        Ok(R::from_row(row)?)
    }

    /// Diff `update` against the stored record found via `probe`, changelog
    /// every differing field, then write the differing fields.
    ///
    /// The changelog rows and the update are separate calls; a failure after
    /// the first changelog row surfaces as `PartiallyApplied`.
    #[instrument(skip(self, probe, update), fields(table = R::TABLE))]
    pub async fn update<R: Record>(&self, probe: &R, update: &R) -> DbResult<UpdateOutcome> {
        let current = self.get(probe).await?;
        let row_id = current
            .id()
            .ok_or_else(|| {
                DbError::InvalidState(format!("stored {} row has no {}", R::TABLE, R::ID_FIELD))
            })?
            .to_string();

        let changes = changed_fields(&current.to_row()?, &update.to_row()?);
        if changes.is_empty() {
            debug!("No fields changed for {} {}", R::TABLE, row_id);
            return Ok(UpdateOutcome::Unchanged);
        }

        let timestamp = Utc::now();
        for (written, change) in changes.iter().enumerate() {
            let entry = Changelog::for_change(R::TABLE, &row_id, change, timestamp);
            if let Err(err) = self.add_changelog(&entry).await {
                return Err(partial(written, err, &row_id));
            }
        }

        let values: Row = changes
            .iter()
            .map(|change| (change.column.clone(), change.new.clone()))
            .collect();
        let filter = Filter::eq(R::ID_FIELD, row_id.clone());
        if let Err(err) = self.tables.update(R::TABLE, &filter, values).await {
            return Err(partial(changes.len(), err, &row_id));
        }

        let fields: Vec<String> = changes.into_iter().map(|change| change.column).collect();
        debug!("Updated {} fields of {} {}", fields.len(), R::TABLE, row_id);
        Ok(UpdateOutcome::Updated { fields })
    }

    /// Delete the row identified by `probe`.
    ///
    /// Without `key` the row is resolved by lookup and deleted by its id;
    /// with `key` the probe's value for that column is used as is.
    #[instrument(skip(self, probe), fields(table = R::TABLE))]
    pub async fn delete<R: Record>(&self, probe: &R, key: Option<&str>) -> DbResult<u64> {
        let (column, value) = match key {
            Some(column) => {
                let value = probe.to_row()?.remove(column).ok_or_else(|| {
                    DbError::InvalidInput(format!(
                        "{} record has no value for deletion key {}",
                        R::TABLE,
                        column
                    ))
                })?;
                (column.to_string(), value)
            }
            None => {
                let stored = self.get(probe).await?;
                let id = stored.id().ok_or_else(|| {
                    DbError::InvalidState(format!("stored {} row has no {}", R::TABLE, R::ID_FIELD))
                })?;
                (R::ID_FIELD.to_string(), id.into())
            }
        };

        let deleted = self
            .tables
            .delete(R::TABLE, &Filter::Eq(column.clone(), value.clone()))
            .await?;
        if deleted.is_empty() {
            return Err(DbError::NotFound {
                table: R::TABLE.to_string(),
                key: column,
                value: display_value(&value),
            });
        }
        debug!("Deleted {} rows from {}", deleted.len(), R::TABLE);
        Ok(deleted.len() as u64)
    }

    /// Append an audit row without any duplicate check
    pub async fn add_changelog(&self, changelog: &Changelog) -> DbResult<Changelog> {
        let mut inserted = self
            .tables
            .insert(Changelog::TABLE, vec![changelog.to_row()?])
            .await?;
        match inserted.len() {
            1 => Ok(Changelog::from_row(inserted.remove(0))?),
            n => Err(DbError::UnexpectedResponse(format!(
                "changelog insert returned {} rows",
                n
            ))),
        }
    }
}

fn partial(written: usize, err: DbError, row_id: &str) -> DbError {
    if written == 0 {
        return err;
    }
    warn!(row_id, written, "update failed after writing changelog rows");
    DbError::partially_applied(format!("{} changelog rows written for {}", written, row_id), err)
}

/// Take the only row of `rows`, failing on zero or several
pub(crate) fn expect_one(rows: &mut Vec<Row>, table: &str, key: &str, value: &str) -> DbResult<Row> {
    match rows.len() {
        1 => Ok(rows.remove(0)),
        0 => Err(DbError::NotFound {
            table: table.to_string(),
            key: key.to_string(),
            value: value.to_string(),
        }),
        count => Err(DbError::Ambiguous {
            table: table.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            count,
        }),
    }
}
