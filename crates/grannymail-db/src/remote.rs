//! HTTP driver for the hosted backend: PostgREST tables and storage objects

use crate::{BlobStore, DbError, DbResult, Direction, Filter, Query, TableStore};
use grannymail_core::{display_value, Row, DEFAULT_BUCKET};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

const REST_PATH: &str = "rest/v1/";
const STORAGE_PATH: &str = "storage/v1/object/";

/// Client for one hosted project, reused for the lifetime of the process
#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: Url,
    bucket: String,
}

impl RemoteStore {
    /// Create a store with default options
    pub fn new(url: &str, key: &str, bucket: impl Into<String>) -> DbResult<Self> {
        RemoteStoreBuilder::new(url, key).bucket(bucket).build()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn table_url(&self, table: &str) -> DbResult<Url> {
        Ok(self.base_url.join(REST_PATH)?.join(table)?)
    }

    /// Object URL with every path segment percent-encoded on its own, so
    /// `#` and `?` stay part of the key
    fn object_url(&self, path: &str) -> DbResult<Url> {
        let segments: Vec<&str> = path.split('/').collect();
        if segments
            .iter()
            .any(|segment| matches!(*segment, "" | "." | ".."))
        {
            return Err(DbError::InvalidInput(format!(
                "blob path {:?} has an empty or relative segment",
                path
            )));
        }
        let mut url = self.base_url.join(STORAGE_PATH)?;
        url.path_segments_mut()
            .map_err(|_| DbError::InvalidInput("project URL cannot hold a path".into()))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(segments);
        Ok(url)
    }

    /// Full select URL for `table` and `query`
    pub fn select_url(&self, table: &str, query: &Query) -> DbResult<Url> {
        let mut url = self.table_url(table)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            if let Some(filter) = &query.filter {
                let (column, expr) = filter_param(filter);
                pairs.append_pair(column, &expr);
            }
            if let Some((column, order)) = &query.order {
                let dir = match order {
                    Direction::Asc => "asc",
                    Direction::Desc => "desc",
                };
                pairs.append_pair("order", &format!("{}.{}", column, dir));
            }
            if let Some(limit) = query.limit {
                pairs.append_pair("limit", &limit.to_string());
            }
        }
        Ok(url)
    }

    fn filtered_url(&self, table: &str, filter: &Filter) -> DbResult<Url> {
        let mut url = self.table_url(table)?;
        let (column, expr) = filter_param(filter);
        url.query_pairs_mut().append_pair(column, &expr);
        Ok(url)
    }

    fn returning(request: RequestBuilder) -> RequestBuilder {
        request.header("Prefer", "return=representation")
    }

    async fn rows(response: Response) -> DbResult<Vec<Row>> {
        let response = check_status(response).await?;
        let body: Value = response.json().await?;
        match body {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    other => Err(DbError::UnexpectedResponse(format!(
                        "expected a row object, got {}",
                        other
                    ))),
                })
                .collect(),
            other => Err(DbError::UnexpectedResponse(format!(
                "expected an array of rows, got {}",
                other
            ))),
        }
    }
}

#[async_trait::async_trait]
impl TableStore for RemoteStore {
    #[instrument(skip(self))]
    async fn select(&self, table: &str, query: &Query) -> DbResult<Vec<Row>> {
        let url = self.select_url(table, query)?;
        let rows = Self::rows(self.client.get(url).send().await?).await?;
        debug!("Selected {} rows from {}", rows.len(), table);
        Ok(rows)
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn insert(&self, table: &str, rows: Vec<Row>) -> DbResult<Vec<Row>> {
        let url = self.table_url(table)?;
        let request = Self::returning(self.client.post(url)).json(&rows);
        let inserted = Self::rows(request.send().await?).await?;
        debug!("Inserted {} rows into {}", inserted.len(), table);
        Ok(inserted)
    }

    #[instrument(skip(self, values))]
    async fn update(&self, table: &str, filter: &Filter, values: Row) -> DbResult<Vec<Row>> {
        let url = self.filtered_url(table, filter)?;
        let request = Self::returning(self.client.patch(url)).json(&values);
        let updated = Self::rows(request.send().await?).await?;
        debug!("Updated {} rows in {}", updated.len(), table);
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete(&self, table: &str, filter: &Filter) -> DbResult<Vec<Row>> {
        let url = self.filtered_url(table, filter)?;
        let deleted = Self::rows(Self::returning(self.client.delete(url)).send().await?).await?;
        debug!("Deleted {} rows from {}", deleted.len(), table);
        Ok(deleted)
    }
}

#[async_trait::async_trait]
impl BlobStore for RemoteStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> DbResult<()> {
        let url = self.object_url(path)?;
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            // same-second uploads share a path; the later one wins
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        check_status(response).await?;
        debug!("Uploaded {} to bucket {}", path, self.bucket);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn download(&self, path: &str) -> DbResult<Vec<u8>> {
        let url = self.object_url(path)?;
        let response = check_status(self.client.get(url).send().await?).await?;
        let bytes = response.bytes().await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), path);
        Ok(bytes.to_vec())
    }
}

/// Query parameter for a filter in PostgREST operator syntax
pub fn filter_param(filter: &Filter) -> (&str, String) {
    match filter {
        Filter::Eq(column, Value::Null) => (column.as_str(), "is.null".to_string()),
        Filter::Neq(column, Value::Null) => (column.as_str(), "not.is.null".to_string()),
        Filter::Eq(column, value) => (column.as_str(), format!("eq.{}", display_value(value))),
        Filter::Neq(column, value) => (column.as_str(), format!("neq.{}", display_value(value))),
    }
}

async fn check_status(response: Response) -> DbResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(DbError::Remote {
        status: status.as_u16(),
        message,
    })
}

/// Build a [`RemoteStore`] from project URL, service key and options
pub struct RemoteStoreBuilder {
    url: String,
    key: String,
    bucket: String,
    timeout: Option<Duration>,
}

impl RemoteStoreBuilder {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            timeout: None,
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Per-request timeout; without one a call waits as long as the server does
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> DbResult<RemoteStore> {
        if self.key.is_empty() {
            return Err(DbError::InvalidInput("service key must not be empty".into()));
        }

        // A trailing slash keeps Url::join from replacing the last path segment
        let mut base = self.url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(&self.key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", self.key))?);

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(RemoteStore {
            client: builder.build()?,
            base_url,
            bucket: self.bucket,
        })
    }
}

fn header_value(value: &str) -> DbResult<HeaderValue> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| DbError::InvalidInput("service key contains invalid characters".into()))?;
    header.set_sensitive(true);
    Ok(header)
}
