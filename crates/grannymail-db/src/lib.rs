//! Data access layer for the hosted GrannyMail database and storage bucket
//!
//! The hosted backend owns the schema and the wire protocol; this crate only
//! issues table and bucket calls and checks their row counts. Multi-step
//! operations are not transactional.

pub mod client;
pub mod memory;
pub mod queries;
pub mod remote;
pub mod store;

pub use client::*;
pub use memory::*;
pub use queries::*;
pub use remote::*;
pub use store::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("No entry found in table {table} for searching for {key} = {value}")]
    NotFound {
        table: String,
        key: String,
        value: String,
    },

    #[error("{count} entries found in table {table} with {key} = {value}, expected exactly one")]
    Ambiguous {
        table: String,
        key: String,
        value: String,
        count: usize,
    },

    #[error("Duplicate entry already exists in table {table} for {}", .fields.join(", "))]
    Duplicate { table: String, fields: Vec<String> },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Partially applied ({applied}): {source}")]
    PartiallyApplied {
        applied: String,
        #[source]
        source: Box<DbError>,
    },

    #[error("Remote store returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Tabular source error: {0:#}")]
    Source(anyhow::Error),
}

impl From<grannymail_core::UnsupportedMediaType> for DbError {
    fn from(err: grannymail_core::UnsupportedMediaType) -> Self {
        DbError::UnsupportedMediaType(err.0)
    }
}

impl DbError {
    /// Wrap an error raised after some writes already went through
    pub fn partially_applied(applied: impl Into<String>, source: DbError) -> Self {
        DbError::PartiallyApplied {
            applied: applied.into(),
            source: Box::new(source),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

pub type DbResult<T> = Result<T, DbError>;
