//! Core record types, field diffing and media handling for GrannyMail
//!
//! This crate holds the statically declared records that mirror the hosted
//! database tables, plus the small pieces of logic shared by every store
//! implementation: row conversion, unique-key selection and change detection.

pub mod diff;
pub mod media;
pub mod record;
pub mod source;
pub mod types;

pub use diff::*;
pub use media::*;
pub use record::*;
pub use source::*;
pub use types::*;
