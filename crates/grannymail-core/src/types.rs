//! Table records for the GrannyMail schema
//!
//! Field names must match the hosted table columns exactly; decoding rejects
//! any column not declared here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Record;

/// Table names in the hosted database
pub mod tables {
    pub const USERS: &str = "users";
    pub const MESSAGES: &str = "messages";
    pub const FILES: &str = "files";
    pub const ADDRESSES: &str = "addresses";
    pub const DRAFTS: &str = "drafts";
    pub const ORDERS: &str = "orders";
    pub const ATTACHMENTS: &str = "attachments";
    pub const CHANGELOG: &str = "changelog";
    pub const SYSTEM_MESSAGES: &str = "system_messages";
}

/// Storage bucket used when none is configured
pub const DEFAULT_BUCKET: &str = "grannymail";

/// Column of `system_messages` shown to users when none is configured
pub const DEFAULT_MESSAGE_COLUMN: &str = "english";

/// Who sent a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentBy {
    User,
    Bot,
}

/// A registered bot user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct User {
    pub user_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub telegram_id: Option<String>,
    /// Free-form instructions used when drafting letters for this user
    pub prompt: Option<String>,
}

impl Record for User {
    const TABLE: &'static str = tables::USERS;
    const ID_FIELD: &'static str = "user_id";
    const UNIQUE_FIELDS: &'static [&'static str] =
        &["user_id", "email", "phone_number", "telegram_id"];
    const CREATED_FIELD: Option<&'static str> = Some("created_at");

    fn id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

/// A message exchanged between a user and the bot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Message {
    pub message_id: Option<String>,
    pub user_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub sent_by: Option<SentBy>,
    pub message_body: Option<String>,
    pub attachment_mime_type: Option<String>,
    pub command: Option<String>,
    pub transcript: Option<String>,
}

impl Record for Message {
    const TABLE: &'static str = tables::MESSAGES;
    const ID_FIELD: &'static str = "message_id";
    const UNIQUE_FIELDS: &'static [&'static str] = &["message_id"];
    const CREATED_FIELD: Option<&'static str> = Some("timestamp");

    fn id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }
}

/// Metadata for a blob attached to a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct File {
    pub file_id: Option<String>,
    pub message_id: Option<String>,
    pub mime_type: Option<String>,
    pub blob_path: Option<String>,
}

impl Record for File {
    const TABLE: &'static str = tables::FILES;
    const ID_FIELD: &'static str = "file_id";
    const UNIQUE_FIELDS: &'static [&'static str] = &["file_id", "blob_path"];

    fn id(&self) -> Option<&str> {
        self.file_id.as_deref()
    }
}

/// Postal address saved by a user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Address {
    pub address_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub user_id: Option<String>,
    pub addressee: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub zip: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
}

impl Record for Address {
    const TABLE: &'static str = tables::ADDRESSES;
    const ID_FIELD: &'static str = "address_id";
    const UNIQUE_FIELDS: &'static [&'static str] = &["address_id"];
    const CREATED_FIELD: Option<&'static str> = Some("created_at");

    fn id(&self) -> Option<&str> {
        self.address_id.as_deref()
    }
}

/// A letter draft rendered to PDF
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Draft {
    pub draft_id: Option<String>,
    pub user_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub text: Option<String>,
    pub blob_path: Option<String>,
    pub address_id: Option<String>,
}

impl Record for Draft {
    const TABLE: &'static str = tables::DRAFTS;
    const ID_FIELD: &'static str = "draft_id";
    const UNIQUE_FIELDS: &'static [&'static str] = &["draft_id", "blob_path"];
    const CREATED_FIELD: Option<&'static str> = Some("created_at");

    fn id(&self) -> Option<&str> {
        self.draft_id.as_deref()
    }
}

/// A print-and-post order for a draft
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Order {
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    pub draft_id: Option<String>,
    pub address_id: Option<String>,
    pub blob_path: Option<String>,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Order {
    const TABLE: &'static str = tables::ORDERS;
    const ID_FIELD: &'static str = "order_id";
    const UNIQUE_FIELDS: &'static [&'static str] = &["order_id"];
    const CREATED_FIELD: Option<&'static str> = Some("created_at");

    fn id(&self) -> Option<&str> {
        self.order_id.as_deref()
    }
}

/// A blob linked to either a draft or a message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Attachment {
    pub attachment_id: Option<String>,
    pub draft_id: Option<String>,
    pub message_id: Option<String>,
    pub blob_path: Option<String>,
    pub mime_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Attachment {
    const TABLE: &'static str = tables::ATTACHMENTS;
    const ID_FIELD: &'static str = "attachment_id";
    const UNIQUE_FIELDS: &'static [&'static str] = &["attachment_id"];
    const CREATED_FIELD: Option<&'static str> = Some("created_at");

    fn id(&self) -> Option<&str> {
        self.attachment_id.as_deref()
    }
}

/// One field-level change written ahead of an update
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Changelog {
    pub changelog_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub table_name: Option<String>,
    pub row_id: Option<String>,
    pub column_name: Option<String>,
    pub column_type: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl Record for Changelog {
    const TABLE: &'static str = tables::CHANGELOG;
    const ID_FIELD: &'static str = "changelog_id";
    const UNIQUE_FIELDS: &'static [&'static str] = &["changelog_id"];

    fn id(&self) -> Option<&str> {
        self.changelog_id.as_deref()
    }
}
