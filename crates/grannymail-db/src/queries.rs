//! Domain operations for the GrannyMail tables and storage bucket

use crate::client::expect_one;
use crate::{DataAccessClient, DbError, DbResult, Direction, Filter, Query, UpdateOutcome};
use chrono::Utc;
use grannymail_core::{
    blob_path, tables, Address, Attachment, Changelog, Draft, File, MediaType, Message, Order,
    Record, Row, SentBy, TabularSource, User,
};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

const SYSTEM_MESSAGE_KEY: &str = "full_message_name";
const SYSTEM_MESSAGE_SENTINEL: &str = "test";

macro_rules! record_ops {
    ($record:ty, $get:ident, $update:ident, $delete:ident) => {
        impl DataAccessClient {
            #[doc = concat!("Full `", stringify!($record), "` for a probe with at least one unique field set")]
            pub async fn $get(&self, probe: &$record) -> DbResult<$record> {
                self.get(probe).await
            }

            #[doc = concat!("Changelog and apply the fields of `update` that differ from the stored `", stringify!($record), "`")]
            pub async fn $update(&self, probe: &$record, update: &$record) -> DbResult<UpdateOutcome> {
                self.update(probe, update).await
            }

            #[doc = concat!("Delete the stored `", stringify!($record), "` by its id")]
            pub async fn $delete(&self, probe: &$record) -> DbResult<u64> {
                self.delete(probe, None).await
            }
        }
    };
}

record_ops!(User, get_user, update_user, delete_user);
record_ops!(Message, get_message, update_message, delete_message);
record_ops!(File, get_file, update_file, delete_file);
record_ops!(Address, get_address, update_address, delete_address);
record_ops!(Draft, get_draft, update_draft, delete_draft);
record_ops!(Order, get_order, update_order, delete_order);
record_ops!(Attachment, get_attachment, update_attachment, delete_attachment);
record_ops!(Changelog, get_changelog, update_changelog, delete_changelog);

/// Caller-supplied parts of a message to register
#[derive(Debug, Clone, PartialEq)]
pub struct MessageParts {
    pub sent_by: SentBy,
    pub attachment_mime_type: Option<String>,
    pub message_body: Option<String>,
    pub command: Option<String>,
    pub transcript: Option<String>,
}

impl MessageParts {
    pub fn new(sent_by: SentBy) -> Self {
        Self {
            sent_by,
            attachment_mime_type: None,
            message_body: None,
            command: None,
            transcript: None,
        }
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.message_body = Some(body.into());
        self
    }

    pub fn attachment(mut self, mime_type: impl Into<String>) -> Self {
        self.attachment_mime_type = Some(mime_type.into());
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }
}

fn require(value: &Option<String>, record: &str, field: &str, action: &str) -> DbResult<String> {
    value.clone().ok_or_else(|| {
        DbError::InvalidInput(format!(
            "{} does not have a {}. Cannot {}",
            record, field, action
        ))
    })
}

impl DataAccessClient {
    pub async fn add_user(&self, user: &User) -> DbResult<User> {
        self.add(user).await
    }

    pub async fn add_message(&self, message: &Message) -> DbResult<Message> {
        self.add(message).await
    }

    pub async fn add_file(&self, file: &File) -> DbResult<File> {
        self.add(file).await
    }

    pub async fn add_draft(&self, draft: &Draft) -> DbResult<Draft> {
        self.add(draft).await
    }

    pub async fn add_address(&self, address: &Address) -> DbResult<Address> {
        require(&address.user_id, "Address", "user_id", "add address")?;
        self.add(address).await
    }

    pub async fn add_order(&self, order: &Order) -> DbResult<Order> {
        for (field, value) in [
            ("user_id", &order.user_id),
            ("draft_id", &order.draft_id),
            ("address_id", &order.address_id),
            ("blob_path", &order.blob_path),
        ] {
            require(value, "Order", field, "add order")?;
        }
        self.add(order).await
    }

    pub async fn add_attachment(&self, attachment: &Attachment) -> DbResult<Attachment> {
        if attachment.draft_id.is_none() && attachment.message_id.is_none() {
            return Err(DbError::InvalidInput(
                "Attachment needs a draft_id or a message_id".into(),
            ));
        }
        self.add(attachment).await
    }

    async fn resolve_user_id(&self, user: &User) -> DbResult<String> {
        let user = self.get_user(user).await?;
        require(&user.user_id, "User", "user_id", "list its rows")
    }

    async fn user_rows<R: Record>(
        &self,
        user: &User,
        order_column: &str,
        order: Direction,
        limit: Option<usize>,
    ) -> DbResult<Vec<R>> {
        let user_id = self.resolve_user_id(user).await?;
        let mut query = Query::filtered(Filter::eq("user_id", user_id)).order_by(order_column, order);
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        let rows = self.tables().select(R::TABLE, &query).await?;
        debug!("Found {} {} rows for user", rows.len(), R::TABLE);
        rows.into_iter()
            .map(|row| R::from_row(row).map_err(DbError::from))
            .collect()
    }

    /// All messages of a user, oldest first
    #[instrument(skip(self, user))]
    pub async fn get_user_messages(&self, user: &User) -> DbResult<Vec<Message>> {
        self.user_rows(user, "timestamp", Direction::Asc, None).await
    }

    /// All addresses of a user, oldest first
    #[instrument(skip(self, user))]
    pub async fn get_user_addresses(&self, user: &User) -> DbResult<Vec<Address>> {
        self.user_rows(user, "created_at", Direction::Asc, None).await
    }

    /// All drafts of a user, oldest first
    #[instrument(skip(self, user))]
    pub async fn get_user_drafts(&self, user: &User) -> DbResult<Vec<Draft>> {
        self.user_rows(user, "created_at", Direction::Asc, None).await
    }

    /// Most recent draft of a user, `None` if they have none yet
    #[instrument(skip(self, user))]
    pub async fn get_last_draft(&self, user: &User) -> DbResult<Option<Draft>> {
        let drafts = self.user_rows(user, "created_at", Direction::Desc, Some(1)).await?;
        Ok(drafts.into_iter().next())
    }

    /// Most recent message of a user, `None` if they have none yet
    #[instrument(skip(self, user))]
    pub async fn get_last_user_message(&self, user: &User) -> DbResult<Option<Message>> {
        let messages = self.user_rows(user, "timestamp", Direction::Desc, Some(1)).await?;
        Ok(messages.into_iter().next())
    }

    /// Upload `bytes` for `user_id` and return the bucket path.
    ///
    /// Fails with `UnsupportedMediaType` before contacting the bucket if
    /// `mime_type` is not one of the accepted types.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_file(&self, bytes: Vec<u8>, user_id: &str, mime_type: &str) -> DbResult<String> {
        let media: MediaType = mime_type.parse()?;
        let path = blob_path(user_id, media, Utc::now());
        self.blobs().upload(&path, bytes, media.mime()).await?;
        info!(%path, "Uploaded file");
        Ok(path)
    }

    /// Bytes of a draft's rendered PDF
    #[instrument(skip(self, draft))]
    pub async fn download_draft(&self, draft: &Draft) -> DbResult<Vec<u8>> {
        let path = draft.blob_path.as_deref().ok_or_else(|| {
            DbError::InvalidState("Draft does not have a blob_path. Cannot download draft".into())
        })?;
        self.blobs().download(path).await
    }

    /// Insert a message from `parts` on behalf of `user`
    #[instrument(skip(self, user, parts), fields(sent_by = ?parts.sent_by))]
    pub async fn register_message(&self, user: &User, parts: MessageParts) -> DbResult<Message> {
        let user_id = require(&user.user_id, "User", "user_id", "register message")?;
        let message = Message {
            user_id: Some(user_id),
            sent_by: Some(parts.sent_by),
            message_body: parts.message_body,
            attachment_mime_type: parts.attachment_mime_type,
            command: parts.command,
            transcript: parts.transcript,
            ..Default::default()
        };
        self.add_message(&message).await
    }

    /// Store a voice memo and link it to `message` with a `files` row.
    ///
    /// If the row insert fails the blob stays in the bucket and the error is
    /// reported as `PartiallyApplied`.
    #[instrument(skip(self, bytes, message), fields(size = bytes.len()))]
    pub async fn register_voice_message(&self, bytes: Vec<u8>, message: &Message) -> DbResult<File> {
        let user_id = require(&message.user_id, "Message", "user_id", "register voice memo")?;
        let message_id = require(&message.message_id, "Message", "message_id", "register voice memo")?;

        let media = MediaType::OggAudio;
        let path = self.upload_file(bytes, &user_id, media.mime()).await?;
        let file = File {
            message_id: Some(message_id),
            mime_type: Some(media.mime().to_string()),
            blob_path: Some(path.clone()),
            ..Default::default()
        };
        match self.add_file(&file).await {
            Ok(file) => Ok(file),
            Err(err) => {
                warn!(%path, "voice memo uploaded but file row not written");
                Err(DbError::partially_applied(format!("uploaded {}", path), err))
            }
        }
    }

    /// Store a rendered PDF and insert the draft pointing at it
    #[instrument(skip(self, draft, pdf_bytes), fields(size = pdf_bytes.len()))]
    pub async fn register_draft(&self, draft: &Draft, pdf_bytes: Vec<u8>) -> DbResult<Draft> {
        let user_id = require(&draft.user_id, "Draft", "user_id", "register draft")?;

        let path = self.upload_file(pdf_bytes, &user_id, MediaType::Pdf.mime()).await?;
        let draft = Draft {
            blob_path: Some(path.clone()),
            ..draft.clone()
        };
        match self.add_draft(&draft).await {
            Ok(draft) => Ok(draft),
            Err(err) => {
                warn!(%path, "draft uploaded but draft row not written");
                Err(DbError::partially_applied(format!("uploaded {}", path), err))
            }
        }
    }

    /// Replace the contents of `system_messages` with `source`, keeping only
    /// columns the table has. Returns the number of rows inserted.
    ///
    /// The source is read and checked before anything is written. Errors
    /// after the sentinel insert are `PartiallyApplied` and say whether the
    /// table was already cleared.
    #[instrument(skip(self, source))]
    pub async fn update_system_messages(&self, source: &dyn TabularSource) -> DbResult<usize> {
        let table = tables::SYSTEM_MESSAGES;

        let sheet = source.fetch().await.map_err(DbError::Source)?;
        if !sheet.columns.iter().any(|c| c == SYSTEM_MESSAGE_KEY) {
            return Err(DbError::InvalidInput(format!(
                "message sheet has no {} column",
                SYSTEM_MESSAGE_KEY
            )));
        }

        // An empty table reports no columns, so read them off a sentinel row
        let mut sentinel = Row::new();
        sentinel.insert(
            SYSTEM_MESSAGE_KEY.into(),
            Value::String(SYSTEM_MESSAGE_SENTINEL.into()),
        );
        self.tables().insert(table, vec![sentinel]).await?;
        let sentinel_written = |err: DbError| {
            DbError::partially_applied(format!("sentinel row inserted into {}", table), err)
        };

        let probe = self
            .tables()
            .select(
                table,
                &Query::filtered(Filter::eq(SYSTEM_MESSAGE_KEY, SYSTEM_MESSAGE_SENTINEL))
                    .limit(1),
            )
            .await
            .map_err(sentinel_written)?;
        let columns: Vec<String> = probe
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        if !columns.iter().any(|c| c == SYSTEM_MESSAGE_KEY) {
            return Err(sentinel_written(DbError::InvalidState(format!(
                "{} is missing the {} column",
                table, SYSTEM_MESSAGE_KEY
            ))));
        }

        let cleared = self
            .tables()
            .delete(table, &Filter::neq(SYSTEM_MESSAGE_KEY, ""))
            .await
            .map_err(sentinel_written)?;
        debug!("Cleared {} rows from {}", cleared.len(), table);

        let rows = sheet.project(&columns);
        if rows.is_empty() {
            info!("Tabular source is empty; {} left empty", table);
            return Ok(0);
        }
        let inserted = match self.tables().insert(table, rows).await {
            Ok(inserted) => inserted,
            Err(err) => {
                warn!(cleared = cleared.len(), "system messages cleared but not refilled");
                return Err(DbError::partially_applied(
                    format!("{} cleared, new rows not inserted", table),
                    err,
                ));
            }
        };
        info!(count = inserted.len(), "Refreshed system messages");
        Ok(inserted.len())
    }

    /// System message `name` in the configured message column
    pub async fn get_system_message(&self, name: &str) -> DbResult<String> {
        let column = self.message_column().to_string();
        self.get_system_message_in(name, &column).await
    }

    /// System message `name` in `column`
    #[instrument(skip(self))]
    pub async fn get_system_message_in(&self, name: &str, column: &str) -> DbResult<String> {
        let table = tables::SYSTEM_MESSAGES;
        let mut rows = self
            .tables()
            .select(table, &Query::filtered(Filter::eq(SYSTEM_MESSAGE_KEY, name)))
            .await?;
        let row = expect_one(&mut rows, table, SYSTEM_MESSAGE_KEY, name)?;
        match row.get(column) {
            Some(Value::String(text)) => Ok(text.clone()),
            Some(other) => Err(DbError::InvalidState(format!(
                "system message {} has no text in column {} (found {})",
                name, column, other
            ))),
            None => Err(DbError::InvalidState(format!(
                "{} has no column {}",
                table, column
            ))),
        }
    }
}
