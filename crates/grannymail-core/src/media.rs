//! Supported blob media types and bucket path layout

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Blob content types accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Telegram voice memo
    OggAudio,
    /// Rendered letter
    Pdf,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mime type {0} not supported for file upload")]
pub struct UnsupportedMediaType(pub String);

impl MediaType {
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::OggAudio => "audio/ogg",
            MediaType::Pdf => "application/pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::OggAudio => "ogg",
            MediaType::Pdf => "pdf",
        }
    }
}

impl FromStr for MediaType {
    type Err = UnsupportedMediaType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio/ogg" => Ok(MediaType::OggAudio),
            "application/pdf" => Ok(MediaType::Pdf),
            other => Err(UnsupportedMediaType(other.to_string())),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Bucket path for a user's upload: `memos/<user_id>/<UTC second>.<ext>`.
///
/// Two uploads by the same user within one second map to the same path and
/// the later one overwrites the earlier.
pub fn blob_path(user_id: &str, media: MediaType, at: DateTime<Utc>) -> String {
    format!(
        "memos/{}/{}.{}",
        user_id,
        at.format("%Y-%m-%d_%H-%M-%S"),
        media.extension()
    )
}
