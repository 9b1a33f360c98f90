use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use grannymail_core::{DEFAULT_BUCKET, DEFAULT_MESSAGE_COLUMN};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SHEET_RANGE: &str = "messages";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    /// Service role key, not the anon key
    pub key: Option<String>,
    pub bucket: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessagesConfig {
    pub sheet_id: Option<String>,
    pub range: Option<String>,
    pub message_column: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    pub format: Option<LogFormat>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub supabase: SupabaseConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),
}

impl AppConfig {
    /// Load from the GRANNYMAIL_CONFIG path (TOML) if present, then apply
    /// environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("GRANNYMAIL_CONFIG").unwrap_or_else(|_| "grannymail.toml".to_string());
        let mut cfg = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            AppConfig::default()
        };
        cfg.apply_env(|name| std::env::var(name).ok());
        Ok(cfg)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Ok(toml::from_str::<AppConfig>(&s)?)
    }

    /// Override file values with whatever `lookup` returns for the known
    /// variable names
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |slot: &mut Option<String>, name: &str| {
            if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                *slot = Some(value);
            }
        };
        set(&mut self.supabase.url, "SUPABASE_URL");
        set(&mut self.supabase.key, "SUPABASE_KEY");
        set(&mut self.supabase.bucket, "SUPABASE_BUCKET_NAME");
        set(&mut self.messages.sheet_id, "MESSAGES_SHEET_ID");
        set(&mut self.messages.message_column, "MESSAGES_SHEET_NAME");
        set(&mut self.messages.api_key, "GOOGLE_API_KEY");
    }

    pub fn supabase_url(&self) -> Result<&str, ConfigError> {
        self.supabase
            .url
            .as_deref()
            .ok_or(ConfigError::Missing("supabase.url / SUPABASE_URL"))
    }

    pub fn supabase_key(&self) -> Result<&str, ConfigError> {
        self.supabase
            .key
            .as_deref()
            .ok_or(ConfigError::Missing("supabase.key / SUPABASE_KEY"))
    }

    /// Bucket name (default "grannymail")
    pub fn bucket(&self) -> &str {
        self.supabase.bucket.as_deref().unwrap_or(DEFAULT_BUCKET)
    }

    /// Request timeout (default 30s)
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.supabase
                .request_timeout_secs
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn sheet_id(&self) -> Result<&str, ConfigError> {
        self.messages
            .sheet_id
            .as_deref()
            .ok_or(ConfigError::Missing("messages.sheet_id / MESSAGES_SHEET_ID"))
    }

    pub fn sheets_api_key(&self) -> Result<&str, ConfigError> {
        self.messages
            .api_key
            .as_deref()
            .ok_or(ConfigError::Missing("messages.api_key / GOOGLE_API_KEY"))
    }

    pub fn sheet_range(&self) -> &str {
        self.messages.range.as_deref().unwrap_or(DEFAULT_SHEET_RANGE)
    }

    /// Column of the system messages table shown to users (default "english")
    pub fn message_column(&self) -> &str {
        self.messages
            .message_column
            .as_deref()
            .unwrap_or(DEFAULT_MESSAGE_COLUMN)
    }

    pub fn log_format(&self) -> LogFormat {
        self.logging.format.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.bucket(), "grannymail");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.sheet_range(), "messages");
        assert_eq!(cfg.message_column(), "english");
        assert_eq!(cfg.log_format(), LogFormat::Pretty);
        assert!(matches!(cfg.supabase_url(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grannymail.toml");
        fs::write(
            &path,
            r#"
[supabase]
url = "https://proj.supabase.co"
key = "service"
request_timeout_secs = 5

[messages]
sheet_id = "abc"
message_column = "german"

[logging]
format = "json"
"#,
        )
        .unwrap();

        let cfg = AppConfig::from_file(&path).unwrap();
        assert_eq!(cfg.supabase_url().unwrap(), "https://proj.supabase.co");
        assert_eq!(cfg.supabase_key().unwrap(), "service");
        assert_eq!(cfg.request_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.sheet_id().unwrap(), "abc");
        assert_eq!(cfg.message_column(), "german");
        assert_eq!(cfg.log_format(), LogFormat::Json);
    }

    #[test]
    fn rejects_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[supabase\nurl = ").unwrap();
        assert!(matches!(AppConfig::from_file(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = AppConfig::default();
        cfg.supabase.url = Some("https://file.supabase.co".into());
        cfg.supabase.bucket = Some("from-file".into());

        let env: HashMap<&str, &str> = [
            ("SUPABASE_URL", "https://env.supabase.co"),
            ("SUPABASE_KEY", "env-key"),
            ("SUPABASE_BUCKET_NAME", ""),
        ]
        .into_iter()
        .collect();
        cfg.apply_env(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(cfg.supabase_url().unwrap(), "https://env.supabase.co");
        assert_eq!(cfg.supabase_key().unwrap(), "env-key");
        assert_eq!(cfg.bucket(), "from-file");
    }
}
