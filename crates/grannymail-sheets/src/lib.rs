use anyhow::{Context, Result};
#[cfg(feature = "google")]
pub mod google;

use std::path::{Path, PathBuf};

use grannymail_core::{SheetTable, TabularSource};

/// Fixed table held in memory
pub struct StaticSheet {
    table: SheetTable,
}

impl StaticSheet {
    pub fn new(table: SheetTable) -> Self {
        Self { table }
    }
}

#[async_trait::async_trait]
impl TabularSource for StaticSheet {
    async fn fetch(&self) -> Result<SheetTable> {
        Ok(self.table.clone())
    }
}

/// Table exported to a JSON file as `{"columns": [...], "rows": [[...]]}`
pub struct JsonFileSheet {
    path: PathBuf,
}

impl JsonFileSheet {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait::async_trait]
impl TabularSource for JsonFileSheet {
    async fn fetch(&self) -> Result<SheetTable> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading {}", self.path.display()))?;
        let table: SheetTable = serde_json::from_str(&text)
            .with_context(|| format!("parsing {}", self.path.display()))?;
        tracing::debug!(rows = table.rows.len(), path = %self.path.display(), "Loaded sheet file");
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn reads_json_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.json");
        std::fs::write(
            &path,
            r#"{"columns":["full_message_name","english"],"rows":[["welcome","Hello"]]}"#,
        )
        .unwrap();

        let table = JsonFileSheet::new(&path).fetch().await.unwrap();
        assert_eq!(table.columns, vec!["full_message_name", "english"]);
        assert_eq!(table.rows, vec![vec![json!("welcome"), json!("Hello")]]);
    }

    #[tokio::test]
    async fn missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonFileSheet::new(dir.path().join("absent.json"))
            .fetch()
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("absent.json"));
    }

    #[tokio::test]
    async fn static_sheet_returns_table() {
        let table = SheetTable {
            columns: vec!["full_message_name".into()],
            rows: vec![vec![json!("welcome")]],
        };
        let fetched = StaticSheet::new(table.clone()).fetch().await.unwrap();
        assert_eq!(fetched, table);
    }
}
