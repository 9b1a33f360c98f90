use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Row;

/// Row-oriented dataset with named columns, as read from a spreadsheet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl SheetTable {
    /// Build from raw cell rows where the first row is the header.
    ///
    /// Short rows are padded with nulls and empty string cells become null.
    pub fn from_header_rows(mut raw: Vec<Vec<Value>>) -> Self {
        if raw.is_empty() {
            return Self::default();
        }
        let columns: Vec<String> = raw
            .remove(0)
            .into_iter()
            .map(|cell| match cell {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            })
            .collect();
        let width = columns.len();
        let rows = raw
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Null);
                row.into_iter()
                    .map(|cell| match cell {
                        Value::String(s) if s.is_empty() => Value::Null,
                        other => other,
                    })
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Rows restricted to the columns named in `keep`, in sheet column order
    pub fn project(&self, keep: &[String]) -> Vec<Row> {
        let selected: Vec<(usize, &String)> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| keep.contains(name))
            .collect();
        self.rows
            .iter()
            .map(|row| {
                selected
                    .iter()
                    .map(|(idx, name)| {
                        let cell = row.get(*idx).cloned().unwrap_or(Value::Null);
                        ((*name).clone(), cell)
                    })
                    .collect()
            })
            .collect()
    }
}

/// External tabular dataset consumed by the system message refresh
#[async_trait::async_trait]
pub trait TabularSource: Send + Sync {
    async fn fetch(&self) -> Result<SheetTable>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_header_rows_pads_and_nulls() {
        let table = SheetTable::from_header_rows(vec![
            vec![json!("full_message_name"), json!("english"), json!("german")],
            vec![json!("welcome"), json!("Hello")],
            vec![json!("bye"), json!(""), json!("Tschüss")],
        ]);

        assert_eq!(table.columns, vec!["full_message_name", "english", "german"]);
        assert_eq!(table.rows[0], vec![json!("welcome"), json!("Hello"), Value::Null]);
        assert_eq!(table.rows[1][1], Value::Null);
    }

    #[test]
    fn test_project_keeps_intersection() {
        let table = SheetTable {
            columns: vec!["full_message_name".into(), "notes".into(), "english".into()],
            rows: vec![vec![json!("welcome"), json!("internal"), json!("Hello")]],
        };
        let keep = vec!["english".to_string(), "full_message_name".to_string(), "id".to_string()];
        let rows = table.project(&keep);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 2);
        assert_eq!(rows[0].get("english"), Some(&json!("Hello")));
        assert!(rows[0].get("notes").is_none());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(SheetTable::from_header_rows(Vec::new()), SheetTable::default());
    }
}
