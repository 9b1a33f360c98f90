//! Field-level change detection between a stored row and an update

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::{display_value, json_type_name, Changelog, Row};

/// A single column whose value differs between the stored row and an update
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub column: String,
    pub old: Value,
    pub new: Value,
}

/// Columns set in `update` whose value differs from `current`.
///
/// Columns left unset in the update are never reported, so a sparse update
/// only touches what it names. Output is ordered by column name.
pub fn changed_fields(current: &Row, update: &Row) -> Vec<FieldChange> {
    let mut changes: Vec<FieldChange> = update
        .iter()
        .filter(|(_, new)| !new.is_null())
        .filter_map(|(column, new)| {
            let old = current.get(column).cloned().unwrap_or(Value::Null);
            (old != *new).then(|| FieldChange {
                column: column.clone(),
                old,
                new: new.clone(),
            })
        })
        .collect();
    changes.sort_by(|a, b| a.column.cmp(&b.column));
    changes
}

impl Changelog {
    /// Audit row for one change of `row_id` in `table`
    pub fn for_change(
        table: &str,
        row_id: &str,
        change: &FieldChange,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            changelog_id: None,
            timestamp: Some(timestamp),
            table_name: Some(table.to_string()),
            row_id: Some(row_id.to_string()),
            column_name: Some(change.column.clone()),
            column_type: Some(json_type_name(&change.new).to_string()),
            old_value: (!change.old.is_null()).then(|| display_value(&change.old)),
            new_value: Some(display_value(&change.new)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Record, User};

    fn user(first: &str, email: Option<&str>) -> User {
        User {
            user_id: Some("u-1".into()),
            first_name: Some(first.into()),
            email: email.map(Into::into),
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_rows_have_no_changes() {
        let current = user("Ada", Some("a@example.com")).to_row().unwrap();
        assert!(changed_fields(&current, &current).is_empty());
    }

    #[test]
    fn test_unset_update_fields_are_ignored() {
        let current = user("Ada", Some("a@example.com")).to_row().unwrap();
        let update = User {
            first_name: Some("Ada".into()),
            ..Default::default()
        }
        .to_row()
        .unwrap();
        assert!(changed_fields(&current, &update).is_empty());
    }

    #[test]
    fn test_reports_each_differing_column() {
        let current = user("Ada", None).to_row().unwrap();
        let update = user("Grace", Some("g@example.com")).to_row().unwrap();
        let changes = changed_fields(&current, &update);

        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].column, "email");
        assert_eq!(changes[0].old, Value::Null);
        assert_eq!(changes[1].column, "first_name");
        assert_eq!(changes[1].old, Value::String("Ada".into()));
        assert_eq!(changes[1].new, Value::String("Grace".into()));
    }

    #[test]
    fn test_changelog_for_change() {
        let change = FieldChange {
            column: "first_name".into(),
            old: Value::String("Ada".into()),
            new: Value::String("Grace".into()),
        };
        let ts = Utc::now();
        let entry = Changelog::for_change("users", "u-1", &change, ts);

        assert_eq!(entry.table_name.as_deref(), Some("users"));
        assert_eq!(entry.row_id.as_deref(), Some("u-1"));
        assert_eq!(entry.column_type.as_deref(), Some("string"));
        assert_eq!(entry.old_value.as_deref(), Some("Ada"));
        assert_eq!(entry.new_value.as_deref(), Some("Grace"));
        assert_eq!(entry.timestamp, Some(ts));
    }
}
