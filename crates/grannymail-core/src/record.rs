//! Row conversion and key selection shared by all table records

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Debug;

/// A single table row as exchanged with the remote store (column -> value)
pub type Row = Map<String, Value>;

/// A column name paired with the value used to filter on it
#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub column: &'static str,
    pub value: Value,
}

/// A statically declared table record.
///
/// Every field of an implementor is optional so the same type serves as a
/// full record and as a partially populated lookup probe.
pub trait Record: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Remote table backing this record
    const TABLE: &'static str;

    /// Primary identifier column
    const ID_FIELD: &'static str;

    /// Candidate lookup keys in declaration order. Lookup uses the first
    /// populated one; inserts check every populated one for duplicates.
    const UNIQUE_FIELDS: &'static [&'static str];

    /// Column the server fills with the creation time, if any
    const CREATED_FIELD: Option<&'static str> = None;

    /// Server-assigned identifier, if known
    fn id(&self) -> Option<&str>;

    /// Serialize into a row, omitting unset fields
    fn to_row(&self) -> serde_json::Result<Row> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map.into_iter().filter(|(_, v)| !v.is_null()).collect()),
            other => Err(<serde_json::Error as serde::ser::Error>::custom(format!(
                "{} record serialized to {} instead of an object",
                Self::TABLE,
                json_type_name(&other)
            ))),
        }
    }

    /// Decode a remote row. Missing columns stay unset, unknown columns are
    /// rejected by the record's serde attributes.
    fn from_row(row: Row) -> serde_json::Result<Self> {
        serde_json::from_value(Value::Object(row))
    }

    /// Populated unique fields in declaration order
    fn unique_values(&self) -> serde_json::Result<Vec<KeyValue>> {
        let row = self.to_row()?;
        Ok(Self::UNIQUE_FIELDS
            .iter()
            .filter_map(|&column| {
                row.get(column).map(|value| KeyValue {
                    column,
                    value: value.clone(),
                })
            })
            .collect())
    }

    /// First populated unique field, used as the lookup key
    fn lookup_key(&self) -> serde_json::Result<Option<KeyValue>> {
        Ok(self.unique_values()?.into_iter().next())
    }
}

/// JSON type name used for changelog `column_type` and diagnostics
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a value the way it is shown in errors and stored in the changelog
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Draft, User};
    use serde_json::json;

    #[test]
    fn test_to_row_omits_unset_fields() {
        let user = User {
            email: Some("a@example.com".into()),
            ..Default::default()
        };
        let row = user.to_row().unwrap();
        assert_eq!(row.len(), 1);
        assert_eq!(row.get("email"), Some(&json!("a@example.com")));
    }

    #[test]
    fn test_lookup_key_follows_declaration_order() {
        let user = User {
            telegram_id: Some("42".into()),
            email: Some("a@example.com".into()),
            ..Default::default()
        };
        let key = user.lookup_key().unwrap().unwrap();
        assert_eq!(key.column, "email");

        let draft = Draft {
            blob_path: Some("memos/u/x.pdf".into()),
            ..Default::default()
        };
        assert_eq!(draft.lookup_key().unwrap().unwrap().column, "blob_path");
    }

    #[test]
    fn test_lookup_key_absent_without_unique_fields() {
        let user = User {
            first_name: Some("Ada".into()),
            ..Default::default()
        };
        assert!(user.lookup_key().unwrap().is_none());
    }

    #[test]
    fn test_from_row_rejects_unknown_columns() {
        let mut row = Row::new();
        row.insert("user_id".into(), json!("u-1"));
        row.insert("favourite_colour".into(), json!("teal"));
        assert!(User::from_row(row).is_err());
    }

    #[test]
    fn test_from_row_defaults_missing_columns() {
        let mut row = Row::new();
        row.insert("user_id".into(), json!("u-1"));
        row.insert("last_name".into(), Value::Null);
        let user = User::from_row(row).unwrap();
        assert_eq!(user.id(), Some("u-1"));
        assert!(user.last_name.is_none());
        assert!(user.email.is_none());
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("plain")), "plain");
        assert_eq!(display_value(&json!(7)), "7");
        assert_eq!(json_type_name(&json!(true)), "boolean");
    }
}
