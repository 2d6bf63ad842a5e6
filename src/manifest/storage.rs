//! The synchronous record read interface consumed by views.
//!
//! Building a manifest only ever lists rows; any failure aborts the build.
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::ast::RecordSchema;
use crate::error::{CompileError, ErrorKind};

pub type Row = Map<String, Value>;

/// Field that ties a row to its owner when the record declares it.
pub const OWNER_FIELD: &str = "owner";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record '{record}' rows are malformed: {reason}")]
    Malformed { record: String, reason: String },
    #[error("storage is unavailable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for CompileError {
    fn from(err: StorageError) -> Self {
        CompileError::new(ErrorKind::Storage, err.to_string())
    }
}

/// Who is reading which record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordScope {
    pub record: String,
    pub owner: Option<String>,
}

impl RecordScope {
    /// The owner is `identity.id`, when present.
    pub fn for_identity(record: &str, identity: Option<&Value>) -> Self {
        let owner = identity.and_then(|identity| identity.get("id")).and_then(|id| match id {
            Value::String(id) => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        });
        Self { record: record.to_owned(), owner }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageMetadata {
    pub enabled: bool,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub schema_version: String,
}

pub trait Storage: Sync {
    /// Rows of `schema` visible to `scope`, in storage order, at most `limit`.
    fn list_records(
        &self,
        schema: &RecordSchema,
        scope: &RecordScope,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, StorageError>;

    fn metadata(&self) -> StorageMetadata;
}

// ————————————————————————————————————————————————————————————————————————————
// IN-MEMORY STORAGE
// ————————————————————————————————————————————————————————————————————————————

/// Record name → rows, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    records: IndexMap<String, Vec<Row>>,
    path: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from `{"Record": [{...}, ...], ...}`.
    pub fn from_value(value: Value, path: Option<String>) -> Result<Self, StorageError> {
        let Value::Object(records) = value else {
            return Err(StorageError::Unavailable("rows document must be an object".to_owned()));
        };
        let mut store = Self { records: IndexMap::new(), path };
        for (record, rows) in records {
            let Value::Array(rows) = rows else {
                return Err(StorageError::Malformed { record, reason: "expected a list of rows".to_owned() });
            };
            let mut parsed = Vec::with_capacity(rows.len());
            for (index, row) in rows.into_iter().enumerate() {
                match row {
                    Value::Object(row) => parsed.push(row),
                    _ => {
                        return Err(StorageError::Malformed {
                            record,
                            reason: format!("row {index} is not an object"),
                        });
                    }
                }
            }
            store.records.insert(record, parsed);
        }
        Ok(store)
    }

    pub fn insert(&mut self, record: &str, row: Row) {
        self.records.entry(record.to_owned()).or_default().push(row);
    }
}

impl Storage for MemoryStorage {
    fn list_records(
        &self,
        schema: &RecordSchema,
        scope: &RecordScope,
        limit: Option<usize>,
    ) -> Result<Vec<Row>, StorageError> {
        let Some(rows) = self.records.get(&schema.name) else {
            return Ok(Vec::new());
        };
        let owned = schema.field(OWNER_FIELD).is_some();
        let visible = rows.iter().filter(|row| match (&scope.owner, owned) {
            (Some(owner), true) => row.get(OWNER_FIELD).is_some_and(|value| owner_matches(value, owner)),
            _ => true,
        });
        Ok(visible.take(limit.unwrap_or(usize::MAX)).cloned().collect())
    }

    fn metadata(&self) -> StorageMetadata {
        StorageMetadata {
            enabled: true,
            kind: "memory".to_owned(),
            path: self.path.clone(),
            schema_version: "1".to_owned(),
        }
    }
}

fn owner_matches(value: &Value, owner: &str) -> bool {
    match value {
        Value::String(value) => value == owner,
        Value::Number(value) => value.to_string() == owner,
        _ => false,
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(fields: &[&str]) -> RecordSchema {
        let fields: Vec<Value> = fields.iter().map(|name| json!({"name": name})).collect();
        serde_json::from_value(json!({"name": "Note", "fields": fields})).unwrap()
    }

    fn store() -> MemoryStorage {
        MemoryStorage::from_value(
            json!({"Note": [
                {"id": 1, "owner": "u1", "body": "a"},
                {"id": 2, "owner": "u2", "body": "b"},
                {"id": 3, "owner": "u1", "body": "c"},
            ]}),
            None,
        )
        .unwrap()
    }

    #[test]
    fn owner_scoping_applies_to_owned_records() {
        let scope = RecordScope::for_identity("Note", Some(&json!({"id": "u1"})));
        let rows = store().list_records(&schema(&["id", "owner", "body"]), &scope, None).unwrap();
        assert_eq!(rows.len(), 2);

        let rows = store().list_records(&schema(&["id", "body"]), &scope, None).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn limit_truncates_in_storage_order() {
        let scope = RecordScope::for_identity("Note", None);
        let rows = store().list_records(&schema(&["id"]), &scope, Some(2)).unwrap();
        assert_eq!(rows.iter().map(|r| r["id"].clone()).collect::<Vec<_>>(), vec![json!(1), json!(2)]);
    }

    #[test]
    fn malformed_rows_are_reported() {
        let err = MemoryStorage::from_value(json!({"Note": [1]}), None).unwrap_err();
        assert_eq!(err.to_string(), "record 'Note' rows are malformed: row 0 is not an object");
        let compile: CompileError = err.into();
        assert_eq!(compile.kind, ErrorKind::Storage);
    }
}
