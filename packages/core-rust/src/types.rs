use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::query::ID_COLUMN;

/// A row exchanged with the data endpoint.
///
/// Rows are plain serde types. The primary key is optional because rows
/// built client-side for insertion usually have none until the server
/// assigns one.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Primary key, if assigned.
    fn id(&self) -> Option<&str>;
}

/// A record type bound to a named remote collection.
pub trait Table: Record {
    /// Collection name, used as the `/db/{table}` path segment.
    const NAME: &'static str;
}

/// Untyped row for tables without a schema type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DynamicRow(pub Map<String, Value>);

impl DynamicRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }
}

impl Record for DynamicRow {
    fn id(&self) -> Option<&str> {
        self.0.get(ID_COLUMN).and_then(Value::as_str)
    }
}

/// Partial row: field name to new value.
pub type Patch = Map<String, Value>;

/// Serializes `row` to a JSON object.
///
/// # Errors
///
/// Fails if `row` does not serialize to a JSON object.
pub fn to_object<T: Serialize>(row: &T) -> Result<Patch, serde_json::Error> {
    match serde_json::to_value(row)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "row must serialize to an object, got {other}"
        ))),
    }
}

/// Applies a shallow patch to `row`: each patch field replaces the row's.
///
/// # Errors
///
/// Fails if the patched object no longer deserializes into `T`.
pub fn apply_patch<T: Record>(row: &T, patch: &Patch) -> Result<T, serde_json::Error> {
    let mut object = to_object(row)?;
    for (field, value) in patch {
        object.insert(field.clone(), value.clone());
    }
    serde_json::from_value(Value::Object(object))
}

/// Field-level difference between two rows, as a patch that turns `before`
/// into `after`.
///
/// # Errors
///
/// Fails if either row does not serialize to an object.
pub fn diff<T: Serialize>(before: &T, after: &T) -> Result<Patch, serde_json::Error> {
    let before = to_object(before)?;
    let after = to_object(after)?;
    Ok(after
        .into_iter()
        .filter(|(field, value)| before.get(field) != Some(value))
        .collect())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Item {
        id: Option<String>,
        name: String,
        rank: u32,
    }

    impl Record for Item {
        fn id(&self) -> Option<&str> {
            self.id.as_deref()
        }
    }

    #[test]
    fn dynamic_row_reads_string_id() {
        let row = DynamicRow::new().with("id", "p1").with("title", "Site");
        assert_eq!(row.id(), Some("p1"));
        assert_eq!(row.get("title"), Some(&json!("Site")));
    }

    #[test]
    fn dynamic_row_ignores_non_string_id() {
        let row = DynamicRow::new().with("id", 7);
        assert_eq!(row.id(), None);
    }

    #[test]
    fn apply_patch_replaces_listed_fields_only() {
        let item = Item {
            id: Some("a".into()),
            name: "old".into(),
            rank: 1,
        };
        let mut patch = Patch::new();
        patch.insert("name".into(), json!("new"));
        let patched = apply_patch(&item, &patch).unwrap();
        assert_eq!(patched.name, "new");
        assert_eq!(patched.rank, 1);
        assert_eq!(patched.id.as_deref(), Some("a"));
    }

    #[test]
    fn apply_patch_rejects_wrong_type() {
        let item = Item {
            id: None,
            name: "x".into(),
            rank: 1,
        };
        let mut patch = Patch::new();
        patch.insert("rank".into(), json!("not a number"));
        assert!(apply_patch(&item, &patch).is_err());
    }

    #[test]
    fn diff_lists_changed_fields() {
        let before = Item {
            id: Some("a".into()),
            name: "x".into(),
            rank: 1,
        };
        let after = Item {
            rank: 2,
            ..before.clone()
        };
        let patch = diff(&before, &after).unwrap();
        assert_eq!(patch.len(), 1);
        assert_eq!(patch.get("rank"), Some(&json!(2)));
    }

    #[test]
    fn to_object_rejects_scalars() {
        assert!(to_object(&5).is_err());
    }
}
