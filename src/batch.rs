//! Tabular batches of input records
//!
//! A [`Batch`] is a list of flat JSON records with the union of their keys as
//! columns. A key missing from a row reads as null, the same way a column
//! that a record does not mention is null in a table.

use serde_json::{Map, Value};

use crate::error::{ApiError, ApiResult};

pub type Record = Map<String, Value>;

static NULL: Value = Value::Null;

/// Column-level queries used by the request checks.
pub trait Table {
    fn has_column(&self, name: &str) -> bool;

    /// The subset of `names` with at least one null value, in `names` order.
    fn null_columns(&self, names: &[String]) -> Vec<String>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl Batch {
    pub fn from_records(rows: Vec<Record>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    /// Build from a decoded request body. Instance payloads must be an
    /// object and become a single row; batch payloads must be an array of
    /// objects.
    pub fn from_value(payload: &Value, batch_mode: bool) -> ApiResult<Self> {
        if batch_mode {
            let Value::Array(items) = payload else {
                return Err(ApiError::malformed(
                    "batch requests must be a JSON array of objects",
                ));
            };
            let rows = items
                .iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row.clone()),
                    _ => Err(ApiError::malformed(
                        "batch requests must be a JSON array of objects",
                    )),
                })
                .collect::<ApiResult<Vec<_>>>()?;
            Ok(Self::from_records(rows))
        } else {
            match payload {
                Value::Object(row) => Ok(Self::from_records(vec![row.clone()])),
                _ => Err(ApiError::malformed(
                    "instance requests must be a JSON object",
                )),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Record> {
        self.rows.get(index)
    }

    pub fn value(&self, index: usize, column: &str) -> &Value {
        self.rows
            .get(index)
            .and_then(|row| row.get(column))
            .unwrap_or(&NULL)
    }

    pub fn column(&self, name: &str) -> Vec<&Value> {
        (0..self.rows.len()).map(|i| self.value(i, name)).collect()
    }

    /// Keep exactly `columns`, in that order. Columns not present in the
    /// batch are filled with nulls.
    pub fn select(&self, columns: &[String]) -> Batch {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|name| (name.clone(), row.get(name).cloned().unwrap_or(Value::Null)))
                    .collect::<Record>()
            })
            .collect();
        Batch {
            columns: columns.to_vec(),
            rows,
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        self.rows
    }

    pub fn to_value(&self) -> Value {
        Value::Array(self.rows.iter().cloned().map(Value::Object).collect())
    }
}

impl Table for Batch {
    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    fn null_columns(&self, names: &[String]) -> Vec<String> {
        names
            .iter()
            .filter(|name| {
                (0..self.rows.len()).any(|i| self.value(i, name).is_null())
            })
            .cloned()
            .collect()
    }
}

/// Every `required` column must be present and, unless `allow_nulls`, free
/// of nulls. The null scan is not run at all when nulls are allowed.
pub fn check_required_fields(
    table: &dyn Table,
    required: &[String],
    allow_nulls: bool,
) -> ApiResult<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|name| !table.has_column(name))
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(ApiError::missing_fields(missing));
    }
    if allow_nulls {
        return Ok(());
    }
    let nulls = table.null_columns(required);
    if !nulls.is_empty() {
        return Err(ApiError::null_values(nulls));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn batch(payload: Value) -> Batch {
        Batch::from_value(&payload, true).unwrap()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_instance_payload_becomes_one_row() {
        let b = Batch::from_value(&json!({"id": 7, "x": 4}), false).unwrap();
        assert_eq!(b.len(), 1);
        assert_eq!(b.value(0, "x"), &json!(4));
    }

    #[test]
    fn test_payload_shape_is_checked() {
        let err = Batch::from_value(&json!([{"id": 1}]), false).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedPayload { .. }));
        let err = Batch::from_value(&json!({"id": 1}), true).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedPayload { .. }));
        let err = Batch::from_value(&json!([{"id": 1}, 2]), true).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedPayload { .. }));
    }

    #[test]
    fn test_columns_are_the_union_of_keys() {
        let b = batch(json!([{"id": 1, "a": 1}, {"id": 2, "b": 2}]));
        assert_eq!(b.columns(), &names(&["id", "a", "b"]));
        assert_eq!(b.column("a"), vec![&json!(1), &Value::Null]);
    }

    #[test]
    fn test_select_projects_and_fills() {
        let b = batch(json!([{"id": 1, "a": 1, "extra": true}]));
        let projected = b.select(&names(&["a", "z"]));
        assert_eq!(projected.columns(), &names(&["a", "z"]));
        assert_eq!(projected.to_value(), json!([{"a": 1, "z": null}]));
    }

    #[test]
    fn test_missing_fields_are_all_named() {
        let b = batch(json!([{"id": 1}]));
        let err = check_required_fields(&b, &names(&["id", "a", "b"]), false).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::MissingRequiredFields {
                fields: names(&["a", "b"])
            }
        );
    }

    #[test]
    fn test_null_fields_are_all_named() {
        let b = batch(json!([{"id": 1, "a": null, "b": 2}, {"id": 2, "b": 3}]));
        let err = check_required_fields(&b, &names(&["id", "a", "b"]), false).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::NullValuesPresent {
                fields: names(&["a"])
            }
        );
        assert!(check_required_fields(&b, &names(&["id", "a", "b"]), true).is_ok());
    }

    struct CountingTable {
        scans: Cell<usize>,
    }

    impl Table for CountingTable {
        fn has_column(&self, _name: &str) -> bool {
            true
        }

        fn null_columns(&self, names: &[String]) -> Vec<String> {
            self.scans.set(self.scans.get() + 1);
            names.to_vec()
        }
    }

    #[test]
    fn test_null_scan_skipped_when_nulls_allowed() {
        let table = CountingTable {
            scans: Cell::new(0),
        };
        assert!(check_required_fields(&table, &names(&["a"]), true).is_ok());
        assert_eq!(table.scans.get(), 0);
        assert!(check_required_fields(&table, &names(&["a"]), false).is_err());
        assert_eq!(table.scans.get(), 1);
    }
}
