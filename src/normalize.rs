// src/normalize.rs
//! # Normalizer
//!
//! Turns the report API's JSON objects into flat keyed rows.
//!
//! ## Rules
//! - Scalar fields are copied as they are.
//! - A field `f` holding an object is replaced by one column `f_c` per child
//!   `c`, in the child order of the source. Expansion descends `max_depth`
//!   levels (default 1); objects below that, and all arrays, are kept as
//!   compact JSON text in a single cell.
//! - Exactly one field is the key. It is renamed to `key`, placed first, and
//!   must be present, non-null and unique across a batch. Anything else is a
//!   `Schema` error; rows are never dropped or deduplicated.
//! - Two source fields flattening to the same column name is a `Schema` error.
//!
//! ## Known shapes
//! ```text
//! territories: [ { children: [ { territory: {id, name, ..}, housesWithDeterioration: {..}, .. } ] } ]
//! houses page: { items: [ { houseId, address, .. } ], .. }
//! house detail: { guid, .. }
//! ```

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::config::consts::{
    DETAIL_KEY_FIELD, FLATTEN_DEPTH, FLATTEN_SEP, HOUSE_KEY_FIELD, KEY_COLUMN, TERRITORY_FIELD,
};
use crate::dataset::{Cell, Dataset, Record};
use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeySpec {
    /// A column of the flattened row, e.g. `houseId`.
    Column(String),
    /// The first child of a nested object, e.g. the id inside `territory`.
    FirstFieldOf(String),
}

#[derive(Clone, Debug)]
pub struct Normalizer {
    key: KeySpec,
    key_column: String,
    max_depth: usize,
    sep: String,
}

impl Normalizer {
    pub fn new(key: KeySpec) -> Self {
        Self {
            key,
            key_column: KEY_COLUMN.to_string(),
            max_depth: FLATTEN_DEPTH,
            sep: FLATTEN_SEP.to_string(),
        }
    }

    pub fn territories() -> Self {
        Self::new(KeySpec::FirstFieldOf(TERRITORY_FIELD.to_string()))
    }

    pub fn houses() -> Self {
        Self::new(KeySpec::Column(HOUSE_KEY_FIELD.to_string()))
    }

    /// Detail records carry their id under another name (`guid` by default).
    pub fn house_detail(key_field: &str) -> Self {
        let field = if key_field.is_empty() { DETAIL_KEY_FIELD } else { key_field };
        Self::new(KeySpec::Column(field.to_string()))
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_key_column(mut self, name: &str) -> Self {
        self.key_column = name.to_string();
        self
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Flatten one object without any key handling.
    pub fn flatten(&self, obj: &Map<String, Value>) -> Result<Vec<(String, Cell)>> {
        let mut out = Vec::with_capacity(obj.len());
        let mut seen = HashSet::with_capacity(obj.len());
        flatten_into(None, obj, self.max_depth, &self.sep, &mut out, &mut seen)?;
        Ok(out)
    }

    /// Flatten one object and pull out its key.
    pub fn normalize(&self, value: &Value) -> Result<Record> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::schema(format!("expected an object, got {}", kind(value))))?;

        let key_source = match &self.key {
            KeySpec::Column(c) => c.clone(),
            KeySpec::FirstFieldOf(field) => {
                let first = obj
                    .get(field)
                    .and_then(Value::as_object)
                    .and_then(|m| m.keys().next())
                    .ok_or_else(|| Error::schema(format!("`{field}` is missing or has no fields")))?;
                format!("{field}{}{first}", self.sep)
            }
        };

        let mut cells = self.flatten(obj)?;
        let pos = cells
            .iter()
            .position(|(c, _)| *c == key_source)
            .ok_or_else(|| Error::schema(format!("key field `{key_source}` missing")))?;
        let (_, key_cell) = cells.remove(pos);
        let key = key_cell
            .as_key()
            .ok_or_else(|| Error::schema(format!("key field `{key_source}` is empty or not an id")))?;

        if cells.iter().any(|(c, _)| *c == self.key_column) {
            return Err(Error::schema(format!(
                "source already has a `{}` column; cannot rename `{key_source}`",
                self.key_column
            )));
        }
        cells.insert(0, (self.key_column.clone(), key_cell));
        Ok(Record { key, cells })
    }

    /// Normalize a whole batch into a dataset; the first bad item aborts.
    pub fn normalize_batch(&self, items: &[Value]) -> Result<Dataset> {
        let mut ds = Dataset::new(&self.key_column);
        for (i, item) in items.iter().enumerate() {
            let rec = self
                .normalize(item)
                .map_err(|e| Error::schema(format!("item {}: {}", i + 1, strip_prefix(&e))))?;
            ds.push(rec)?;
        }
        Ok(ds)
    }
}

fn flatten_into(
    prefix: Option<&str>,
    obj: &Map<String, Value>,
    depth_left: usize,
    sep: &str,
    out: &mut Vec<(String, Cell)>,
    seen: &mut HashSet<String>,
) -> Result<()> {
    for (field, value) in obj {
        let name = match prefix {
            Some(p) => format!("{p}{sep}{field}"),
            None => field.clone(),
        };
        match value {
            Value::Object(child) if depth_left > 0 => {
                flatten_into(Some(&name), child, depth_left - 1, sep, out, seen)?;
            }
            _ => {
                if !seen.insert(name.clone()) {
                    return Err(Error::schema(format!("column `{name}` produced twice")));
                }
                out.push((name, Cell::from_json(value)));
            }
        }
    }
    Ok(())
}

/* ---------------- Response shapes ---------------- */

/// Territories payload: a list whose first element holds `children`.
pub fn territory_children(payload: &Value) -> Result<&[Value]> {
    let first = payload
        .as_array()
        .and_then(|a| a.first())
        .ok_or_else(|| Error::schema(format!("territories: expected a non-empty list, got {}", kind(payload))))?;
    first
        .get("children")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| Error::schema("territories: first element has no `children` list"))
}

/// Houses page: an object with an `items` list.
pub fn page_items(page: &Value) -> Result<&[Value]> {
    page.get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| Error::schema(format!("houses page: no `items` list in {}", kind(page))))
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn strip_prefix(e: &Error) -> String {
    match e {
        Error::Schema(msg) => msg.clone(),
        other => other.to_string(),
    }
}
