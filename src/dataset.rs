// src/dataset.rs
//! In-memory keyed table.
//!
//! Rows keep insertion order; columns are the union of every column seen, in
//! first-seen order, with the key column always first. The column set only
//! grows. A cell that is absent from a row and a cell holding `Null` are both
//! *missing*; whether `""` counts as missing is a [`Missingness`] choice made
//! by the caller.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::error::{Error, Result};

#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    /// Scalars map one to one. Arrays and objects that reach a cell are kept
    /// as compact JSON text.
    pub fn from_json(v: &Value) -> Cell {
        match v {
            Value::Null => Cell::Null,
            Value::Bool(b) => Cell::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Cell::Int(i)
                } else if n.is_u64() {
                    Cell::Text(n.to_string())
                } else {
                    n.as_f64().map(Cell::Float).unwrap_or(Cell::Null)
                }
            }
            Value::String(s) => Cell::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => Cell::Text(v.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Key form of a cell. Only strings and integers identify a row.
    pub fn as_key(&self) -> Option<String> {
        match self {
            Cell::Text(s) if !s.is_empty() => Some(s.clone()),
            Cell::Int(i) => Some(i.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    /// Export form: missing renders as an empty field.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Float(x) => write!(f, "{x}"),
            Cell::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<i64> for Cell {
    fn from(i: i64) -> Self {
        Cell::Int(i)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Missingness {
    /// Absent or `Null`.
    #[default]
    NullOnly,
    /// Absent, `Null`, or `""`.
    NullOrEmpty,
}

impl Missingness {
    pub fn is_missing(&self, cell: Option<&Cell>) -> bool {
        match cell {
            None | Some(Cell::Null) => true,
            Some(Cell::Text(s)) if s.is_empty() => *self == Missingness::NullOrEmpty,
            Some(_) => false,
        }
    }
}

/// One flattened object: its key plus cells in source order.
/// The key is also present among the cells under the key column.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub key: String,
    pub cells: Vec<(String, Cell)>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }
}

pub type Row = HashMap<String, Cell>;

/// Result of merging one detail record into a row.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Existing columns whose missing value was filled.
    pub filled: usize,
    /// Columns new to the dataset schema.
    pub added: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Dataset {
    key_column: String,
    columns: Vec<String>,
    rows: Vec<Row>,
    keys: Vec<String>,
    index: HashMap<String, usize>,
}

impl Dataset {
    pub fn new(key_column: &str) -> Self {
        Self {
            key_column: key_column.to_string(),
            columns: vec![key_column.to_string()],
            rows: Vec::new(),
            keys: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn from_records(key_column: &str, records: Vec<Record>) -> Result<Self> {
        let mut ds = Self::new(key_column);
        for r in records {
            ds.push(r)?;
        }
        Ok(ds)
    }

    /// Append a row. A key already present is a schema error, never a silent dedup.
    pub fn push(&mut self, record: Record) -> Result<()> {
        if self.index.contains_key(&record.key) {
            return Err(Error::schema(format!(
                "duplicate {} value {:?} (row {})",
                self.key_column,
                record.key,
                self.rows.len() + 1
            )));
        }
        let mut row = Row::with_capacity(record.cells.len() + 1);
        for (col, cell) in record.cells {
            self.ensure_column(&col);
            row.insert(col, cell);
        }
        // A record built by hand may omit its key cell; the normalizer keeps the source type.
        row.entry(self.key_column.clone()).or_insert_with(|| Cell::Text(record.key.clone()));

        self.index.insert(record.key.clone(), self.rows.len());
        self.keys.push(record.key);
        self.rows.push(row);
        Ok(())
    }

    /// Fill-only-missing merge of `detail` into the row for `key`.
    ///
    /// For every detail column: a present base value is kept untouched; a
    /// missing base value takes the detail value if that one is present.
    /// Columns unknown to the schema are appended; other rows stay missing
    /// there. Merging the same record twice changes nothing the second time.
    pub fn combine_first(
        &mut self,
        key: &str,
        detail: &Record,
        missing: Missingness,
    ) -> Result<MergeOutcome> {
        let ix = *self
            .index
            .get(key)
            .ok_or_else(|| Error::schema(format!("no row with {} {:?}", self.key_column, key)))?;

        let mut outcome = MergeOutcome::default();
        for (col, value) in &detail.cells {
            if *col == self.key_column {
                continue;
            }
            let is_new = !self.columns.iter().any(|c| c == col);
            if is_new {
                self.columns.push(col.clone());
                outcome.added.push(col.clone());
            }
            if missing.is_missing(Some(value)) {
                continue;
            }
            let row = &mut self.rows[ix];
            if missing.is_missing(row.get(col)) {
                row.insert(col.clone(), value.clone());
                if !is_new {
                    outcome.filled += 1;
                }
            }
        }
        Ok(outcome)
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keys in row order.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn row(&self, key: &str) -> Option<&Row> {
        self.index.get(key).map(|&ix| &self.rows[ix])
    }

    pub fn get(&self, key: &str, column: &str) -> Option<&Cell> {
        self.row(key).and_then(|r| r.get(column))
    }

    /// Rows in order, each laid out along `columns()`. Missing cells are `Null`.
    pub fn iter_rows(&self) -> impl Iterator<Item = Vec<&Cell>> + '_ {
        const NULL: &Cell = &Cell::Null;
        self.rows
            .iter()
            .map(move |row| self.columns.iter().map(|c| row.get(c).unwrap_or(NULL)).collect())
    }

    /// Header line plus stringified rows, ready for the CSV writer.
    pub fn to_table(&self) -> (Vec<String>, Vec<Vec<String>>) {
        let rows = self
            .iter_rows()
            .map(|cells| cells.into_iter().map(|c| c.to_string()).collect())
            .collect();
        (self.columns.clone(), rows)
    }

    fn ensure_column(&mut self, col: &str) {
        if !self.columns.iter().any(|c| c == col) {
            self.columns.push(col.to_string());
        }
    }
}
