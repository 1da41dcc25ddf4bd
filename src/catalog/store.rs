//! The relational store collaborator.
//!
//! The catalog never builds SQL by pasting values into strings. Every
//! mutation is a [`Statement`] with its values kept apart; a SQL backend
//! renders it with [`Statement::to_sql`] and binds the returned parameters,
//! while the [`InMemoryStore`](crate::catalog::memory_store::InMemoryStore)
//! applies statements directly.
//!
//! A [`Batch`] is the unit of atomicity: a store must apply all of its
//! statements or none of them.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::catalog::filter::TemporalFilter;
use crate::catalog_error::StoreError;

/// Name of the primary key column present in every table.
pub const KEY_COLUMN: &str = "id";

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether the value may be stored in a column of type `ty`.
    pub fn fits(&self, ty: ColumnType) -> bool {
        matches!(
            (self, ty),
            (Value::Null, _)
                | (Value::Int(_), ColumnType::Integer)
                | (Value::Real(_), ColumnType::Real)
                | (Value::Text(_), ColumnType::Text)
                | (Value::DateTime(_), ColumnType::DateTime)
        )
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Column types understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    DateTime,
}

impl ColumnType {
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
            ColumnType::DateTime => "TIMESTAMP",
        }
    }
}

/// Column definition of a table schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
}

impl ColumnDef {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self { name, ty }
    }
}

/// One row, keyed by column name. The [`KEY_COLUMN`] holds the row key.
pub type Row = BTreeMap<String, Value>;

/// Typed access to the columns of a row read from `table`.
pub struct RowReader<'a> {
    table: &'a str,
    row: &'a Row,
}

impl<'a> RowReader<'a> {
    pub fn new(table: &'a str, row: &'a Row) -> Self {
        Self { table, row }
    }

    fn mismatch(&self, column: &str, wanted: &str) -> StoreError {
        StoreError::ColumnType {
            table: self.table.to_string(),
            column: column.to_string(),
            reason: format!("expected {wanted}"),
        }
    }

    fn get(&self, column: &str) -> &'a Value {
        self.row.get(column).unwrap_or(&Value::Null)
    }

    pub fn text(&self, column: &str) -> Result<Option<&'a str>, StoreError> {
        match self.get(column) {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.as_str())),
            _ => Err(self.mismatch(column, "text")),
        }
    }

    pub fn required_text(&self, column: &str) -> Result<&'a str, StoreError> {
        self.text(column)?.ok_or_else(|| self.mismatch(column, "non-null text"))
    }

    pub fn int(&self, column: &str) -> Result<Option<i64>, StoreError> {
        match self.get(column) {
            Value::Null => Ok(None),
            Value::Int(v) => Ok(Some(*v)),
            _ => Err(self.mismatch(column, "integer")),
        }
    }

    pub fn real(&self, column: &str) -> Result<Option<f64>, StoreError> {
        match self.get(column) {
            Value::Null => Ok(None),
            Value::Real(v) => Ok(Some(*v)),
            _ => Err(self.mismatch(column, "real")),
        }
    }

    pub fn datetime(&self, column: &str) -> Result<Option<NaiveDateTime>, StoreError> {
        match self.get(column) {
            Value::Null => Ok(None),
            Value::DateTime(v) => Ok(Some(*v)),
            _ => Err(self.mismatch(column, "timestamp")),
        }
    }
}

/// Placeholder syntax for bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamStyle {
    /// `?` (SQLite).
    #[default]
    Qmark,
    /// `$1, $2, ...` (PostgreSQL).
    Numbered,
}

impl ParamStyle {
    /// Placeholder for the `n`-th parameter (1-based).
    pub fn placeholder(self, n: usize) -> String {
        match self {
            ParamStyle::Qmark => "?".to_string(),
            ParamStyle::Numbered => format!("${n}"),
        }
    }
}

/// A single parameterized mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable { table: String, columns: Vec<ColumnDef> },
    DropTable { table: String },
    RenameTable { from: String, to: String },
    Insert { table: String, row: Row },
    /// Set `values` on the row keyed `key`.
    Update { table: String, key: String, values: Row },
    Delete { table: String, key: String },
}

impl Statement {
    /// Render the statement with placeholders and return the values to bind.
    pub fn to_sql(&self, style: ParamStyle) -> (String, Vec<Value>) {
        match self {
            Statement::CreateTable { table, columns } => {
                let cols = std::iter::once(format!("{KEY_COLUMN} VARCHAR NOT NULL PRIMARY KEY"))
                    .chain(
                        columns
                            .iter()
                            .filter(|c| c.name != KEY_COLUMN)
                            .map(|c| format!("{} {}", c.name, c.ty.sql())),
                    )
                    .collect::<Vec<_>>()
                    .join(", ");
                (format!("CREATE TABLE {table} ({cols});"), Vec::new())
            }
            Statement::DropTable { table } => (format!("DROP TABLE {table};"), Vec::new()),
            Statement::RenameTable { from, to } => {
                (format!("ALTER TABLE {from} RENAME TO {to};"), Vec::new())
            }
            Statement::Insert { table, row } => {
                let names = row.keys().map(String::as_str).collect::<Vec<_>>().join(", ");
                let marks = (1..=row.len())
                    .map(|n| style.placeholder(n))
                    .collect::<Vec<_>>()
                    .join(", ");
                (
                    format!("INSERT INTO {table} ({names}) VALUES ({marks});"),
                    row.values().cloned().collect(),
                )
            }
            Statement::Update { table, key, values } => {
                let sets = values
                    .keys()
                    .enumerate()
                    .map(|(i, name)| format!("{name} = {}", style.placeholder(i + 1)))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut params: Vec<Value> = values.values().cloned().collect();
                params.push(Value::Text(key.clone()));
                (
                    format!(
                        "UPDATE {table} SET {sets} WHERE {KEY_COLUMN} = {};",
                        style.placeholder(params.len())
                    ),
                    params,
                )
            }
            Statement::Delete { table, key } => (
                format!("DELETE FROM {table} WHERE {KEY_COLUMN} = {};", style.placeholder(1)),
                vec![Value::Text(key.clone())],
            ),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sql, params) = self.to_sql(ParamStyle::Qmark);
        write!(f, "{sql} {params:?}")
    }
}

/// An ordered list of statements applied as one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    statements: Vec<Statement>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, statement: Statement) -> &mut Self {
        self.statements.push(statement);
        self
    }

    pub fn extend(&mut self, other: Batch) -> &mut Self {
        self.statements.extend(other.statements);
        self
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

impl From<Statement> for Batch {
    fn from(statement: Statement) -> Self {
        Self { statements: vec![statement] }
    }
}

impl FromIterator<Statement> for Batch {
    fn from_iter<I: IntoIterator<Item = Statement>>(iter: I) -> Self {
        Self { statements: iter.into_iter().collect() }
    }
}

/// Lazy, single-pass iterator over selected rows.
pub type RowIter<'a> = Box<dyn Iterator<Item = Row> + 'a>;

/// Storage collaborator of the catalog.
///
/// Implementors provide transactional batch execution and keyed selection;
/// the single-row helpers are expressed through them.
pub trait RelationalStore {
    /// Apply every statement of `batch`, or none of them.
    fn execute_batch(&mut self, batch: &Batch) -> Result<(), StoreError>;

    /// Rows of `table` in key order; only the keys in `ids` when given.
    /// Unknown keys are skipped.
    fn select_rows<'a>(
        &'a self,
        table: &str,
        ids: Option<&'a [String]>,
    ) -> Result<RowIter<'a>, StoreError>;

    fn has_table(&self, table: &str) -> bool;

    /// Rows of `table` (only the keys in `ids` when given) whose time
    /// columns satisfy `filter`.
    ///
    /// A SQL backend appends [`TemporalFilter::to_sql`] to its where clause.
    /// The default evaluates the same clauses on the selected rows.
    fn select_where<'a>(
        &'a self,
        table: &str,
        ids: Option<&'a [String]>,
        filter: &TemporalFilter,
    ) -> Result<RowIter<'a>, StoreError> {
        let filter = *filter;
        if log::log_enabled!(log::Level::Trace) {
            log::trace!("select from {table} where {}", filter.to_sql(ParamStyle::Qmark).0);
        }
        let rows = self.select_rows(table, ids)?;
        Ok(Box::new(rows.filter(move |row| filter.matches_row(row))))
    }

    fn insert_row(&mut self, table: &str, row: Row) -> Result<(), StoreError> {
        self.execute_batch(&Statement::Insert { table: table.to_string(), row }.into())
    }

    fn delete_row(&mut self, table: &str, key: &str) -> Result<(), StoreError> {
        self.execute_batch(
            &Statement::Delete { table: table.to_string(), key: key.to_string() }.into(),
        )
    }

    fn select_row(&self, table: &str, key: &str) -> Result<Option<Row>, StoreError> {
        let ids = [key.to_string()];
        let mut rows = self.select_rows(table, Some(&ids))?;
        Ok(rows.next())
    }
}

/// Table name built from identifier parts.
///
/// Parts are joined with `__`. Inside a part `_`, `-` and `.` become `_u`,
/// `_h` and `_d`, so an underscore in the result is always followed by a
/// marker and distinct part lists never share a name. Case is kept.
pub fn table_name(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| {
            let mut out = String::with_capacity(p.len());
            for c in p.chars() {
                match c {
                    '_' => out.push_str("_u"),
                    '-' => out.push_str("_h"),
                    '.' => out.push_str("_d"),
                    c if c.is_ascii_alphanumeric() => out.push(c),
                    c => out.push_str(&format!("_x{:04x}", c as u32)),
                }
            }
            out
        })
        .join("__")
}
