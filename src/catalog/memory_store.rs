//! In-memory [`RelationalStore`] backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::catalog::store::{Batch, ColumnDef, KEY_COLUMN, RelationalStore, Row, RowIter, Statement, Value};
use crate::catalog_error::StoreError;

#[derive(Debug, Clone, Default)]
struct Table {
    columns: Vec<ColumnDef>,
    rows: BTreeMap<String, Row>,
}

impl Table {
    fn check(&self, table: &str, row: &Row) -> Result<(), StoreError> {
        for (name, value) in row {
            if name == KEY_COLUMN {
                continue;
            }
            let def = self.columns.iter().find(|c| c.name == name).ok_or_else(|| {
                StoreError::ColumnType {
                    table: table.to_string(),
                    column: name.clone(),
                    reason: "no such column".into(),
                }
            })?;
            if !value.fits(def.ty) {
                return Err(StoreError::ColumnType {
                    table: table.to_string(),
                    column: name.clone(),
                    reason: format!("{value:?} is not {:?}", def.ty),
                });
            }
        }
        Ok(())
    }
}

/// Tables held in hash maps; batches are applied to a copy and swapped in.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: HashMap<String, Table>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of rows in `table`, `None` if it does not exist.
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.tables.get(table).map(|t| t.rows.len())
    }

    fn apply(tables: &mut HashMap<String, Table>, st: &Statement) -> Result<(), StoreError> {
        match st {
            Statement::CreateTable { table, columns } => {
                if tables.contains_key(table) {
                    return Err(StoreError::TableExists(table.clone()));
                }
                tables.insert(table.clone(), Table { columns: columns.clone(), rows: BTreeMap::new() });
            }
            Statement::DropTable { table } => {
                tables.remove(table).ok_or_else(|| StoreError::NoSuchTable(table.clone()))?;
            }
            Statement::RenameTable { from, to } => {
                if tables.contains_key(to) {
                    return Err(StoreError::TableExists(to.clone()));
                }
                let t = tables.remove(from).ok_or_else(|| StoreError::NoSuchTable(from.clone()))?;
                tables.insert(to.clone(), t);
            }
            Statement::Insert { table, row } => {
                let t = tables.get_mut(table).ok_or_else(|| StoreError::NoSuchTable(table.clone()))?;
                let key = match row.get(KEY_COLUMN) {
                    Some(Value::Text(k)) => k.clone(),
                    _ => {
                        return Err(StoreError::ColumnType {
                            table: table.clone(),
                            column: KEY_COLUMN.into(),
                            reason: "missing text key".into(),
                        });
                    }
                };
                t.check(table, row)?;
                if t.rows.contains_key(&key) {
                    return Err(StoreError::DuplicateKey { table: table.clone(), key });
                }
                t.rows.insert(key, row.clone());
            }
            Statement::Update { table, key, values } => {
                let t = tables.get_mut(table).ok_or_else(|| StoreError::NoSuchTable(table.clone()))?;
                t.check(table, values)?;
                let row = t.rows.get_mut(key).ok_or_else(|| StoreError::NoSuchRow {
                    table: table.clone(),
                    key: key.clone(),
                })?;
                for (name, value) in values {
                    if name != KEY_COLUMN {
                        row.insert(name.clone(), value.clone());
                    }
                }
            }
            Statement::Delete { table, key } => {
                let t = tables.get_mut(table).ok_or_else(|| StoreError::NoSuchTable(table.clone()))?;
                t.rows.remove(key).ok_or_else(|| StoreError::NoSuchRow {
                    table: table.clone(),
                    key: key.clone(),
                })?;
            }
        }
        Ok(())
    }
}

impl RelationalStore for InMemoryStore {
    fn execute_batch(&mut self, batch: &Batch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut staged = self.tables.clone();
        for st in batch.statements() {
            log::trace!("{st}");
            Self::apply(&mut staged, st)?;
        }
        self.tables = staged;
        log::debug!("applied batch of {} statements", batch.len());
        Ok(())
    }

    fn select_rows<'a>(
        &'a self,
        table: &str,
        ids: Option<&'a [String]>,
    ) -> Result<RowIter<'a>, StoreError> {
        let t = self.tables.get(table).ok_or_else(|| StoreError::NoSuchTable(table.to_string()))?;
        Ok(match ids {
            Some(ids) => {
                let mut keys: Vec<&String> = ids.iter().collect();
                keys.sort();
                keys.dedup();
                Box::new(keys.into_iter().filter_map(move |k| t.rows.get(k).cloned()))
            }
            None => Box::new(t.rows.values().cloned()),
        })
    }

    fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }
}

/// A store shared between several catalog handles.
///
/// Batches take the write lock; selections copy the matching rows out under
/// the read lock, so the returned iterator holds no lock.
#[derive(Debug, Default)]
pub struct SharedStore<S> {
    inner: Arc<RwLock<S>>,
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: RelationalStore> SharedStore<S> {
    pub fn new(store: S) -> Self {
        Self { inner: Arc::new(RwLock::new(store)) }
    }

    /// Run `f` with shared access to the wrapped store.
    pub fn with<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.inner.read())
    }
}

impl<S: RelationalStore> RelationalStore for SharedStore<S> {
    fn execute_batch(&mut self, batch: &Batch) -> Result<(), StoreError> {
        self.inner.write().execute_batch(batch)
    }

    fn select_rows<'a>(
        &'a self,
        table: &str,
        ids: Option<&'a [String]>,
    ) -> Result<RowIter<'a>, StoreError> {
        let guard = self.inner.read();
        let rows: Vec<Row> = guard.select_rows(table, ids)?.collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn has_table(&self, table: &str) -> bool {
        self.inner.read().has_table(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::store::ColumnType;

    fn schema() -> Statement {
        Statement::CreateTable {
            table: "t".into(),
            columns: vec![ColumnDef::new("n", ColumnType::Integer)],
        }
    }

    fn insert(key: &str, n: i64) -> Statement {
        let mut row = Row::new();
        row.insert(KEY_COLUMN.into(), Value::Text(key.into()));
        row.insert("n".into(), Value::Int(n));
        Statement::Insert { table: "t".into(), row }
    }

    #[test]
    fn failed_batch_leaves_store_untouched() {
        let mut store = InMemoryStore::new();
        store.execute_batch(&schema().into()).unwrap();
        let batch: Batch = [insert("a", 1), insert("b", 2), insert("a", 3)].into_iter().collect();
        let err = store.execute_batch(&batch).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(store.row_count("t"), Some(0));
    }

    #[test]
    fn select_by_ids_skips_unknown_keys() {
        let mut store = InMemoryStore::new();
        let batch: Batch = [schema(), insert("a", 1), insert("b", 2)].into_iter().collect();
        store.execute_batch(&batch).unwrap();
        let ids = vec!["b".to_string(), "zz".to_string()];
        let rows: Vec<Row> = store.select_rows("t", Some(&ids)).unwrap().collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("n"), Some(&Value::Int(2)));
    }

    #[test]
    fn select_where_reads_time_columns() {
        use crate::catalog::filter::TemporalFilter;
        use crate::time::extent::TimeExtent;
        use crate::time::point::RelativeUnit;

        let mut store = InMemoryStore::new();
        let columns = ["start_rel", "end_rel"].map(|c| ColumnDef::new(c, ColumnType::Integer)).to_vec();
        let mut batch: Batch = Statement::CreateTable { table: "m".into(), columns }.into();
        for (key, start) in [("a", 0), ("b", 5), ("c", 9)] {
            let mut row = Row::new();
            row.insert(KEY_COLUMN.into(), Value::Text(key.into()));
            row.insert("start_rel".into(), Value::Int(start));
            row.insert("end_rel".into(), Value::Int(start + 1));
            batch.push(Statement::Insert { table: "m".into(), row });
        }
        store.execute_batch(&batch).unwrap();

        let window = TimeExtent::relative(4, Some(10), RelativeUnit::Days).unwrap();
        let filter = TemporalFilter::new(window);
        fn keys(rows: RowIter<'_>) -> Vec<Value> {
            rows.filter_map(|r| r.get(KEY_COLUMN).cloned()).collect()
        }
        assert_eq!(
            keys(store.select_where("m", None, &filter).unwrap()),
            vec![Value::Text("b".into()), Value::Text("c".into())]
        );
        let ids = vec!["a".to_string(), "c".to_string()];
        assert_eq!(keys(store.select_where("m", Some(&ids), &filter).unwrap()), vec![Value::Text("c".into())]);
    }

    #[test]
    fn column_types_are_enforced() {
        let mut store = InMemoryStore::new();
        store.execute_batch(&schema().into()).unwrap();
        let mut row = Row::new();
        row.insert(KEY_COLUMN.into(), "a".into());
        row.insert("n".into(), "text".into());
        assert!(matches!(store.insert_row("t", row), Err(StoreError::ColumnType { .. })));
    }

    #[test]
    fn shared_handles_see_each_other() {
        let a = SharedStore::new(InMemoryStore::new());
        let mut b = a.clone();
        b.execute_batch(&[schema(), insert("x", 7)].into_iter().collect()).unwrap();
        assert!(a.has_table("t"));
        assert_eq!(a.with(|s| s.row_count("t")), Some(1));
        assert!(a.select_row("t", "x").unwrap().is_some());
    }
}
