//! SQLite-backed tracker store
//!
//! [`RepStore`] owns the single connection and the validated column mapping.
//! Every write runs inside [`RepStore::with_transaction`], which begins an
//! IMMEDIATE transaction, hands the closure a [`Session`], and commits or
//! rolls back depending on the closure's result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, TransactionBehavior};
use tracing::{debug, error, info, warn};

use crate::core::config::Config;
use crate::core::error::{StoreError, StoreResult};
use crate::core::mapping::{SchemaMapper, Table};
use crate::core::query::{InsertStatement, SelectQuery, Statement, UpdateStatement};
use crate::core::row::Row;
use crate::core::schema::init_schema;

/// Ordered `(logical column, value)` pairs for one table
pub type Fields = Vec<(String, Value)>;

/// Default busy timeout when none is configured
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// The tracker database
pub struct RepStore {
    conn: Connection,
    mapper: SchemaMapper,
    path: Option<PathBuf>,
}

impl RepStore {
    /// Open (or create) a database file
    pub fn open(path: &Path, mapper: SchemaMapper, busy_timeout: Duration) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Configuration(format!(
                        "cannot create database directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| StoreError::database(format!("open {}", path.display()), e))?;
        conn.busy_timeout(busy_timeout)
            .map_err(|e| StoreError::database("set busy timeout", e))?;

        let store = Self::prepare(conn, mapper, Some(path.to_path_buf()))?;
        info!("Opened tracker database at {}", path.display());
        Ok(store)
    }

    /// Open the database named by a loaded configuration
    pub fn from_config(config: &Config) -> StoreResult<Self> {
        let mapper = SchemaMapper::with_overrides(&config.mappings)?;
        Self::open(&config.database(), mapper, config.busy_timeout())
    }

    /// Fresh in-memory database with the identity mapping
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::database("open in-memory database", e))?;
        Self::prepare(conn, SchemaMapper::default(), None)
    }

    fn prepare(conn: Connection, mapper: SchemaMapper, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| StoreError::database("enable foreign keys", e))?;
        init_schema(&conn)?;
        mapper.validate(&conn)?;
        Ok(Self { conn, mapper, path })
    }

    pub fn mapper(&self) -> &SchemaMapper {
        &self.mapper
    }

    /// Location of the database file (`None` for in-memory stores)
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Read-only session outside any explicit transaction
    pub fn session(&self) -> Session<'_> {
        Session {
            conn: &self.conn,
            mapper: &self.mapper,
        }
    }

    /// Run `f` inside one IMMEDIATE transaction
    ///
    /// Commits when `f` returns `Ok`; otherwise rolls back every write made
    /// through the session and returns the original error.
    pub fn with_transaction<T, F>(&mut self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Session<'_>) -> StoreResult<T>,
    {
        let mapper = &self.mapper;
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::database("begin transaction", e))?;

        let session = Session {
            conn: &*tx,
            mapper,
        };
        match f(&session) {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| StoreError::database("commit transaction", e))?;
                Ok(value)
            }
            Err(err) => {
                error!("Transaction failed, rolling back: {}", err);
                if let Err(rollback) = tx.rollback() {
                    warn!("Rollback failed: {}", rollback);
                }
                Err(err)
            }
        }
    }

    pub fn fetch(&self, query: &SelectQuery) -> StoreResult<Vec<Row>> {
        self.session().fetch(query)
    }

    pub fn query(&self, table: Table, conditions: &[(&str, Value)]) -> StoreResult<Vec<Row>> {
        self.session().query(table, conditions)
    }

    pub fn insert(&mut self, table: Table, data: &[(String, Value)]) -> StoreResult<i64> {
        self.with_transaction(|s| s.insert(table, data))
    }

    pub fn insert_or_ignore(&mut self, table: Table, data: &[(String, Value)]) -> StoreResult<bool> {
        self.with_transaction(|s| s.insert_or_ignore(table, data))
    }

    pub fn update(
        &mut self,
        table: Table,
        data: &[(String, Value)],
        conditions: &[(&str, Value)],
    ) -> StoreResult<usize> {
        self.with_transaction(|s| s.update(table, data, conditions))
    }

    /// Update that never fails; see [`Session::update_best_effort`]
    pub fn update_best_effort(
        &mut self,
        table: Table,
        data: &[(String, Value)],
        conditions: &[(&str, Value)],
    ) -> bool {
        match self.with_transaction(|s| Ok(s.update_best_effort(table, data, conditions))) {
            Ok(applied) => applied,
            Err(err) => {
                warn!("Best-effort update of '{}' skipped: {}", table, err);
                false
            }
        }
    }

    pub fn upsert(
        &mut self,
        table: Table,
        data: &[(String, Value)],
        keys: &[&str],
    ) -> StoreResult<()> {
        self.with_transaction(|s| s.upsert(table, data, keys))
    }
}

/// A connection handle scoped to one logical operation
///
/// Column names passed in are logical; the session maps them before
/// rendering. Rows returned by [`Session::query`] use logical names too.
pub struct Session<'c> {
    conn: &'c Connection,
    mapper: &'c SchemaMapper,
}

impl<'c> Session<'c> {
    pub fn mapper(&self) -> &SchemaMapper {
        self.mapper
    }

    /// Run an already mapped SELECT
    pub fn fetch(&self, query: &SelectQuery) -> StoreResult<Vec<Row>> {
        let stmt = query.build()?;
        self.fetch_statement(&stmt)
    }

    fn fetch_statement(&self, stmt: &Statement) -> StoreResult<Vec<Row>> {
        debug!(sql = %stmt.sql, params = ?stmt.params, "select");
        let mut prepared = self
            .conn
            .prepare(&stmt.sql)
            .map_err(|e| StoreError::database("prepare query", e))?;
        let columns: Arc<[String]> = prepared
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let width = columns.len();

        let rows = prepared
            .query_map(params_from_iter(stmt.params.iter()), |row| {
                (0..width)
                    .map(|i| row.get::<_, Value>(i))
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(|e| StoreError::database("run query", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::database("read query results", e))?;

        Ok(rows
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect())
    }

    /// Select every logical column of `table` matching all `conditions`
    pub fn query(&self, table: Table, conditions: &[(&str, Value)]) -> StoreResult<Vec<Row>> {
        let mut query = self.select_all(table);
        for (column, value) in conditions {
            query = query.and_eq(self.mapper.qualified(table, column), value.clone());
        }
        self.fetch(&query)
    }

    /// SELECT of every logical column of `table`, aliased back to its logical name
    pub fn select_all(&self, table: Table) -> SelectQuery {
        SelectQuery::new(table).columns(table.logical_columns().iter().map(|column| {
            let physical = self.mapper.qualified(table, column);
            if physical.ends_with(&format!(".{}", column)) {
                physical
            } else {
                format!("{} AS {}", physical, column)
            }
        }))
    }

    /// First row matching `conditions`, if any
    pub fn find(&self, table: Table, conditions: &[(&str, Value)]) -> StoreResult<Option<Row>> {
        Ok(self.query(table, conditions)?.into_iter().next())
    }

    pub fn exists(&self, table: Table, conditions: &[(&str, Value)]) -> StoreResult<bool> {
        Ok(self.find(table, conditions)?.is_some())
    }

    fn physical(&self, table: Table, data: &[(String, Value)]) -> Fields {
        data.iter()
            .map(|(column, value)| (self.mapper.column(table, column), value.clone()))
            .collect()
    }

    fn execute(&self, stmt: &Statement, context: &str, data: &[(String, Value)]) -> StoreResult<usize> {
        debug!(sql = %stmt.sql, params = ?stmt.params, "{}", context);
        self.conn
            .execute(&stmt.sql, params_from_iter(stmt.params.iter()))
            .map_err(|e| StoreError::from_write(context, e, data))
    }

    /// Plain INSERT; returns the new rowid
    pub fn insert(&self, table: Table, data: &[(String, Value)]) -> StoreResult<i64> {
        let data = self.physical(table, data);
        let stmt = InsertStatement::new(table, data.clone()).build()?;
        self.execute(&stmt, &format!("insert into {}", table), &data)?;
        let rowid = self.conn.last_insert_rowid();
        info!("Inserted row {} into '{}'", rowid, table);
        Ok(rowid)
    }

    /// INSERT OR IGNORE; returns whether a row was written
    pub fn insert_or_ignore(&self, table: Table, data: &[(String, Value)]) -> StoreResult<bool> {
        let data = self.physical(table, data);
        let stmt = InsertStatement::new(table, data.clone()).or_ignore().build()?;
        let changed = self.execute(&stmt, &format!("insert or ignore into {}", table), &data)?;
        if changed == 0 {
            warn!("Insert into '{}' ignored: row already exists", table);
        } else {
            info!("Inserted into '{}'", table);
        }
        Ok(changed > 0)
    }

    /// Strict UPDATE; fails with EmptyUpdate when `data` is empty
    pub fn update(
        &self,
        table: Table,
        data: &[(String, Value)],
        conditions: &[(&str, Value)],
    ) -> StoreResult<usize> {
        let data = self.physical(table, data);
        let conditions = conditions
            .iter()
            .map(|(column, value)| (self.mapper.column(table, column), value.clone()))
            .collect();
        let stmt = UpdateStatement::new(table, data.clone(), conditions).build()?;
        let changed = self.execute(&stmt, &format!("update {}", table), &data)?;
        info!("Updated {} row(s) in '{}'", changed, table);
        Ok(changed)
    }

    /// UPDATE whose failures are logged and swallowed
    ///
    /// An empty `data` is a silent no-op. Returns whether any row changed.
    pub fn update_best_effort(
        &self,
        table: Table,
        data: &[(String, Value)],
        conditions: &[(&str, Value)],
    ) -> bool {
        if data.is_empty() {
            debug!("No data provided for best-effort update of '{}'", table);
            return false;
        }
        match self.update(table, data, conditions) {
            Ok(changed) => changed > 0,
            Err(err) => {
                warn!("Best-effort update of '{}' failed: {}", table, err);
                false
            }
        }
    }

    /// INSERT ... ON CONFLICT(keys) DO UPDATE
    pub fn upsert(&self, table: Table, data: &[(String, Value)], keys: &[&str]) -> StoreResult<()> {
        let data = self.physical(table, data);
        let keys: Vec<String> = keys.iter().map(|k| self.mapper.column(table, k)).collect();
        let stmt = InsertStatement::new(table, data.clone())
            .on_conflict_update(keys)
            .build()?;
        self.execute(&stmt, &format!("upsert into {}", table), &data)?;
        info!("Upserted into '{}'", table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn coldhead(serial: &str, status: &str) -> Fields {
        vec![
            ("serial_number".to_string(), text(serial)),
            ("status".to_string(), text(status)),
        ]
    }

    #[test]
    fn test_insert_and_query() {
        let mut store = RepStore::open_in_memory().unwrap();
        let id = store.insert(Table::Coldheads, &coldhead("C1", "Active")).unwrap();
        assert!(id > 0);

        let rows = store
            .query(Table::Coldheads, &[("serial_number", text("C1"))])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("status").as_deref(), Some("Active"));
        assert_eq!(rows[0].get_i64("coldhead_id"), Some(id));
    }

    #[test]
    fn test_duplicate_insert_is_duplicate_entry() {
        let mut store = RepStore::open_in_memory().unwrap();
        store.insert(Table::Coldheads, &coldhead("C1", "Active")).unwrap();
        let err = store
            .insert(Table::Coldheads, &coldhead("C1", "Active"))
            .unwrap_err();
        match err {
            StoreError::DuplicateEntry { field, value } => {
                assert_eq!(field, "serial_number");
                assert_eq!(value, "C1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_insert_or_ignore_reports_skip() {
        let mut store = RepStore::open_in_memory().unwrap();
        assert!(store.insert_or_ignore(Table::Coldheads, &coldhead("C1", "A")).unwrap());
        assert!(!store.insert_or_ignore(Table::Coldheads, &coldhead("C1", "B")).unwrap());
        let rows = store.query(Table::Coldheads, &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("status").as_deref(), Some("A"));
    }

    #[test]
    fn test_upsert_overwrites_non_key_columns() {
        let mut store = RepStore::open_in_memory().unwrap();
        store
            .upsert(Table::Coldheads, &coldhead("C1", "Active"), &["serial_number"])
            .unwrap();
        store
            .upsert(Table::Coldheads, &coldhead("C1", "Retired"), &["serial_number"])
            .unwrap();

        let rows = store.query(Table::Coldheads, &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("status").as_deref(), Some("Retired"));
    }

    #[test]
    fn test_update_strict_and_best_effort() {
        let mut store = RepStore::open_in_memory().unwrap();
        store.insert(Table::Coldheads, &coldhead("C1", "Active")).unwrap();

        let changed = store
            .update(
                Table::Coldheads,
                &[("status".to_string(), text("Retired"))],
                &[("serial_number", text("C1"))],
            )
            .unwrap();
        assert_eq!(changed, 1);

        let err = store
            .update(Table::Coldheads, &[], &[("serial_number", text("C1"))])
            .unwrap_err();
        assert!(matches!(err, StoreError::EmptyUpdate { .. }));

        assert!(!store.update_best_effort(Table::Coldheads, &[], &[("serial_number", text("C1"))]));
        // Unknown column fails inside, but is swallowed
        assert!(!store.update_best_effort(
            Table::Coldheads,
            &[("no_such_column".to_string(), text("x"))],
            &[("serial_number", text("C1"))],
        ));
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let mut store = RepStore::open_in_memory().unwrap();
        let result: StoreResult<()> = store.with_transaction(|s| {
            s.insert(Table::Coldheads, &coldhead("C1", "Active"))?;
            s.insert(Table::Coldheads, &coldhead("C1", "Active"))?;
            Ok(())
        });
        assert!(result.unwrap_err().is_duplicate());
        assert!(store.query(Table::Coldheads, &[]).unwrap().is_empty());
    }

    #[test]
    fn test_foreign_keys_are_enforced() {
        let mut store = RepStore::open_in_memory().unwrap();
        let err = store
            .insert(
                Table::Tests,
                &[("wip_number".to_string(), text("WIP404"))],
            )
            .unwrap_err();
        assert!(err.is_invalid_data());
    }

    #[test]
    fn test_open_file_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("tracker.db");
        {
            let mut store =
                RepStore::open(&path, SchemaMapper::default(), DEFAULT_BUSY_TIMEOUT).unwrap();
            store.insert(Table::Coldheads, &coldhead("C1", "Active")).unwrap();
        }
        let store = RepStore::open(&path, SchemaMapper::default(), DEFAULT_BUSY_TIMEOUT).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.query(Table::Coldheads, &[]).unwrap().len(), 1);
    }
}
