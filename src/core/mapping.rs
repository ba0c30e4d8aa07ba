//! Logical-to-physical column mapping
//!
//! Queries are written against stable logical names (`wips.status`) and
//! translated here into whatever the live schema calls those columns. The
//! mapping is validated against the database once, when the store opens.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rusqlite::Connection;
use tracing::debug;

use crate::core::error::{StoreError, StoreResult};

/// The four tables the tracker knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Coldheads,
    Displacers,
    Wips,
    Tests,
}

impl Table {
    /// Fixed iteration order used for unqualified lookups
    pub const ALL: [Table; 4] = [Table::Coldheads, Table::Displacers, Table::Wips, Table::Tests];

    /// Position in [`Table::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Table::Coldheads => 0,
            Table::Displacers => 1,
            Table::Wips => 2,
            Table::Tests => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Coldheads => "coldheads",
            Table::Displacers => "displacers",
            Table::Wips => "wips",
            Table::Tests => "tests",
        }
    }

    /// Logical columns declared for this table
    pub fn logical_columns(&self) -> &'static [&'static str] {
        match self {
            Table::Coldheads => &["coldhead_id", "serial_number", "status", "notes"],
            Table::Displacers => &[
                "displacer_serial_number",
                "status",
                "notes",
                "initial_open_date",
                "is_active",
            ],
            Table::Wips => &[
                "wip_number",
                "coldhead_serial_number",
                "displacer_serial_number",
                "arrival_date",
                "teardown_date",
                "status",
                "is_active",
            ],
            Table::Tests => &[
                "test_id",
                "wip_number",
                "coldhead_serial_number",
                "displacer_serial_number",
                "test_date",
                "test_attempt",
                "pass_fail",
                "notes",
                "mode",
                "turns",
                "first_stage_heaters",
                "second_stage_heater",
                "first_stage_temp",
                "second_stage_temp",
                "efficiency1",
                "efficiency2",
            ],
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Table {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "coldheads" => Ok(Table::Coldheads),
            "displacers" => Ok(Table::Displacers),
            "wips" => Ok(Table::Wips),
            "tests" => Ok(Table::Tests),
            _ => Err(StoreError::invalid(format!("Table '{}' is not recognized", s))),
        }
    }
}

/// Per-table overrides, as read from configuration (table -> logical -> physical)
pub type MappingOverrides = HashMap<String, HashMap<String, String>>;

/// Translates logical column references into physical ones
#[derive(Debug, Clone)]
pub struct SchemaMapper {
    /// Kept in [`Table::ALL`] order
    tables: Vec<(Table, HashMap<String, String>)>,
}

impl Default for SchemaMapper {
    fn default() -> Self {
        let tables = Table::ALL
            .iter()
            .map(|table| {
                let mapping = table
                    .logical_columns()
                    .iter()
                    .map(|c| (c.to_string(), c.to_string()))
                    .collect();
                (*table, mapping)
            })
            .collect();
        Self { tables }
    }
}

impl SchemaMapper {
    /// Identity mapping with configured overrides applied on top
    pub fn with_overrides(overrides: &MappingOverrides) -> StoreResult<Self> {
        let mut mapper = Self::default();
        for (table_name, columns) in overrides {
            let table: Table = table_name.parse().map_err(|_| {
                StoreError::Configuration(format!(
                    "mapping declared for unknown table '{}'",
                    table_name
                ))
            })?;
            let mapping = mapper.table_mut(table);
            for (logical, physical) in columns {
                mapping.insert(logical.clone(), physical.clone());
            }
        }
        Ok(mapper)
    }

    // `tables` is built in `Table::ALL` order
    fn table_mut(&mut self, table: Table) -> &mut HashMap<String, String> {
        &mut self.tables[table.index()].1
    }

    fn table_map(&self, table: Table) -> Option<&HashMap<String, String>> {
        self.tables.get(table.index()).map(|(_, m)| m)
    }

    /// Check every declared physical column against `PRAGMA table_info`
    pub fn validate(&self, conn: &Connection) -> StoreResult<()> {
        for (table, mapping) in &self.tables {
            let mut stmt = conn
                .prepare(&format!("PRAGMA table_info({})", table.as_str()))
                .map_err(|e| StoreError::database("schema introspection", e))?;
            let columns = stmt
                .query_map([], |row| row.get::<_, String>(1))
                .map_err(|e| StoreError::database("schema introspection", e))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| StoreError::database("schema introspection", e))?;
            debug!("Columns in table '{}': {:?}", table, columns);

            let mut declared: Vec<_> = mapping.iter().collect();
            declared.sort();
            for (logical, physical) in declared {
                if !columns.iter().any(|c| c == physical) {
                    return Err(StoreError::Configuration(format!(
                        "mapping error: column '{}' (logical '{}') does not exist in table '{}'",
                        physical, logical, table
                    )));
                }
            }
            debug!("All mappings for table '{}' are valid", table);
        }
        Ok(())
    }

    /// Physical column name for a logical column of `table` (unqualified)
    pub fn column(&self, table: Table, logical: &str) -> String {
        self.table_map(table)
            .and_then(|m| m.get(logical))
            .cloned()
            .unwrap_or_else(|| logical.to_string())
    }

    /// Physical column qualified with its table name
    pub fn qualified(&self, table: Table, logical: &str) -> String {
        format!("{}.{}", table, self.column(table, logical))
    }

    /// Map `table.column`, `table.column AS alias` or a bare `column`
    pub fn map(&self, logical: &str) -> String {
        let (column_with_table, alias) = match logical.split_once(" AS ") {
            Some((col, alias)) => (col.trim(), Some(alias.trim())),
            None => (logical.trim(), None),
        };

        let mut actual = match column_with_table.split_once('.') {
            Some((table_name, column)) => {
                let table_name = table_name.to_ascii_lowercase();
                let physical = table_name
                    .parse::<Table>()
                    .ok()
                    .and_then(|t| self.table_map(t))
                    .and_then(|m| m.get(column))
                    .map(String::as_str)
                    .unwrap_or(column);
                format!("{}.{}", table_name, physical)
            }
            None => self
                .tables
                .iter()
                .find_map(|(table, mapping)| {
                    mapping
                        .get(column_with_table)
                        .map(|physical| format!("{}.{}", table, physical))
                })
                .unwrap_or_else(|| column_with_table.to_string()),
        };

        if let Some(alias) = alias {
            actual = format!("{} AS {}", actual, alias);
        }

        debug!("Mapping column '{}' to '{}'", logical, actual);
        actual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renamed() -> SchemaMapper {
        let mut overrides = MappingOverrides::new();
        overrides.insert(
            "wips".to_string(),
            HashMap::from([("status".to_string(), "wip_status".to_string())]),
        );
        SchemaMapper::with_overrides(&overrides).unwrap()
    }

    #[test]
    fn test_table_index_matches_fixed_order() {
        for table in Table::ALL {
            assert_eq!(Table::ALL[table.index()], table);
        }
    }

    #[test]
    fn test_override_lands_on_its_own_table() {
        let mut overrides = MappingOverrides::new();
        overrides.insert(
            "tests".to_string(),
            HashMap::from([("notes".to_string(), "test_notes".to_string())]),
        );
        let mapper = SchemaMapper::with_overrides(&overrides).unwrap();
        assert_eq!(mapper.column(Table::Tests, "notes"), "test_notes");
        assert_eq!(mapper.column(Table::Coldheads, "notes"), "notes");
        assert_eq!(mapper.column(Table::Displacers, "notes"), "notes");
    }

    #[test]
    fn test_identity_mapping_for_every_declared_column() {
        let mapper = SchemaMapper::default();
        for table in Table::ALL {
            for column in table.logical_columns() {
                let logical = format!("{}.{}", table, column);
                assert_eq!(mapper.map(&logical), logical);
                assert_eq!(
                    mapper.map(&format!("{} AS x", logical)),
                    format!("{} AS x", logical)
                );
            }
        }
    }

    #[test]
    fn test_override_is_applied_with_alias() {
        let mapper = renamed();
        assert_eq!(mapper.map("wips.status"), "wips.wip_status");
        assert_eq!(
            mapper.map("wips.status AS current_status"),
            "wips.wip_status AS current_status"
        );
        assert_eq!(mapper.column(Table::Wips, "status"), "wip_status");
        assert_eq!(mapper.qualified(Table::Wips, "status"), "wips.wip_status");
    }

    #[test]
    fn test_unknown_column_passes_through() {
        let mapper = SchemaMapper::default();
        assert_eq!(mapper.map("wips.legacy_flag"), "wips.legacy_flag");
        assert_eq!(mapper.map("no_such_column"), "no_such_column");
    }

    #[test]
    fn test_table_name_is_lowercased() {
        let mapper = renamed();
        assert_eq!(mapper.map("WIPs.status"), "wips.wip_status");
    }

    #[test]
    fn test_bare_column_searches_tables_in_fixed_order() {
        let mapper = SchemaMapper::default();
        // serial_number only exists on coldheads
        assert_eq!(mapper.map("serial_number"), "coldheads.serial_number");
        // status exists on coldheads, displacers and wips; coldheads comes first
        assert_eq!(mapper.map("status"), "coldheads.status");
        assert_eq!(mapper.map("pass_fail AS pf"), "tests.pass_fail AS pf");
    }

    #[test]
    fn test_unknown_override_table_is_configuration_error() {
        let mut overrides = MappingOverrides::new();
        overrides.insert("widgets".to_string(), HashMap::new());
        let err = SchemaMapper::with_overrides(&overrides).unwrap_err();
        assert!(matches!(err, StoreError::Configuration(_)));
    }

    #[test]
    fn test_validate_rejects_missing_physical_column() {
        let conn = Connection::open_in_memory().unwrap();
        crate::core::schema::init_schema(&conn).unwrap();

        assert!(SchemaMapper::default().validate(&conn).is_ok());

        let err = renamed().validate(&conn).unwrap_err();
        match err {
            StoreError::Configuration(msg) => assert!(msg.contains("wip_status")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
