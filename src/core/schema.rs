//! Database schema bootstrap

use std::collections::HashSet;

use rusqlite::{params, Connection};

use crate::core::error::{StoreError, StoreResult};

/// Current bootstrap schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Indexes, keyed by the table they belong to
///
/// Only created together with their table: an existing database may use
/// different column names, which the mapper resolves after bootstrap.
const INDEXES: &[(&str, &str)] = &[
    (
        "wips",
        "CREATE INDEX IF NOT EXISTS idx_wips_coldhead ON wips(coldhead_serial_number)",
    ),
    (
        "wips",
        "CREATE INDEX IF NOT EXISTS idx_wips_displacer ON wips(displacer_serial_number)",
    ),
    (
        "wips",
        "CREATE INDEX IF NOT EXISTS idx_wips_status ON wips(status, is_active)",
    ),
    (
        "tests",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_unique_test \
         ON tests(wip_number, displacer_serial_number, test_attempt)",
    ),
    (
        "tests",
        "CREATE INDEX IF NOT EXISTS idx_tests_wip ON tests(wip_number)",
    ),
];

fn existing_tables(conn: &Connection) -> StoreResult<HashSet<String>> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
        .map_err(|e| StoreError::database("schema introspection", e))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| StoreError::database("schema introspection", e))?
        .collect::<Result<HashSet<_>, _>>()
        .map_err(|e| StoreError::database("schema introspection", e))?;
    Ok(names)
}

/// Create the tracker tables (and their indexes) if they don't exist yet
pub fn init_schema(conn: &Connection) -> StoreResult<()> {
    let before = existing_tables(conn)?;

    conn.execute_batch(
        r#"
        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS coldheads (
            coldhead_id INTEGER PRIMARY KEY AUTOINCREMENT,
            serial_number TEXT NOT NULL UNIQUE,
            status TEXT,
            notes TEXT
        );

        CREATE TABLE IF NOT EXISTS displacers (
            displacer_serial_number TEXT PRIMARY KEY,
            status TEXT,
            notes TEXT,
            initial_open_date TEXT,
            is_active INTEGER NOT NULL DEFAULT 1
        );

        -- Coldhead/displacer references stay NULL while a WIP is a placeholder
        CREATE TABLE IF NOT EXISTS wips (
            wip_number TEXT PRIMARY KEY,
            coldhead_serial_number TEXT,
            displacer_serial_number TEXT,
            arrival_date TEXT,
            teardown_date TEXT,
            status TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY (coldhead_serial_number) REFERENCES coldheads(serial_number),
            FOREIGN KEY (displacer_serial_number) REFERENCES displacers(displacer_serial_number)
        );

        CREATE TABLE IF NOT EXISTS tests (
            test_id INTEGER PRIMARY KEY AUTOINCREMENT,
            wip_number TEXT NOT NULL,
            coldhead_serial_number TEXT,
            displacer_serial_number TEXT,
            test_date TEXT,
            test_attempt INTEGER,
            pass_fail TEXT,
            notes TEXT,
            mode TEXT,
            turns INTEGER,
            first_stage_heaters REAL,
            second_stage_heater REAL,
            first_stage_temp REAL,
            second_stage_temp REAL,
            efficiency1 REAL,
            efficiency2 REAL,
            FOREIGN KEY (wip_number) REFERENCES wips(wip_number),
            FOREIGN KEY (coldhead_serial_number) REFERENCES coldheads(serial_number),
            FOREIGN KEY (displacer_serial_number) REFERENCES displacers(displacer_serial_number)
        );
        "#,
    )
    .map_err(|e| StoreError::database("schema bootstrap", e))?;

    for (table, ddl) in INDEXES {
        if !before.contains(*table) {
            conn.execute(ddl, [])
                .map_err(|e| StoreError::database("schema bootstrap", e))?;
        }
    }

    conn.execute(
        "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
        params![SCHEMA_VERSION],
    )
    .map_err(|e| StoreError::database("schema bootstrap", e))?;

    Ok(())
}

/// Read the recorded schema version (0 when the table is missing or empty)
pub fn schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i32>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn test_schema_version_defaults_to_zero() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(schema_version(&conn), 0);
    }

    fn index_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx_%'")
            .unwrap();
        let mut names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        names.sort();
        names
    }

    #[test]
    fn test_fresh_database_gets_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(
            index_names(&conn),
            vec![
                "idx_tests_wip",
                "idx_unique_test",
                "idx_wips_coldhead",
                "idx_wips_displacer",
                "idx_wips_status",
            ]
        );
    }

    #[test]
    fn test_existing_table_with_renamed_columns_is_left_alone() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE wips (
                wip_number TEXT PRIMARY KEY,
                coldhead_serial_number TEXT,
                displacer_serial_number TEXT,
                arrival_date TEXT,
                teardown_date TEXT,
                wip_status TEXT,
                is_active INTEGER NOT NULL DEFAULT 1
            );",
        )
        .unwrap();

        init_schema(&conn).unwrap();
        let indexes = index_names(&conn);
        assert!(!indexes.iter().any(|i| i.starts_with("idx_wips")));
        assert!(indexes.contains(&"idx_unique_test".to_string()));
    }
}
